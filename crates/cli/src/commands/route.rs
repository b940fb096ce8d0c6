//! `kickoff route`: Print the routing and permission decision for a message.

use kickoff_config::AppConfig;
use kickoff_core::message::InboundMessage;
use kickoff_core::scope::ChatScope;

use super::inspection_pipeline;

pub async fn run(
    text: String,
    scope: ChatScope,
    requester: String,
    team: String,
    structured: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let pipeline = inspection_pipeline(&config)?;

    let mut message = InboundMessage::new(requester, team, scope, text);
    message.is_structured_command |= structured;

    let plan = pipeline.plan(message).await;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
