//! `kickoff serve`: Start the HTTP gateway and the succession sweeper.

use kickoff_config::AppConfig;
use kickoff_core::event::log_events;
use kickoff_dispatch::HttpBackend;
use kickoff_pipeline::RequestPipeline;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::load_provider;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let backend = HttpBackend::from_config(&config.dispatch)?
        .ok_or("dispatch.backend_url is not set; set it in config.toml or KICKOFF_BACKEND_URL")?;
    let provider = load_provider(&config)?;
    let pipeline = Arc::new(RequestPipeline::from_config(
        &config,
        Arc::new(backend),
        provider,
    )?);

    let snapshot = pipeline.registry().snapshot();
    info!(
        owners = snapshot.owners().count(),
        capabilities = snapshot.len(),
        fallback = pipeline.selector().fallback_owner(),
        "Pipeline ready"
    );

    let _event_log = tokio::spawn(log_events(pipeline.events().subscribe()));

    let interval = config.permissions.succession_interval_secs;
    let _sweeper = (interval > 0)
        .then(|| pipeline.succession_sweeper().spawn(Duration::from_secs(interval)));

    println!("🚀 Kickoff gateway starting on {}:{}", config.gateway.host, config.gateway.port);
    println!("   POST /v1/messages       — Handle a message");
    println!("   POST /v1/route          — Routing decision only");
    println!("   GET  /v1/capabilities   — Owners and capabilities");
    println!("   GET  /health            — Health check");
    println!();

    kickoff_gateway::start(pipeline, &config.gateway).await
}
