//! Subcommand implementations and the collaborators they share.

pub mod capabilities;
pub mod doctor;
pub mod route;
pub mod serve;

use async_trait::async_trait;
use kickoff_config::AppConfig;
use kickoff_core::backend::{ExecutionBackend, TaskRequest, TaskResponse};
use kickoff_core::error::DispatchError;
use kickoff_core::membership::MembershipProvider;
use kickoff_permissions::{HttpMembership, InMemoryMembership};
use kickoff_pipeline::RequestPipeline;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// The configured membership provider: the remote service at
/// `membership.provider_url`, else the roster at `membership.roster_path`,
/// else an empty roster.
pub fn load_provider(
    config: &AppConfig,
) -> Result<Arc<dyn MembershipProvider>, Box<dyn std::error::Error>> {
    if let Some(remote) = HttpMembership::from_config(&config.membership)? {
        info!(url = %remote.base_url(), "Using remote membership service");
        return Ok(Arc::new(remote));
    }
    let provider = match &config.membership.roster_path {
        Some(path) => InMemoryMembership::load(Path::new(path))?,
        None => {
            warn!("No membership provider configured; every requester resolves as a guest");
            InMemoryMembership::new()
        }
    };
    Ok(Arc::new(provider))
}

/// Stand-in backend for commands that never execute a request.
pub struct Unconfigured;

#[async_trait]
impl ExecutionBackend for Unconfigured {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn execute(&self, _request: TaskRequest) -> Result<TaskResponse, DispatchError> {
        Err(DispatchError::Transport(
            "dispatch.backend_url is not set".into(),
        ))
    }

    async fn health_check(&self) -> Result<bool, DispatchError> {
        Ok(false)
    }
}

/// Pipeline wired for inspection only: routing, permissions and registry
/// are real, execution is not.
pub fn inspection_pipeline(
    config: &AppConfig,
) -> Result<RequestPipeline, Box<dyn std::error::Error>> {
    let provider = load_provider(config)?;
    Ok(RequestPipeline::from_config(
        config,
        Arc::new(Unconfigured),
        provider,
    )?)
}
