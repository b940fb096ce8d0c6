//! HTTP execution backend.
//!
//! Talks to any executor service exposing:
//! - `POST {base}/tasks` taking a [`TaskRequest`] and returning a [`TaskResponse`]
//! - `GET {base}/health`

use async_trait::async_trait;
use kickoff_config::DispatchConfig;
use kickoff_core::backend::{ExecutionBackend, TaskRequest, TaskResponse};
use kickoff_core::error::DispatchError;
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpBackend {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, DispatchError> {
        // The dispatcher owns the per-attempt budget; this only bounds connecting.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DispatchError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    /// `None` when no backend URL is configured.
    pub fn from_config(config: &DispatchConfig) -> Result<Option<Self>, DispatchError> {
        match &config.backend_url {
            Some(url) if !url.is_empty() => Ok(Some(Self::new(url, config.api_key.clone())?)),
            _ => Ok(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }
}

#[async_trait]
impl ExecutionBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(&self, request: TaskRequest) -> Result<TaskResponse, DispatchError> {
        let url = format!("{}/tasks", self.base_url);
        debug!(
            url = %url,
            allowed = request.allowed_capabilities.len(),
            context_keys = request.named_context.len(),
            "Sending task"
        );

        let response = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Execution backend returned error");
            return Err(DispatchError::Backend {
                status,
                message: error_body,
            });
        }

        response
            .json::<TaskResponse>()
            .await
            .map_err(|e| DispatchError::MalformedResponse(format!("Failed to parse response: {e}")))
    }

    async fn health_check(&self) -> Result<bool, DispatchError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        Ok(response.status().is_success())
    }
}
