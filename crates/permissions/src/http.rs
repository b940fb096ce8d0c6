//! HTTP membership provider.
//!
//! Talks to a membership service exposing:
//! - `GET {base}/teams` returning team scope ids
//! - `GET {base}/teams/{team}/members` returning the roster
//! - `GET {base}/teams/{team}/members/{identity}` returning one record, 404 when absent
//! - `POST {base}/teams/{team}/members/{identity}/promote` granting administrator
//!
//! Connect failures, timeouts, 429 and 5xx map to [`ProviderError::Unavailable`]
//! and are retried by the resolver; other statuses are rejections.

use async_trait::async_trait;
use kickoff_config::MembershipConfig;
use kickoff_core::error::ProviderError;
use kickoff_core::membership::{MembershipProvider, MembershipRecord};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpMembership {
    base_url: Url,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpMembership {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, ProviderError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ProviderError::Rejected(format!("invalid membership URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::Rejected(format!(
                "membership URL '{base_url}' cannot carry paths"
            )));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    /// `None` when no provider URL is configured.
    pub fn from_config(config: &MembershipConfig) -> Result<Option<Self>, ProviderError> {
        match &config.provider_url {
            Some(url) if !url.is_empty() => Ok(Some(Self::new(url, config.api_key.clone())?)),
            _ => Ok(None),
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// `{base}/seg/seg/...` with every segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ProviderError> {
        self.authorize(builder)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ProviderError> {
        debug!(url = %url, "Membership read");
        let response = self.send(self.client.get(url)).await?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Rejected(format!("Failed to parse response: {e}")))
    }
}

/// Map a non-success status onto the provider error taxonomy.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %body, "Membership service returned error");
    let message = format!("{status}: {body}");
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(ProviderError::Unavailable(message))
    } else {
        Err(ProviderError::Rejected(message))
    }
}

#[async_trait]
impl MembershipProvider for HttpMembership {
    fn name(&self) -> &str {
        "http"
    }

    async fn lookup(
        &self,
        identity: &str,
        team_scope_id: &str,
    ) -> Result<Option<MembershipRecord>, ProviderError> {
        let url = self.url(&["teams", team_scope_id, "members", identity]);
        debug!(url = %url, "Membership lookup");
        let response = self.send(self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        response
            .json::<MembershipRecord>()
            .await
            .map(Some)
            .map_err(|e| ProviderError::Rejected(format!("Failed to parse record: {e}")))
    }

    async fn roster(&self, team_scope_id: &str) -> Result<Vec<MembershipRecord>, ProviderError> {
        self.get_json(self.url(&["teams", team_scope_id, "members"])).await
    }

    async fn teams(&self) -> Result<Vec<String>, ProviderError> {
        self.get_json(self.url(&["teams"])).await
    }

    async fn promote_to_administrator(
        &self,
        identity: &str,
        team_scope_id: &str,
    ) -> Result<(), ProviderError> {
        let url = self.url(&["teams", team_scope_id, "members", identity, "promote"]);
        debug!(url = %url, "Membership promotion");
        let response = self.send(self.client.post(url)).await?;
        check_status(response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryMembership;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::{TimeZone, Utc};
    use kickoff_core::scope::ChatScope;
    use std::sync::Arc;

    type Shared = Arc<InMemoryMembership>;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn authorized(headers: &HeaderMap) -> Result<(), AxumStatus> {
        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
            Some("Bearer members-key") => Ok(()),
            _ => Err(AxumStatus::UNAUTHORIZED),
        }
    }

    async fn teams(State(store): State<Shared>, headers: HeaderMap) -> Result<Json<Vec<String>>, AxumStatus> {
        authorized(&headers)?;
        Ok(Json(store.teams().await.unwrap()))
    }

    async fn roster(
        State(store): State<Shared>,
        headers: HeaderMap,
        Path(team): Path<String>,
    ) -> Result<Json<Vec<MembershipRecord>>, AxumStatus> {
        authorized(&headers)?;
        Ok(Json(store.roster(&team).await.unwrap()))
    }

    async fn member(
        State(store): State<Shared>,
        headers: HeaderMap,
        Path((team, identity)): Path<(String, String)>,
    ) -> Result<Json<MembershipRecord>, AxumStatus> {
        authorized(&headers)?;
        store
            .lookup(&identity, &team)
            .await
            .unwrap()
            .map(Json)
            .ok_or(AxumStatus::NOT_FOUND)
    }

    async fn promote(
        State(store): State<Shared>,
        headers: HeaderMap,
        Path((team, identity)): Path<(String, String)>,
    ) -> Result<AxumStatus, AxumStatus> {
        authorized(&headers)?;
        store
            .promote_to_administrator(&identity, &team)
            .await
            .map(|_| AxumStatus::NO_CONTENT)
            .map_err(|_| AxumStatus::NOT_FOUND)
    }

    fn store() -> Shared {
        Arc::new(InMemoryMembership::from_records([MembershipRecord {
            identity: "tg 42".into(),
            team_scope_id: "KTI".into(),
            roles: vec!["coach".into()],
            chat_memberships: vec![ChatScope::Open, ChatScope::Restricted],
            joined_at: Utc.with_ymd_and_hms(2024, 8, 1, 18, 0, 0).unwrap(),
        }]))
    }

    async fn service(store: Shared) -> String {
        let app = Router::new()
            .route("/teams", get(teams))
            .route("/teams/{team}/members", get(roster))
            .route("/teams/{team}/members/{identity}", get(member))
            .route("/teams/{team}/members/{identity}/promote", post(promote))
            .with_state(store);
        serve(app).await
    }

    #[tokio::test]
    async fn reads_records_roster_and_teams() {
        let base = service(store()).await;
        let provider = HttpMembership::new(&format!("{base}/"), Some("members-key".into())).unwrap();

        let record = provider.lookup("tg 42", "KTI").await.unwrap().unwrap();
        assert_eq!(record.roles, vec!["coach"]);
        assert!(provider.lookup("nobody", "KTI").await.unwrap().is_none());
        assert_eq!(provider.roster("KTI").await.unwrap().len(), 1);
        assert_eq!(provider.teams().await.unwrap(), vec!["KTI"]);
    }

    #[tokio::test]
    async fn promotion_is_written_through() {
        let store = store();
        let base = service(store.clone()).await;
        let provider = HttpMembership::new(&base, Some("members-key".into())).unwrap();

        provider.promote_to_administrator("tg 42", "KTI").await.unwrap();
        provider.promote_to_administrator("tg 42", "KTI").await.unwrap();
        let stored = store.lookup("tg 42", "KTI").await.unwrap().unwrap();
        assert_eq!(stored.roles.iter().filter(|r| *r == "administrator").count(), 1);

        let err = provider.promote_to_administrator("ghost", "KTI").await.unwrap_err();
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn missing_key_is_a_rejection() {
        let base = service(store()).await;
        let provider = HttpMembership::new(&base, None).unwrap();
        let err = provider.teams().await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let app = Router::new().route(
            "/teams",
            get(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "maintenance") }),
        );
        let base = serve(app).await;
        let provider = HttpMembership::new(&base, None).unwrap();
        let err = provider.teams().await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("maintenance"));
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let provider = HttpMembership::new(&format!("http://{addr}"), None).unwrap();
        assert!(provider.lookup("tg 42", "KTI").await.unwrap_err().is_transport());
    }

    #[test]
    fn from_config_without_url_is_none() {
        assert!(HttpMembership::from_config(&MembershipConfig::default()).unwrap().is_none());
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(HttpMembership::new("not a url", None).is_err());
    }
}
