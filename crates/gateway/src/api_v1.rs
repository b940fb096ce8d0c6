//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST /v1/messages`: Handle an inbound message, return `{text, status}`
//! - `POST /v1/route`: Routing and permission decision, no execution
//! - `GET  /v1/capabilities`: Capability owners and their capabilities

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use kickoff_core::capability::{Cardinality, SideEffect};
use kickoff_core::message::{InboundMessage, Reply};
use kickoff_pipeline::RoutePlan;
use serde::Serialize;
use tracing::info;

use crate::SharedState;

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/messages", post(message_handler))
        .route("/route", post(route_handler))
        .route("/capabilities", get(capabilities_handler))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn check_message(message: &InboundMessage) -> Result<(), ApiError> {
    let missing = if message.requester_id.trim().is_empty() {
        Some("requester_id")
    } else if message.team_scope_id.trim().is_empty() {
        Some("team_scope_id")
    } else {
        None
    };
    match missing {
        Some(field) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("'{field}' must not be empty"),
            }),
        )),
        None => Ok(()),
    }
}

// ── Messages ──────────────────────────────────────────────────────────────

async fn message_handler(
    State(state): State<SharedState>,
    Json(message): Json<InboundMessage>,
) -> Result<Json<Reply>, ApiError> {
    check_message(&message)?;
    info!(
        requester_id = %message.requester_id,
        team_scope_id = %message.team_scope_id,
        chat_scope = %message.chat_scope,
        "Inbound message"
    );
    Ok(Json(state.pipeline.handle(message).await))
}

async fn route_handler(
    State(state): State<SharedState>,
    Json(message): Json<InboundMessage>,
) -> Result<Json<RoutePlan>, ApiError> {
    check_message(&message)?;
    Ok(Json(state.pipeline.plan(message).await))
}

// ── Capabilities ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CapabilityInfo {
    pub name: String,
    pub description: String,
    pub side_effect: SideEffect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<Cardinality>,
}

#[derive(Debug, Serialize)]
pub struct OwnerInfo {
    pub id: String,
    pub purpose: String,
    pub capabilities: Vec<CapabilityInfo>,
}

#[derive(Debug, Serialize)]
pub struct CapabilitiesResponse {
    pub owners: Vec<OwnerInfo>,
    pub total: usize,
    pub fallback_owner: String,
}

async fn capabilities_handler(State(state): State<SharedState>) -> Json<CapabilitiesResponse> {
    let table = state.pipeline.registry().snapshot();
    let owners = table
        .owners()
        .map(|owner| OwnerInfo {
            id: owner.id.clone(),
            purpose: owner.purpose.clone(),
            capabilities: table
                .get_capabilities_for(&owner.id)
                .iter()
                .map(|c| CapabilityInfo {
                    name: c.name.clone(),
                    description: c.description.clone(),
                    side_effect: c.side_effect,
                    category: c.result.as_ref().map(|r| r.category.clone()),
                    cardinality: c.result.as_ref().map(|r| r.cardinality),
                })
                .collect(),
        })
        .collect();

    Json(CapabilitiesResponse {
        owners,
        total: table.len(),
        fallback_owner: state.pipeline.selector().fallback_owner().to_string(),
    })
}
