//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, info, warn};
use triagebot_common::TriageEvent;
use triagebot_coordinator::{Disposition, Orchestrator};

use crate::AppState;

const EVENT_HEADER: &str = "x-github-event";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub app_name: String,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub llm_model: String,
    pub embedding_enabled: bool,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        app_name: state.app_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        llm_model: state.llm_model.clone(),
        embedding_enabled: state.embedding_enabled,
    })
}

pub async fn root(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": format!("{} is running", state.app_name),
    }))
}

/// Acknowledgement returned to GitHub for every verified delivery.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookResponse {
    fn accepted() -> Self {
        Self {
            status: "accepted",
            reason: None,
            message: Some("Issue processing started".into()),
        }
    }

    fn ignored(reason: impl Into<String>) -> Self {
        Self {
            status: "ignored",
            reason: Some(reason.into()),
            message: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

/// Receive a GitHub delivery, acknowledge it at once and run the pipeline
/// in the background.
pub async fn github_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ErrorResponse> {
    let event_kind = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok());
    if let Some(kind) = event_kind
        && kind != "issues"
    {
        debug!(event = %kind, "Ignoring non-issue delivery");
        return Ok(Json(WebhookResponse::ignored("Not an issue event")));
    }

    let event: TriageEvent = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Unparseable webhook payload");
        ErrorResponse {
            error: format!("Invalid webhook payload: {e}"),
            code: "INVALID_PAYLOAD",
        }
    })?;

    if let Disposition::Ignored { reason } = Orchestrator::screen(&event) {
        info!(action = %event.action, reason = %reason, "Ignoring webhook");
        return Ok(Json(WebhookResponse::ignored(reason)));
    }

    if let Some(ref issue) = event.issue {
        info!(issue = issue.number, title = %issue.title, action = %event.action, "Received issue webhook");
    }

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        orchestrator.process(&event).await;
    });

    Ok(Json(WebhookResponse::accepted()))
}
