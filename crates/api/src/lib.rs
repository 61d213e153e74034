//! Webhook ingress for TriageBot.
//!
//! # Endpoints
//!
//! - `GET /` - Liveness message
//! - `GET /api/v1/health` - Health check
//! - `POST /api/v1/webhooks/github` - GitHub `issues` deliveries (signed)
//!
//! Only the webhook route sits behind signature verification. Accepted
//! deliveries are acknowledged immediately and triaged on a background task.
//!
//! ```text
//! GitHub ──► verify_signature ──► github_webhook ──► 200 accepted/ignored
//!                                      │
//!                                      └─► tokio::spawn(Orchestrator::process)
//! ```

pub mod routes;
pub mod signature;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use signature::{SIGNATURE_HEADER, SignatureError, WebhookVerifier, sign};
pub use state::AppState;

pub fn create_router(state: Arc<AppState>, verifier: WebhookVerifier) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let webhooks = Router::new()
        .route("/api/v1/webhooks/github", post(routes::github_webhook))
        .layer(DefaultBodyLimit::max(verifier.max_body_bytes()))
        .route_layer(from_fn_with_state(verifier, signature::verify_signature));

    Router::new()
        .route("/", get(routes::root))
        .route("/api/v1/health", get(routes::health))
        .merge(webhooks)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(
    state: Arc<AppState>,
    verifier: WebhookVerifier,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let router = create_router(state, verifier);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Starting TriageBot server");
    axum::serve(listener, router).await?;
    Ok(())
}
