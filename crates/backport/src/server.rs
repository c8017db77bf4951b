//! HTTP server for GitHub webhooks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::WebhookError;
use crate::events;
use crate::handlers::Backporter;
use crate::webhooks::{verify_request, DELIVERY_HEADER, EVENT_HEADER};

/// Largest payload GitHub will deliver.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub backporter: Backporter,
    /// Webhook signing secret. Empty disables verification.
    pub webhook_secret: Arc<str>,
    /// Flipped once the listener is bound.
    pub ready: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(backporter: Backporter, webhook_secret: &str) -> Self {
        Self {
            backporter,
            webhook_secret: Arc::from(webhook_secret),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = format!("{status}: {self}");
        warn!(status = %status, error = %self, "Rejecting webhook");
        (status, body).into_response()
    }
}

/// Build the HTTP router for the backport service.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(default_handler).post(webhook_handler))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness checks and browsers hitting the root.
async fn default_handler() -> StatusCode {
    debug!("Default handler");
    StatusCode::OK
}

async fn fallback(method: Method) -> StatusCode {
    if method == Method::GET {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Health check endpoint.
async fn health_check() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Readiness check endpoint.
async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    if state.ready.load(Ordering::SeqCst) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Handle an incoming GitHub webhook delivery.
///
/// Verifies the signature when a secret is configured, decodes the event
/// and hands it to the [`Backporter`]. The response body is a short summary
/// of what was handled.
pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<String, WebhookError> {
    let event_type = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingEventType)?;

    let delivery_id = headers
        .get(DELIVERY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    verify_request(&headers, &body, &state.webhook_secret)?;

    let event = events::decode(event_type, &body)?;

    info!(
        delivery_id = %delivery_id,
        event_kind = %event.kind(),
        "Received GitHub webhook"
    );

    let summary = state.backporter.handle_event(&event).await;
    debug!(delivery_id = %delivery_id, summary = %summary, "Webhook processed");
    Ok(summary)
}
