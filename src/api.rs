//! HTTP API handlers for SMAM.
//!
//! - **POST /queues/:name**: device gateway intake; the raw body is published
//!   onto the named queue unchanged.
//! - **GET /queues**: publish/ack counters per queue.
//! - **GET /alerts/recent**: alert history, newest first.
//! - **GET /alerts/subject/:id**: alert history for one subject.
//! - **GET /health**: liveness.
//!
//! Payload bodies are never logged; only queue names, tags and sizes.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::{debug, instrument, warn};

use crate::model::{AlertsResponse, RecentAlertsQuery};
use crate::queue::{Broker, QueueError, QueueStats};
use crate::storage::Storage;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub broker: Broker,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/queues", get(get_queues))
        .route("/queues/:name", post(post_message))
        .route("/alerts/recent", get(get_recent_alerts))
        .route("/alerts/subject/:id", get(get_subject_alerts))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /queues/:name - Publish a device message.
///
/// The body is either the legacy flattened encoding or a flat JSON object:
///
/// ```json
/// {"id": "A1", "datetime": "2019:03:01:10:15:45", "model": "Fitbit"}
/// ```
///
/// Returns `202 Accepted` once queued. Decoding happens in the subscriber,
/// so a malformed body is still accepted here and skipped there.
#[instrument(skip(state, body), fields(size = body.len()))]
pub async fn post_message(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    match state.broker.publish(&name, body.to_vec()).await {
        Ok(tag) => {
            debug!(queue = %name, tag, "Message published");
            StatusCode::ACCEPTED
        }
        Err(e @ QueueError::Unknown(_)) => {
            warn!(queue = %name, error = %e, "Publish to unknown queue");
            StatusCode::NOT_FOUND
        }
        Err(e) => {
            warn!(queue = %name, error = %e, "Publish failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GET /queues - Queue counters.
///
/// ```json
/// [{"name": "datetime", "published": 12, "acked": 12, "pending": 0}]
/// ```
pub async fn get_queues(State(state): State<AppState>) -> Json<Vec<QueueStats>> {
    Json(state.broker.stats())
}

/// GET /alerts/recent - Recent alerts.
///
/// # Query Parameters
///
/// - `limit` (optional): Maximum number of alerts (default: 50)
/// - `kind` (optional): `fall` or `medication`
#[instrument(skip(state))]
pub async fn get_recent_alerts(
    State(state): State<AppState>,
    Query(query): Query<RecentAlertsQuery>,
) -> Result<Json<AlertsResponse>, StatusCode> {
    match state.storage.recent_alerts(query.limit, query.kind).await {
        Ok(alerts) => {
            debug!(alert_count = alerts.len(), "Recent alerts queried");
            Ok(Json(AlertsResponse { alerts }))
        }
        Err(e) => {
            warn!(error = %e, "Failed to query recent alerts");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /alerts/subject/:id - All alerts for one subject.
#[instrument(skip(state))]
pub async fn get_subject_alerts(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> Result<Json<AlertsResponse>, StatusCode> {
    match state.storage.alerts_for_subject(&subject_id).await {
        Ok(alerts) => Ok(Json(AlertsResponse { alerts })),
        Err(e) => {
            warn!(subject_id = %subject_id, error = %e, "Failed to query subject alerts");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
