use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    TunnelWatchError,
    models::{ReportSubmission, Tunnel, TunnelTrafficStatus},
    traffic::{RejectionReason, ReportIngestCoordinator, SubmissionOutcome},
};

/// Shared state of all API handlers
pub struct AppState {
    pub coordinator: ReportIngestCoordinator,
    /// Tunnel used when a request does not name one
    pub default_tunnel_id: Uuid,
}

#[derive(Deserialize)]
struct TunnelQuery {
    id: Option<String>,
}

#[derive(Deserialize)]
struct StatusQuery {
    #[serde(rename = "tunnelId")]
    tunnel_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportAccepted {
    pub id: Uuid,
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Error responses of the API
#[derive(Debug)]
pub enum ApiError {
    Rejected(RejectionReason),
    Failed(TunnelWatchError),
}

impl From<TunnelWatchError> for ApiError {
    fn from(err: TunnelWatchError) -> Self {
        ApiError::Failed(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Rejected(reason) => {
                let (status, message) = match reason {
                    RejectionReason::NotFound => (StatusCode::NOT_FOUND, "Tunnel not found"),
                    RejectionReason::OutOfGeofence => (
                        StatusCode::FORBIDDEN,
                        "User is not at the required location",
                    ),
                    RejectionReason::Cooldown => (
                        StatusCode::TOO_MANY_REQUESTS,
                        "You have already reported this entrance recently",
                    ),
                };
                (status, json!({ "error": message, "reason": reason }))
            }
            ApiError::Failed(err) => {
                let status = match &err {
                    TunnelWatchError::Validation { .. } => StatusCode::BAD_REQUEST,
                    TunnelWatchError::NotFound { .. } => StatusCode::NOT_FOUND,
                    _ => {
                        tracing::error!("Request failed: {err}");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, json!({ "error": err.user_message() }))
            }
        };
        (status, Json(body)).into_response()
    }
}

fn parse_tunnel_id(raw: Option<&str>, default: Uuid) -> Result<Uuid, ApiError> {
    match raw {
        None => Ok(default),
        Some(raw) => Uuid::parse_str(raw)
            .map_err(|_| TunnelWatchError::validation("Invalid tunnel ID").into()),
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tunnel", get(get_tunnel))
        .route("/traffic/report", post(submit_report))
        .route("/traffic/status", get(get_status))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

async fn get_tunnel(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TunnelQuery>,
) -> Result<Json<Tunnel>, ApiError> {
    let tunnel_id = parse_tunnel_id(query.id.as_deref(), state.default_tunnel_id)?;
    let tunnel = state.coordinator.get_tunnel(tunnel_id).await?;
    Ok(Json(tunnel))
}

async fn submit_report(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReportSubmission>, JsonRejection>,
) -> Result<Json<ReportAccepted>, ApiError> {
    let Json(submission) =
        payload.map_err(|rejection| TunnelWatchError::validation(rejection.body_text()))?;

    match state.coordinator.submit_report(submission).await? {
        SubmissionOutcome::Accepted {
            report_id,
            timestamp,
        } => Ok(Json(ReportAccepted {
            id: report_id,
            success: true,
            message: "Traffic report recorded successfully".to_string(),
            timestamp,
        })),
        SubmissionOutcome::Rejected { reason } => Err(ApiError::Rejected(reason)),
    }
}

async fn get_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<TunnelTrafficStatus>, ApiError> {
    let tunnel_id = parse_tunnel_id(query.tunnel_id.as_deref(), state.default_tunnel_id)?;
    let status = state.coordinator.get_status(tunnel_id).await?;
    Ok(Json(status))
}
