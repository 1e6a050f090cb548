//! Recording start/stop routes.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{StartRequest, StartResponse, StopRequest, StopResponse};
use crate::api::server::AppState;

/// Create the egress router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_recording))
        .route("/stop", post(stop_recording))
}

/// Start a composite recording for `sessionId`.
async fn start_recording(
    State(state): State<AppState>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> ApiResult<Json<StartResponse>> {
    let Json(request) = payload?;
    let session_id = request
        .session_id
        .ok_or_else(|| ApiError::bad_request("sessionId is required"))?;

    let started = state.orchestrator.start(&session_id).await?;
    Ok(Json(started.into()))
}

/// Stop the recording identified by `egressId`.
async fn stop_recording(
    State(state): State<AppState>,
    payload: Result<Json<StopRequest>, JsonRejection>,
) -> ApiResult<Json<StopResponse>> {
    let Json(request) = payload?;
    let egress_id = request
        .egress_id
        .ok_or_else(|| ApiError::bad_request("egressId is required"))?;

    let info = state.orchestrator.stop(&egress_id).await?;
    Ok(Json(info.into()))
}
