use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::AppState;
use crate::{error::AppResult, models::RecommendationPayload};

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Handler for the recommendations endpoint
///
/// Serves the cached payload when the user's collection is unchanged,
/// otherwise waits on a (single-flight) recomputation.
pub async fn get_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<RecommendationPayload>> {
    tracing::info!(%user_id, "Processing recommendation request");

    let payload = state.recommendations.get_recommendations(user_id).await?;

    Ok(Json(payload))
}

/// Handler for administrative cache invalidation
pub async fn invalidate_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    tracing::info!(%user_id, "Invalidating recommendation cache");

    state.recommendations.invalidate(user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
