//! Read side of the history log.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
};
use std::sync::Arc;

use super::{reject, ApiResult};
use crate::AppState;

/// GET /api/history
pub async fn all(State(state): State<Arc<AppState>>) -> ApiResult {
    let records = state.history.lock().await.all().map_err(reject)?;
    Ok(Json(records).into_response())
}

/// GET /api/history/{route}
pub async fn by_route(State(state): State<Arc<AppState>>, Path(route): Path<String>) -> ApiResult {
    let records = state.history.lock().await.by_route(&route).map_err(reject)?;
    Ok(Json(records).into_response())
}

/// GET /api/history/{route}/{subroute}
pub async fn by_subroute(
    State(state): State<Arc<AppState>>,
    Path((route, subroute)): Path<(String, String)>,
) -> ApiResult {
    let records = state
        .history
        .lock()
        .await
        .by_route_and_subroute(&route, &subroute)
        .map_err(reject)?;
    Ok(Json(records).into_response())
}

/// GET /api/routes
pub async fn routes(State(state): State<Arc<AppState>>) -> ApiResult {
    let routes = state.history.lock().await.routes().map_err(reject)?;
    Ok(Json(routes).into_response())
}
