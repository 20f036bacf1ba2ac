use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
};
use medicare_core::{Account, AccountKind, MedicareError};
use medicare_store::document_store;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{reject, ApiResult};
use crate::AppState;

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "connections": state.hub.connection_count().await,
    }))
}

/// GET /api/active
///
/// Accounts holding at least one live realtime connection.
pub async fn active(State(state): State<Arc<AppState>>) -> ApiResult {
    let ids = state.hub.active_account_ids().await;
    let validator = state.validator();

    let mut views = Vec::with_capacity(ids.len());
    for id in ids {
        match validator.locate(&id).map_err(reject)? {
            Some((kind, account)) => views.push(account.typed_view(kind)),
            None => tracing::debug!(account = %id, "Connected account no longer exists"),
        }
    }
    Ok(Json(views).into_response())
}

/// GET /api/active/{id}
///
/// One connected account by id, or every connected account of a collection
/// when `id` names one (`users`, `staffs`, `doctors`). Session keys are
/// never echoed back.
pub async fn active_one(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let ids = state.hub.active_account_ids().await;

    if ids.contains(&id) {
        return match state.validator().locate(&id).map_err(reject)? {
            Some((kind, account)) => Ok(Json(account.typed_view(kind)).into_response()),
            None => Err(reject(MedicareError::not_found("Account"))),
        };
    }

    let Some(kind) = AccountKind::from_collection(&id) else {
        return Err(reject(MedicareError::not_found("Connection")));
    };
    let mut views = Vec::new();
    for account_id in ids {
        if let Some(account) =
            document_store::load::<Account>(state.store.as_ref(), kind.collection(), &account_id)
                .map_err(reject)?
        {
            views.push(account.typed_view(kind));
        }
    }
    Ok(Json(views).into_response())
}
