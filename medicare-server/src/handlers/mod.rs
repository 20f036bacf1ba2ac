pub mod accounts;
pub mod appointments;
pub mod health;
pub mod history;
pub mod password_reset;
pub mod patients;
pub mod supply;

use axum::{
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use http_body_util::BodyExt;
use medicare_core::{HistoryRecord, MedicareError};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::auth::Actor;
use crate::realtime::Notice;
use crate::AppState;

pub type ApiError = (StatusCode, Json<Value>);
pub type ApiResult = Result<Response, ApiError>;

pub fn status_for(err: &MedicareError) -> StatusCode {
    match err {
        MedicareError::Validation(_) | MedicareError::InvalidJson(_) => StatusCode::BAD_REQUEST,
        MedicareError::NotFound { .. } => StatusCode::NOT_FOUND,
        MedicareError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        MedicareError::Forbidden(_) => StatusCode::FORBIDDEN,
        MedicareError::Conflict(_) | MedicareError::InvalidTransition { .. } => StatusCode::CONFLICT,
        MedicareError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Turn any domain error into the JSON error response.
pub fn reject(err: impl Into<MedicareError>) -> ApiError {
    let err = err.into();
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    }
    (status, Json(json!(err.outcome())))
}

/// Read the request body as JSON
pub async fn extract_body(request: Request) -> Result<Value, ApiError> {
    let bytes = request
        .into_body()
        .collect()
        .await
        .map_err(|e| reject(MedicareError::validation(e.to_string())))?
        .to_bytes();

    serde_json::from_slice(&bytes)
        .map_err(|_| reject(MedicareError::validation("Invalid request body")))
}

/// Decode a JSON body into a request type.
pub fn parse<T: DeserializeOwned>(body: Value) -> medicare_core::Result<T> {
    serde_json::from_value(body)
        .map_err(|e| MedicareError::validation(format!("Invalid request body: {}", e)))
}

pub fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(json!({ "message": text.into() }))).into_response()
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Enqueue notices and record history for a completed write.
///
/// Both are best-effort and never affect the response.
pub fn publish(state: &AppState, actor: Option<&Actor>, notices: Vec<Notice>, record: HistoryRecord) {
    let causing = actor.map(|a| a.session_key.as_str());
    for notice in notices {
        state.hub.notify(notice.caused_by(causing));
    }
    crate::history::record(&state.history, record.by(actor.map(Actor::view)));
}
