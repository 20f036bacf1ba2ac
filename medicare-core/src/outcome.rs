use serde::{Deserialize, Serialize};

/// JSON body returned for every failed request.
///
/// Clients read `message`; `code` is a stable machine-readable category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub message: String,
    pub code: OutcomeCode,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeCode {
    Invalid,
    NotFound,
    Unauthorized,
    Forbidden,
    Conflict,
    InvalidTransition,
    Exception,
}

impl Outcome {
    pub fn new(code: OutcomeCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(OutcomeCode::Invalid, message)
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(OutcomeCode::NotFound, format!("{} not found", what))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(OutcomeCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(OutcomeCode::Forbidden, message)
    }

    pub fn storage_error(message: impl Into<String>) -> Self {
        Self::new(OutcomeCode::Exception, message)
    }
}
