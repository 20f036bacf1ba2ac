use thiserror::Error;

use crate::appointment::AppointmentStatus;
use crate::outcome::{Outcome, OutcomeCode};

#[derive(Error, Debug)]
pub enum MedicareError {
    #[error("{0}")]
    Validation(String),

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl MedicareError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn code(&self) -> OutcomeCode {
        match self {
            Self::Validation(_) | Self::InvalidJson(_) => OutcomeCode::Invalid,
            Self::NotFound { .. } => OutcomeCode::NotFound,
            Self::Unauthorized(_) => OutcomeCode::Unauthorized,
            Self::Forbidden(_) => OutcomeCode::Forbidden,
            Self::Conflict(_) => OutcomeCode::Conflict,
            Self::InvalidTransition { .. } => OutcomeCode::InvalidTransition,
            Self::Storage(_) => OutcomeCode::Exception,
        }
    }

    /// Client-facing error body
    pub fn outcome(&self) -> Outcome {
        Outcome::new(self.code(), self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MedicareError>;
