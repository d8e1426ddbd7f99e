use std::fmt;
use taskbay_storage::StorageError;
use thiserror::Error;

/// Market error taxonomy.
///
/// Every business-rule violation maps onto one of these; the HTTP layer
/// translates them to status codes (NotFound → 404, Forbidden → 403,
/// InvalidState/Validation → 400, Conflict → 409, Storage → 500).
#[derive(Error, Debug, Clone)]
pub enum MarketError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cannot {attempted}: current state is {current}")]
    InvalidState { attempted: String, current: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl MarketError {
    pub fn invalid_state(attempted: impl Into<String>, current: impl fmt::Display) -> Self {
        Self::InvalidState {
            attempted: attempted.into(),
            current: current.to_string(),
        }
    }
}

impl From<StorageError> for MarketError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(what) => MarketError::NotFound(what),
            other => MarketError::Storage(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;
