//! Key management adapter error types

use cloudwait::{ApiError, WaitError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KmsError {
    #[error(transparent)]
    Wait(#[from] WaitError<ApiError>),

    #[error("Invalid key policy JSON: {0}")]
    InvalidPolicy(#[from] serde_json::Error),

    #[error("Concurrency gate closed: {0}")]
    GateClosed(String),
}

impl KmsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, KmsError::Wait(err) if err.is_not_found())
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, KmsError::Wait(err) if err.is_timed_out())
    }

    /// Service error code behind this failure, looking through timeouts
    pub fn code(&self) -> Option<&str> {
        match self {
            KmsError::Wait(err) => err.root().as_remote().map(|e| e.code.as_str()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, KmsError>;
