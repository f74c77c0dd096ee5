//! Crate-wide error type.
//!
//! Every module returns [`AppError`] so that the web layer can map a failure
//! to a page in one place.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// A required form field was blank or malformed. Nothing was stored.
    #[error("{0}")]
    Validation(String),

    /// Username or password did not match.
    #[error("Invalid username or password")]
    AuthRejected,

    /// The container exists but could not be read or parsed.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Template error: {0}")]
    Template(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn storage(message: impl ToString) -> Self {
        AppError::StorageUnavailable(message.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
