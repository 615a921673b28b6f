use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenealogyError {
    #[error("No identifier or root node could be resolved: {0}")]
    MissingRoot(String),

    #[error("Root not found: {0}")]
    NotFound(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`GenealogyError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MissingRoot,
    NotFound,
    FetchFailed,
    Unauthorized,
    InvalidRequest,
    Config,
}

impl GenealogyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenealogyError::MissingRoot(_) => ErrorKind::MissingRoot,
            GenealogyError::NotFound(_) => ErrorKind::NotFound,
            GenealogyError::FetchFailed(_) => ErrorKind::FetchFailed,
            GenealogyError::Unauthorized(_) => ErrorKind::Unauthorized,
            GenealogyError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            GenealogyError::Config(_) => ErrorKind::Config,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::MissingRoot => "missing_root",
            ErrorKind::NotFound => "not_found",
            ErrorKind::FetchFailed => "fetch_failed",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Config => "config",
        };
        write!(f, "{}", s)
    }
}

impl From<serde_json::Error> for GenealogyError {
    fn from(err: serde_json::Error) -> Self {
        GenealogyError::FetchFailed(format!("Malformed response payload: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, GenealogyError>;
