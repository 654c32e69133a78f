use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LensError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Content service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Malformed response from content service: {0}")]
    MalformedResponse(String),

    #[error("Article not found: {0}")]
    ArticleNotFound(String),

    #[error("Invalid complexity level: {0} (expected 1-5)")]
    InvalidComplexityLevel(u8),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error(transparent)]
    Joined(Arc<LensError>),

    #[error("{0}")]
    Other(String),
}

impl LensError {
    /// True for failures of the remote content service: rejected requests,
    /// non-success statuses and bodies that cannot be decoded.
    pub fn is_network_failure(&self) -> bool {
        match self {
            LensError::Http(_)
            | LensError::ServiceUnavailable(_)
            | LensError::MalformedResponse(_) => true,
            LensError::Joined(inner) => inner.is_network_failure(),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            LensError::Cancelled => true,
            LensError::Joined(inner) => inner.is_cancelled(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LensError>;
