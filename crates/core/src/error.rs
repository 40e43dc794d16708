//! Error types for Snapseek Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    /// An identity or image provider failed. `detail` is for logs only.
    #[error("Upstream provider {provider} failed: {detail}")]
    Upstream { provider: String, detail: String },

    /// Blocking storage work was cancelled or panicked
    #[error("Background task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn upstream(provider: impl Into<String>, detail: impl ToString) -> Self {
        Error::Upstream {
            provider: provider.into(),
            detail: detail.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
