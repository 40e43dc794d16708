//! Network error types

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Outbound HTTP errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Wrap as a core upstream failure attributed to `provider`
    pub fn upstream(self, provider: &str) -> snapseek_core::Error {
        snapseek_core::Error::upstream(provider, self)
    }
}
