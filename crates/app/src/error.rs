//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Failed to fetch images.")]
    SearchFailed,

    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    pub const ACCESS_DENIED: &'static str = "Access denied. Please log in.";

    /// Replace the generic 500 message with an endpoint-specific one
    pub fn or_internal(self, message: &'static str) -> Self {
        match self {
            ApiError::Internal(_) => ApiError::Internal(message),
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::SearchFailed | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<snapseek_core::Error> for ApiError {
    fn from(err: snapseek_core::Error) -> Self {
        use snapseek_core::Error;

        match err {
            Error::Validation(message) => ApiError::BadRequest(message),
            Error::Unauthorized => ApiError::Unauthorized(Self::ACCESS_DENIED),
            Error::Upstream { provider, detail } => {
                error!(%provider, %detail, "Upstream provider error");
                ApiError::SearchFailed
            }
            other => {
                error!(error = %other, "Request failed");
                ApiError::Internal("Internal server error.")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "message": self.to_string() }))).into_response()
    }
}
