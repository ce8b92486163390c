use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Failures surfaced by the write endpoint.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Too many requests")]
    RateLimitExceeded,

    #[error("Invalid document type")]
    InvalidDocumentType,

    #[error("Missing required fields")]
    MissingRequiredFields,

    #[error("Invalid action")]
    InvalidAction,

    #[error("Invalid request body")]
    InvalidBody,

    /// Downstream failure; the detail is for logs only.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl WriteError {
    pub fn status(&self) -> StatusCode {
        match self {
            WriteError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            WriteError::InvalidDocumentType
            | WriteError::MissingRequiredFields
            | WriteError::InvalidAction
            | WriteError::InvalidBody => StatusCode::BAD_REQUEST,
            WriteError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to the caller.
    pub fn public_message(&self) -> String {
        match self {
            WriteError::StoreUnavailable(_) => "Failed to write document".to_owned(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for WriteError {
    fn into_response(self) -> Response {
        if let WriteError::StoreUnavailable(detail) = &self {
            tracing::error!(%detail, "document write failed");
        }

        let payload = Json(ErrorResponse {
            error: self.public_message(),
        });

        (self.status(), payload).into_response()
    }
}

/// Startup failures returned from `main`.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid redis configuration: {0}")]
    Redis(#[from] redis::RedisError),
}
