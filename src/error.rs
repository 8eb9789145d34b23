//! Error taxonomy shared by the store, the embedding provider and the HTTP layer.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LectroError>;

#[derive(Debug, Error)]
pub enum LectroError {
    /// Missing or unusable settings, e.g. no provider API key.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The store file exists but cannot be read or parsed.
    #[error("failed to read vector store '{path}': {reason}")]
    Read { path: String, reason: String },

    /// Serialization or disk write failed.
    #[error("failed to write vector store '{path}': {reason}")]
    Write { path: String, reason: String },

    /// The embedding provider failed to produce a vector.
    #[error("embedding provider error: {0}")]
    Provider(String),

    /// A request field is missing or out of range.
    #[error("invalid request: {0}")]
    Validation(String),
}

impl LectroError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LectroError::Validation(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        LectroError::Provider(msg.into())
    }
}

impl ResponseError for LectroError {
    fn status_code(&self) -> StatusCode {
        match self {
            LectroError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": self.to_string() }))
    }
}
