use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::services::presence_backend::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Presence store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Guest session not found")]
    GuestNotFound,

    #[error("You are not connected to anyone")]
    NotPartnered,

    #[error("Your partner is no longer available")]
    PartnerUnavailable,

    #[error("Invalid message: {0}")]
    Validation(String),

    #[error("No users available for matching right now")]
    NoCandidates,

    #[error("Already connected to a partner")]
    AlreadyPartnered,

    #[error("Blob not found: {0}")]
    BlobNotFound(Uuid),

    #[error("Blob too large: {size} bytes (max {max})")]
    BlobTooLarge { size: usize, max: usize },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::StoreUnavailable(e) => {
                tracing::error!("Store error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable".to_string())
            }
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, format!("Authentication failed: {}", msg))
            }
            AppError::GuestNotFound => {
                (StatusCode::NOT_FOUND, "Guest session not found".to_string())
            }
            e @ (AppError::NotPartnered | AppError::AlreadyPartnered) => {
                (StatusCode::CONFLICT, e.to_string())
            }
            e @ (AppError::PartnerUnavailable | AppError::NoCandidates) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            e @ AppError::BlobNotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
            e @ AppError::BlobTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()),
            AppError::RateLimitExceeded => {
                (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded".to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Configuration error: {}", msg),
            ),
        };

        let body = Json(json!({
            "error": error_message,
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
