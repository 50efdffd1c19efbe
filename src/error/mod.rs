use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Email build error: {0}")]
    EmailBuild(#[from] lettre::error::Error),

    #[error("Push provider error: {0}")]
    PushProvider(#[from] reqwest::Error),

    #[error("Token signing error: {0}")]
    TokenSigning(#[from] jsonwebtoken::errors::Error),

    #[error("Queue substrate error: {0}")]
    QueueSubstrate(#[from] crate::queue::QueueSubstrateError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Token registry error: {0}")]
    TokenRegistry(#[from] crate::token_registry::TokenRegistryError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, client_message, log_message) = match &self {
            AppError::Config(e) => {
                let log_msg = e.to_string();
                let client_msg = if is_production() {
                    "Configuration error".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", client_msg, log_msg)
            }
            AppError::Auth(msg) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Internal(e) => {
                let log_msg = e.clone();
                let client_msg = if is_production() {
                    "Internal server error".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", client_msg, log_msg)
            }
            AppError::Redis(e) => {
                let log_msg = e.to_string();
                let client_msg = if is_production() {
                    "Service temporarily unavailable".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "REDIS_ERROR", client_msg, log_msg)
            }
            AppError::Database(e) => {
                let log_msg = e.to_string();
                let client_msg = if is_production() {
                    "Service temporarily unavailable".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", client_msg, log_msg)
            }
            AppError::Smtp(e) => {
                let log_msg = e.to_string();
                (StatusCode::BAD_GATEWAY, "SMTP_ERROR", "email delivery failed".to_string(), log_msg)
            }
            AppError::EmailBuild(e) => {
                let log_msg = e.to_string();
                (StatusCode::INTERNAL_SERVER_ERROR, "EMAIL_BUILD_ERROR", "email delivery failed".to_string(), log_msg)
            }
            AppError::PushProvider(e) => {
                let log_msg = e.to_string();
                (StatusCode::BAD_GATEWAY, "PUSH_PROVIDER_ERROR", "push delivery failed".to_string(), log_msg)
            }
            AppError::TokenSigning(e) => {
                let log_msg = e.to_string();
                (StatusCode::INTERNAL_SERVER_ERROR, "TOKEN_SIGNING_ERROR", "internal error".to_string(), log_msg)
            }
            AppError::QueueSubstrate(e) => {
                let log_msg = e.to_string();
                (StatusCode::INTERNAL_SERVER_ERROR, "QUEUE_ERROR", "service temporarily unavailable".to_string(), log_msg)
            }
            AppError::Store(e) => {
                let log_msg = e.to_string();
                let status = if matches!(e, crate::store::StoreError::NotFound) {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, "STORE_ERROR", log_msg.clone(), log_msg)
            }
            AppError::TokenRegistry(e) => {
                let log_msg = e.to_string();
                let status = if matches!(e, crate::token_registry::TokenRegistryError::NotFound) {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, "TOKEN_REGISTRY_ERROR", log_msg.clone(), log_msg)
            }
        };

        // Always log the detailed error server-side
        tracing::error!(
            code = %code,
            status = %status.as_u16(),
            message = %log_message,
            "API error"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
