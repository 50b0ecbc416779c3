use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

// --- Domain/Infrastructure Errors ---

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("{0} not found with ID: {1}")]
    NotFound(&'static str, Uuid),

    #[error("Stored record could not be decoded: {0}")]
    DataCorruption(String),

    #[error("Database backend error: {0}")]
    BackendError(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum AiError {
    #[error("AI request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("AI provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("AI response contained no text")]
    EmptyResponse,
}

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Invalid payload for {event}: {reason}")]
    InvalidPayload { event: &'static str, reason: String },
}

// --- Web Layer Error ---

#[derive(Error, Debug)]
pub enum AppError {
    // Input validation / request parsing errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Validation failed: {0:?}")]
    Validation(Vec<String>),
    #[error("Invalid query parameters: {0:?}")]
    InvalidQuery(Vec<String>),
    #[error("Malformed request body: {0}")]
    MalformedBody(#[from] JsonRejection),
    #[error("Invalid ID format: {0}")]
    InvalidUuid(#[from] uuid::Error),
    #[error("Insufficient credits: {available} available, {required} required")]
    InsufficientCredits { required: u32, available: u32 },

    // Authentication
    #[error("{error}: {message}")]
    Unauthorized { error: &'static str, message: String },

    // Domain/Service level errors (mapped from RepoError)
    #[error("{0} not found")]
    NotFound(String),
    #[error("Could not access stored data")]
    RepositoryError(#[source] RepoError),

    // Configuration / Startup errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Initialization error: {0}")]
    InitError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // Generic Internal Server Error
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    pub fn unauthorized(error: &'static str, message: impl Into<String>) -> Self {
        AppError::Unauthorized {
            error,
            message: message.into(),
        }
    }
}

// --- Conversions from Domain Errors to AppError ---

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(kind, id) => AppError::NotFound(format!("{} with ID {}", kind, id)),
            e => AppError::RepositoryError(e),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(err: QueryRejection) -> Self {
        AppError::InvalidQuery(vec![err.body_text()])
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

// --- Axum Response Implementation ---

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            // 4xx Client Errors
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Validation failed", "details": details }),
            ),
            AppError::InvalidQuery(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid query parameters", "details": details }),
            ),
            AppError::MalformedBody(e) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Malformed request body", "details": [e.body_text()] }),
            ),
            AppError::InvalidUuid(e) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("Invalid ID format: {}", e) }),
            ),
            AppError::InsufficientCredits { .. } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Insufficient credits", "message": self.to_string() }),
            ),
            AppError::Unauthorized { error, message } => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": error, "message": message }),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("{} not found", what) }),
            ),

            // 5xx Server Errors
            AppError::RepositoryError(e) => {
                tracing::error!(error.source = ?e, "Repository error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Database operation failed" }),
                )
            }
            AppError::ConfigError(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Server configuration error" }),
                )
            }
            AppError::InitError(msg) => {
                tracing::error!("Initialization error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Server initialization error" }),
                )
            }
            AppError::IoError(e) => {
                tracing::error!(error = %e, "IO error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "An internal server error occurred" }),
                )
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "An internal server error occurred" }),
                )
            }
        };

        if status.is_server_error() {
            tracing::error!(error.status = %status, error.detail = %self, "Responding with error");
        } else {
            tracing::warn!(error.status = %status, error.detail = %self, "Rejecting request");
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_not_found_maps_to_404() {
        let id = Uuid::new_v4();
        let response = AppError::from(RepoError::NotFound("Meme", id)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn backend_failures_map_to_500() {
        let err = RepoError::BackendError(anyhow::anyhow!("connection reset"));
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_maps_to_400() {
        let response = AppError::Validation(vec!["title is required".into()]).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
