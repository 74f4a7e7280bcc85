use axum::{
    extract::multipart::MultipartRejection,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Postgres SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for foreign key violations.
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum CardHubError {
    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Authorization error: {message}")]
    Authorization { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl CardHubError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::Authorization { .. } => "AUTHORIZATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Database { .. } => 500,
            Self::Validation { .. } => 400,
            Self::Authentication { .. } => 401,
            Self::Authorization { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::Configuration { .. } => 500,
            Self::Storage { .. } => 500,
            Self::Internal { .. } => 500,
        }
    }

    /// Message safe to return to clients. Server-side details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "Internal server error".to_string()
            }
            Self::Storage { .. } => "File could not be stored".to_string(),
            Self::Validation { message, .. } => message.clone(),
            Self::Authentication { message }
            | Self::Authorization { message }
            | Self::Conflict { message } => message.clone(),
            Self::NotFound { resource } => format!("{resource} not found"),
        }
    }
}

pub type CardHubResult<T> = Result<T, CardHubError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl From<&CardHubError> for ErrorResponse {
    fn from(error: &CardHubError) -> Self {
        let details = match error {
            CardHubError::Validation { field, .. } => Some(serde_json::json!({ "field": field })),
            _ => None,
        };
        Self {
            error: error.error_code().to_lowercase(),
            code: error.error_code().to_string(),
            message: error.public_message(),
            details,
        }
    }
}

impl IntoResponse for CardHubError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "Request failed");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "Request rejected");
        }

        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

/// Constraint violations a client can resolve map to `Conflict`.
fn constraint_conflict(db_error: &dyn sqlx::error::DatabaseError) -> Option<CardHubError> {
    let constraint = db_error.constraint().unwrap_or("value");
    match db_error.code().as_deref() {
        Some(UNIQUE_VIOLATION) => Some(CardHubError::conflict(format!(
            "A record with the same {constraint} already exists"
        ))),
        Some(FOREIGN_KEY_VIOLATION) => Some(CardHubError::conflict(format!(
            "The record is still referenced ({constraint})"
        ))),
        _ => None,
    }
}

// Conversion from common error types
impl From<sqlx::Error> for CardHubError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            if let Some(conflict) = constraint_conflict(db_error.as_ref()) {
                return conflict;
            }
        }
        Self::database(error.to_string())
    }
}

/// Repository errors arrive as `anyhow` chains; a `sqlx::Error` anywhere in the
/// chain decides the mapping.
impl From<anyhow::Error> for CardHubError {
    fn from(error: anyhow::Error) -> Self {
        match error.chain().find_map(|cause| cause.downcast_ref::<sqlx::Error>()) {
            Some(sqlx::Error::Database(db_error)) => constraint_conflict(db_error.as_ref())
                .unwrap_or_else(|| Self::database(format!("{error:#}"))),
            _ => Self::database(format!("{error:#}")),
        }
    }
}

impl From<JsonRejection> for CardHubError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation("body", rejection.body_text())
    }
}

impl From<QueryRejection> for CardHubError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation("query", rejection.body_text())
    }
}

impl From<PathRejection> for CardHubError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation("path", rejection.body_text())
    }
}

impl From<MultipartRejection> for CardHubError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::validation("file", rejection.body_text())
    }
}

impl From<serde_json::Error> for CardHubError {
    fn from(error: serde_json::Error) -> Self {
        Self::validation("JSON", error.to_string())
    }
}

impl From<std::io::Error> for CardHubError {
    fn from(error: std::io::Error) -> Self {
        Self::storage(error.to_string())
    }
}
