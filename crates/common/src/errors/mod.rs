//! Error types for PaperPilot
//!
//! Provides:
//! - Distinct error variants for each failure mode
//! - Machine-readable error codes
//! - A category mapping used by callers to decide between
//!   degrading to a default and surfacing the failure

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Resource errors (4xxx)
    UserNotFound,
    PaperNotFound,
    NoRecommendations,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External service errors (8xxx)
    UpstreamError,
    UpstreamStatus,
    UpstreamTimeout,
    MalformedResponse,
    PdfExtraction,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::UserNotFound => 4001,
            ErrorCode::PaperNotFound => 4002,
            ErrorCode::NoRecommendations => 4003,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::UpstreamStatus => 8002,
            ErrorCode::UpstreamTimeout => 8003,
            ErrorCode::MalformedResponse => 8004,
            ErrorCode::PdfExtraction => 8005,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Failure taxonomy shared by every pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Provider error or timeout; callers substitute a safe default
    UpstreamUnavailable,
    /// Unparseable provider or LLM output; handled like an outage
    MalformedResponse,
    /// An explicitly requested entity does not exist; always surfaced
    NotFound,
    /// Storage failure, scoped to the unit of work that failed
    Persistence,
    /// Caller supplied unusable input
    InvalidInput,
    Internal,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("User not found: {id}")]
    UserNotFound { id: String },

    #[error("Paper not found: {id}")]
    PaperNotFound { id: String },

    #[error("No recommendations for user {user_id} on {date}")]
    NoRecommendations { user_id: String, date: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("{service} request failed: {message}")]
    Upstream { service: String, message: String },

    #[error("{service} returned HTTP {status}")]
    UpstreamStatus { service: String, status: u16 },

    #[error("{service} timed out after {timeout_ms}ms")]
    UpstreamTimeout { service: String, timeout_ms: u64 },

    #[error("Malformed {service} response: {message}")]
    MalformedResponse { service: String, message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("PDF extraction failed for {source_id}: {message}")]
    PdfExtraction { source_id: String, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Build an upstream error from a reqwest failure, keeping timeouts distinct
    pub fn from_request(service: &str, timeout_ms: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::UpstreamTimeout {
                service: service.to_string(),
                timeout_ms,
            }
        } else if let Some(status) = err.status() {
            AppError::UpstreamStatus {
                service: service.to_string(),
                status: status.as_u16(),
            }
        } else {
            AppError::Upstream {
                service: service.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Shorthand for a malformed-response error
    pub fn malformed(service: &str, message: impl Into<String>) -> Self {
        AppError::MalformedResponse {
            service: service.to_string(),
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::UserNotFound { .. } => ErrorCode::UserNotFound,
            AppError::PaperNotFound { .. } => ErrorCode::PaperNotFound,
            AppError::NoRecommendations { .. } => ErrorCode::NoRecommendations,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::UpstreamStatus { .. } => ErrorCode::UpstreamStatus,
            AppError::UpstreamTimeout { .. } => ErrorCode::UpstreamTimeout,
            AppError::MalformedResponse { .. } => ErrorCode::MalformedResponse,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::PdfExtraction { .. } => ErrorCode::PdfExtraction,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the taxonomy category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Upstream { .. }
            | AppError::UpstreamStatus { .. }
            | AppError::UpstreamTimeout { .. }
            | AppError::HttpClient(_) => ErrorCategory::UpstreamUnavailable,

            AppError::MalformedResponse { .. }
            | AppError::PdfExtraction { .. }
            | AppError::Serialization(_) => ErrorCategory::MalformedResponse,

            AppError::UserNotFound { .. }
            | AppError::PaperNotFound { .. }
            | AppError::NoRecommendations { .. } => ErrorCategory::NotFound,

            AppError::Database(_) | AppError::DatabaseConnection { .. } => {
                ErrorCategory::Persistence
            }

            AppError::Validation { .. } => ErrorCategory::InvalidInput,

            AppError::Internal { .. } | AppError::Configuration { .. } | AppError::Other(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Whether the failure concerns an explicitly identified entity
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// Whether the failure came from an external provider
    pub fn is_upstream(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::UpstreamUnavailable | ErrorCategory::MalformedResponse
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
