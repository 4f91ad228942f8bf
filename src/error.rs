//! Error types for batch-dl
//!
//! This module provides error handling for the library, including:
//! - The crate-wide [`Error`] enum and [`Result`] alias
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use crate::engine::RetrievalError;
use crate::types::ItemId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for batch-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for batch-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_downloads")
        key: Option<String>,
    },

    /// Malformed request, rejected before it reaches the store
    #[error("validation error: {0}")]
    Validation(String),

    /// Item-related error
    #[error("item error: {0}")]
    Item(#[from] ItemError),

    /// Generic resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// `start()` called with nothing pending
    #[error("no pending items to start")]
    NoEligibleWork,

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress: not accepting new work")]
    ShuttingDown,

    /// Failure reported by the retrieval engine
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// External tool could not be located or executed (yt-dlp, ffmpeg)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Item-related errors
#[derive(Debug, Error)]
pub enum ItemError {
    /// No item with this identifier exists
    #[error("item {id} not found")]
    NotFound {
        /// The item ID that was not found
        id: ItemId,
    },

    /// Item is not in the state the operation needs
    #[error("item {id} is {current_state}, cannot {operation}")]
    InvalidState {
        /// The item ID
        id: ItemId,
        /// The attempted operation (e.g., "fetch file")
        operation: String,
        /// The state that prevents it
        current_state: String,
    },
}

impl Error {
    /// Shorthand for an unknown-item error
    pub fn item_not_found(id: ItemId) -> Self {
        Error::Item(ItemError::NotFound { id })
    }

    /// Whether this error means the referenced item does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::Item(ItemError::NotFound { .. }))
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "item_not_found",
///     "message": "item error: item 3f2c... not found",
///     "details": {
///       "item_id": "3f2c..."
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "item_not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,
            Error::NoEligibleWork => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::Item(ItemError::NotFound { .. }) => 404,

            // 409 Conflict
            Error::Item(ItemError::InvalidState { .. }) => 409,

            // 500 Internal Server Error
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,

            // 502 Bad Gateway - engine failures
            Error::Retrieval(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
            Error::ExternalTool(_) => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::Item(ItemError::NotFound { .. }) => "item_not_found",
            Error::Item(ItemError::InvalidState { .. }) => "invalid_state",
            Error::NotFound(_) => "not_found",
            Error::NoEligibleWork => "no_eligible_work",
            Error::ShuttingDown => "shutting_down",
            Error::Retrieval(_) => "retrieval_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Item(ItemError::NotFound { id }) => Some(serde_json::json!({
                "item_id": id,
            })),
            Error::Item(ItemError::InvalidState {
                id,
                operation,
                current_state,
            }) => Some(serde_json::json!({
                "item_id": id,
                "operation": operation,
                "current_state": current_state,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
