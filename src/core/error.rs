//! Error types and error handling for mailgate.
//!
//! This module defines the error types used throughout the
//! application. HTTP status mapping lives in the `http` adapter.

use thiserror::Error;

/// Result type alias for mailgate operations
pub type Result<T> = std::result::Result<T, MailgateError>;

/// Main error type for mailgate
///
/// The first six variants form the gateway's backend taxonomy and carry
/// the backend's diagnostic text verbatim.
#[derive(Error, Debug)]
pub enum MailgateError {
    #[error("Failed to open notmuch database: {0}")]
    BackendUnavailable(String),

    #[error("Failed to create query: {0}")]
    QueryConstructionFailed(String),

    #[error("Failed to execute query: {0}")]
    QueryExecutionFailed(String),

    #[error("Failed to count messages: {0}")]
    CountFailed(String),

    #[error("Failed to find message: {0}")]
    LookupFailed(String),

    #[error("Failed to add tag: {0}")]
    TagApplicationFailed(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Email not found: {0}")]
    EmailNotFound(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl MailgateError {
    /// Get user-friendly error message
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Check if this is a "not found" type error
    pub fn is_not_found(&self) -> bool {
        matches!(self, MailgateError::EmailNotFound(_))
    }

    /// Check if this is a bad request error (invalid input)
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            MailgateError::InvalidQuery(_) | MailgateError::InvalidRequest(_)
        )
    }

    /// Check if the backend could not be opened at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, MailgateError::BackendUnavailable(_))
    }
}
