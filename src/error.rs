//! Error types for Inkpress
//!
//! This module defines the main error type used throughout Inkpress and provides
//! mapping to machine-readable GraphQL error extension codes so clients can
//! branch on failure class instead of parsing messages.

use async_graphql::ErrorExtensions;
use thiserror::Error;

/// Result type alias for Inkpress operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// Main error type for Inkpress operations
#[derive(Error, Debug)]
pub enum ApiError {
    /// The operation needs a caller identity and none was presented.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// A credential was presented but could not be accepted: malformed,
    /// expired, or forged token, or a failed login. Deliberately carries
    /// no detail about which part was wrong.
    #[error("Invalid credential")]
    InvalidCredential,

    /// The caller is authenticated but does not own the target resource.
    #[error("Not authorized to perform this action")]
    NotAuthorized,

    /// The referenced entity does not exist (or is not visible to the caller).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// An input constraint was violated.
    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Server error: {0}")]
    Server(String),
}

impl ApiError {
    /// Machine-readable code attached to GraphQL errors under
    /// `extensions.code`.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            ApiError::InvalidCredential => "INVALID_CREDENTIAL",
            ApiError::NotAuthorized => "NOT_AUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_FAILED",
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Config(_) => "CONFIG_ERROR",
            ApiError::Io(_) => "IO_ERROR",
            ApiError::Serialization(_) => "SERIALIZATION_ERROR",
            ApiError::Server(_) => "SERVER_ERROR",
        }
    }

    /// Shorthand for a validation failure with a formatted message.
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", self.code()))
    }
}
