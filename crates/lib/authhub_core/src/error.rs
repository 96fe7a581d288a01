//! Engine error taxonomy.
//!
//! Every operation in the engine fails through [`HubError`]. The credential
//! and token variants are deliberately generic: callers never learn whether
//! an email was unknown or a password wrong, nor whether a token was expired
//! or forged.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, HubError>;

/// Authentication/authorization engine errors.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Validation error on `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Unknown authentication method: {0}")]
    UnknownMethod(String),

    #[error("Authentication method not implemented: {0}")]
    UnsupportedMethod(String),

    /// Never reveals which credential factor was wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid service: {0}")]
    InvalidService(String),

    /// Covers expired, forged and malformed tokens alike.
    #[error("Invalid token")]
    InvalidToken,

    /// AEAD integrity failure while decrypting a stored secret.
    #[error("Secret integrity check failed")]
    TamperedSecret,

    #[error("Malformed secret blob: {0}")]
    SecretFormat(String),

    #[error("At least one admin account must remain")]
    LastAdmin,

    /// Should-be-unreachable state; the call fails closed.
    #[error("Internal inconsistency: {0}")]
    Inconsistency(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// Shorthand for a field-level validation failure.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}
