//! Error types for the core library.

use std::path::PathBuf;

use thiserror::Error;

use crate::mailbox::MailboxError;

/// Errors that can occur in core operations.
///
/// A failed scan or mutation always surfaces as one of these; a count of
/// zero is never used to signal failure.
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials were rejected, expired, or consent is missing.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The mailbox connection failed mid-operation.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The allow-list could not be written.
    #[error("Allow-list storage error at {}: {source}", path.display())]
    Storage {
        /// File that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential storage error.
    #[error("Credential error: {0}")]
    Credential(#[from] crate::credentials::CredentialError),

    /// Token acquisition or refresh failed.
    #[error("OAuth2 error: {0}")]
    OAuth(#[from] mailsweep_oauth::Error),

    /// The review session expired or was already cleared.
    #[error("Review session is no longer active")]
    SessionExpired,
}

impl From<MailboxError> for Error {
    fn from(err: MailboxError) -> Self {
        match err {
            MailboxError::Auth(reason) => Self::Auth(reason),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
