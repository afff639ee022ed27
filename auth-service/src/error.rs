//! Error types for the authenticator

use globalbank_ledger::ErrorKind;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, AuthError>;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown user or wrong password
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Token unknown, expired or logged out
    #[error("Session not found or expired")]
    SessionNotFound,

    /// Password hashing failed
    #[error("Password hashing error: {0}")]
    Hashing(String),

    /// Store or validation failure from the ledger crate
    #[error(transparent)]
    Ledger(#[from] globalbank_ledger::Error),
}

impl AuthError {
    /// Whether the caller failed to prove who it is
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, AuthError::InvalidCredentials | AuthError::SessionNotFound)
    }

    /// Ledger taxonomy kind, `None` for authentication failures
    pub fn ledger_kind(&self) -> Option<ErrorKind> {
        match self {
            AuthError::Ledger(e) => Some(e.kind()),
            AuthError::Hashing(_) => Some(ErrorKind::Internal),
            AuthError::InvalidCredentials | AuthError::SessionNotFound => None,
        }
    }
}
