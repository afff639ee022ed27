//! Error types for the currency ledger

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Access policy denial (wrong role or wrong server scope)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Debit would take the balance below zero
    #[error("Insufficient balance: balance {balance}, requested change {requested}")]
    InsufficientBalance {
        /// Balance at the time of the rejected call
        balance: Decimal,
        /// Signed amount that was requested
        requested: Decimal,
    },

    /// Business-rule conflict (issuance below circulating supply)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Lookup miss (sessions, accounts)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Store unavailable or timed out; the caller may retry
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error taxonomy as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input
    Validation,
    /// Policy denial
    Forbidden,
    /// Debit below zero
    InsufficientBalance,
    /// Issuance below circulating supply
    Conflict,
    /// Lookup miss
    NotFound,
    /// Retryable storage failure
    Transient,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Stable name used in API responses
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InsufficientBalance => "insufficient_balance",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Transient => "transient",
            ErrorKind::Internal => "internal",
        }
    }
}

impl Error {
    /// Taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Transient(_) | Error::Storage(_) | Error::Concurrency(_) | Error::Io(_) => {
                ErrorKind::Transient
            }
            Error::Serialization(_) | Error::Config(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller may retry with a fresh request.
    ///
    /// Business-rule failures are terminal.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_are_terminal() {
        assert!(!Error::Validation("x".into()).is_transient());
        assert!(!Error::Forbidden("x".into()).is_transient());
        assert!(!Error::Conflict("x".into()).is_transient());
        assert!(!Error::InsufficientBalance {
            balance: Decimal::from(100),
            requested: Decimal::from(-150),
        }
        .is_transient());
    }

    #[test]
    fn test_storage_errors_are_transient() {
        assert!(Error::Storage("down".into()).is_transient());
        assert!(Error::Transient("timeout".into()).is_transient());
        assert!(Error::Concurrency("mailbox closed".into()).is_transient());
        assert_eq!(Error::Storage("down".into()).kind().as_str(), "transient");
    }
}
