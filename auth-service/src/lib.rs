//! GlobalBank Authenticator
//!
//! Credential checks and short-lived session tokens for the web front-end.
//! The ledger never sees tokens; it receives the resolved [`Account`].
//!
//! [`Account`]: globalbank_ledger::Account

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod authenticator;
pub mod error;
pub mod password;
pub mod provisioning;

// Re-exports
pub use authenticator::{
    spawn_session_sweeper, Authenticator, Session, SessionAuthenticator,
    DEFAULT_SESSION_TTL_SECS,
};
pub use error::{AuthError, Result};
pub use provisioning::provision_account;
