//! GlobalBank Gateway
//!
//! HTTP surface over the currency ledger: plugin routes for game servers and
//! session-authenticated routes for the web front-end.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod plugin_auth;

pub use api::{create_router, AppState};
pub use config::GatewayConfig;
pub use error::ApiError;
