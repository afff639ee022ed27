//! GlobalBank Ledger Core
//!
//! Per-player virtual-currency balances across independent game servers.
//!
//! # Architecture
//!
//! - **Single Writer**: One actor task owns every read-modify-write, so
//!   balance syncs and issuance changes never interleave
//! - **Access Policy**: Every multi-row read and every issuance is scoped
//!   by the caller's role before it reaches the store
//! - **Pluggable Store**: RocksDB for durability, in-memory for tests
//!
//! # Invariants
//!
//! - Every balance is non-negative after every committed operation
//! - A committed issuance is never below the server's circulating supply
//! - An owner never reads or issues outside its bound server

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod actor;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod policy;
pub mod storage;
pub mod store;
pub mod types;

// Re-exports
pub use config::{Config, ServiceConfig, StorageBackend, StorageConfig};
pub use error::{Error, ErrorKind, Result};
pub use ledger::Ledger;
pub use metrics::Metrics;
pub use policy::authorize;
pub use storage::RocksStore;
pub use store::{open_store, AccountStore, LedgerStore, MemoryStore, StoreHandle};
pub use types::{
    Account, Action, LedgerEntry, PlayerId, Role, Scope, ServerId, SupplySnapshot,
};
