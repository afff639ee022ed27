//! Main ledger orchestration layer
//!
//! This module ties together the store, the access policy and the actor
//! into the high-level currency API used by the gateway.
//!
//! # Example
//!
//! ```no_run
//! use globalbank_ledger::{open_store, Config, Ledger, PlayerId, ServerId};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> globalbank_ledger::Result<()> {
//!     let config = Config::default();
//!     let store = open_store(&config)?;
//!     let ledger = Ledger::open(store.ledger_store(), &config).await?;
//!
//!     let server = ServerId::parse("survival-1")?;
//!     let player = PlayerId::parse("steve")?;
//!     ledger.sync_balance(&server, &player, Decimal::from(100)).await?;
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    metrics::Metrics,
    policy::authorize,
    store::LedgerStore,
    types::{Account, Action, LedgerEntry, PlayerId, Scope, ServerId, SupplySnapshot},
    Config, Error, Result,
};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;

/// Main ledger interface
#[derive(Clone)]
pub struct Ledger {
    /// Actor handle for every read and write
    handle: LedgerHandle,

    /// Counters and latency histogram
    metrics: Metrics,
}

impl Ledger {
    /// Start the ledger actor over `store`
    pub async fn open(store: Arc<dyn LedgerStore>, config: &Config) -> Result<Self> {
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to register metrics: {}", e)))?;
        Ok(Self::with_metrics(store, config, metrics))
    }

    /// Start the ledger actor with a caller-supplied metrics collector
    pub fn with_metrics(store: Arc<dyn LedgerStore>, config: &Config, metrics: Metrics) -> Self {
        let handle = spawn_ledger_actor(
            store,
            config.service.mailbox_capacity,
            Duration::from_millis(config.service.request_timeout_ms),
            metrics.clone(),
        );

        tracing::info!(
            mailbox_capacity = config.service.mailbox_capacity,
            request_timeout_ms = config.service.request_timeout_ms,
            "Ledger started"
        );

        Self { handle, metrics }
    }

    /// Apply a signed balance delta from a game server
    ///
    /// Creates the entry on first use, inheriting the server's current
    /// issuance. A delta that would leave the balance below zero is rejected
    /// with [`Error::InsufficientBalance`] and nothing is written; this
    /// includes a negative first transaction.
    pub async fn sync_balance(
        &self,
        server_id: &ServerId,
        player_id: &PlayerId,
        amount: Decimal,
    ) -> Result<LedgerEntry> {
        self.timed(self.handle.sync_balance(server_id.clone(), player_id.clone(), amount))
            .await
    }

    /// Current balance, or zero for a pair that never transacted
    pub async fn get_player_balance(
        &self,
        server_id: &ServerId,
        player_id: &PlayerId,
    ) -> Result<Decimal> {
        let entry = self
            .timed(self.handle.get_entry(server_id.clone(), player_id.clone()))
            .await?;
        Ok(entry.map(|e| e.balance).unwrap_or(Decimal::ZERO))
    }

    /// Entries visible to `account`, optionally narrowed to one server
    pub async fn query_balances(
        &self,
        requested_server: Option<&ServerId>,
        account: &Account,
    ) -> Result<Vec<LedgerEntry>> {
        let scope = authorize(account, requested_server, Action::Query)?;

        tracing::debug!(
            username = %account.username,
            role = %account.role,
            scope = ?scope,
            "Querying balances"
        );

        self.timed(self.handle.list_entries(scope)).await
    }

    /// Set a server's total issuance
    ///
    /// Fails with [`Error::Validation`] for a negative total,
    /// [`Error::Forbidden`] when the policy denies the account and
    /// [`Error::Conflict`] when the total is below the circulating supply.
    /// On success every entry of the server carries the new total.
    pub async fn issue_currency(
        &self,
        requested_server: Option<&ServerId>,
        new_total: Decimal,
        account: &Account,
    ) -> Result<SupplySnapshot> {
        if new_total < Decimal::ZERO {
            return Err(Error::Validation(
                "total issuance must not be negative".to_string(),
            ));
        }

        let server_id = issue_target(account, requested_server)?;

        tracing::info!(
            username = %account.username,
            server_id = %server_id,
            new_total = %new_total,
            "Issuance requested"
        );

        self.timed(self.handle.issue_currency(server_id, new_total)).await
    }

    /// Circulating supply versus issuance for one server
    ///
    /// Restricted to the accounts that may issue on that server.
    pub async fn supply_snapshot(
        &self,
        requested_server: Option<&ServerId>,
        account: &Account,
    ) -> Result<SupplySnapshot> {
        let server_id = issue_target(account, requested_server)?;
        self.timed(self.handle.supply_snapshot(server_id)).await
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }

    /// Record the latency of a ledger call
    ///
    /// The request timeout is enforced by the actor handle, which only
    /// reports a transient error for a request it never applied.
    async fn timed<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let started = Instant::now();
        let result = call.await;
        self.metrics.record_duration(started.elapsed().as_secs_f64());
        result
    }
}

/// Resolve the single server an issuance-level call targets
fn issue_target(account: &Account, requested_server: Option<&ServerId>) -> Result<ServerId> {
    match authorize(account, requested_server, Action::Issue)? {
        Scope::Server(server_id) => Ok(server_id),
        Scope::AllServers | Scope::Player(_) => Err(Error::Forbidden(
            "issuance requires a single server scope".to_string(),
        )),
    }
}
