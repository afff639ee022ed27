//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One task owns every read-modify-write against the store
//! - Async message passing with a bounded mailbox for backpressure
//!
//! Because the actor drains its mailbox one message at a time, a balance
//! sync is serialized per (server, player) key and an issuance's
//! sum-compare-update is serialized per server against every sync. Readers
//! routed through the actor only ever observe committed states.
//!
//! Every request carries a deadline. The deadline bounds the wait for a
//! mailbox slot and is checked again when the actor dequeues the request:
//! an expired request, or one whose caller has gone away, is dropped
//! before it touches the store. Once the actor starts a request the caller
//! receives its real outcome, so a transient error always means the store
//! was left unchanged.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │          Gateway (plugin + web handlers)              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox               │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │   sync: get → candidate → reject | upsert             │
//! │   issue: list_by_server → sum → reject | update all   │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//!              LedgerStore (RocksDB / memory)
//! ```

use crate::metrics::Metrics;
use crate::store::LedgerStore;
use crate::types::{LedgerEntry, PlayerId, Scope, ServerId, SupplySnapshot};
use crate::{Error, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Apply a signed balance delta
    SyncBalance {
        server_id: ServerId,
        player_id: PlayerId,
        amount: Decimal,
        deadline: Instant,
        response: oneshot::Sender<Result<LedgerEntry>>,
    },

    /// Read one entry
    GetEntry {
        server_id: ServerId,
        player_id: PlayerId,
        deadline: Instant,
        response: oneshot::Sender<Result<Option<LedgerEntry>>>,
    },

    /// List entries within an authorized scope
    ListEntries {
        scope: Scope,
        deadline: Instant,
        response: oneshot::Sender<Result<Vec<LedgerEntry>>>,
    },

    /// Set a server's total issuance
    IssueCurrency {
        server_id: ServerId,
        new_total: Decimal,
        deadline: Instant,
        response: oneshot::Sender<Result<SupplySnapshot>>,
    },

    /// Circulating supply versus issuance
    SupplySnapshot {
        server_id: ServerId,
        deadline: Instant,
        response: oneshot::Sender<Result<SupplySnapshot>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger messages
pub struct LedgerActor {
    /// Storage backend
    store: Arc<dyn LedgerStore>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Counters
    metrics: Metrics,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        store: Arc<dyn LedgerStore>,
        mailbox: mpsc::Receiver<LedgerMessage>,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            mailbox,
            metrics,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if let LedgerMessage::Shutdown = msg {
                tracing::info!("Ledger actor shutting down");
                break;
            }
            self.handle_message(msg);
        }
    }

    /// Handle a single message
    fn handle_message(&self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::SyncBalance {
                server_id,
                player_id,
                amount,
                deadline,
                response,
            } => {
                if let Some(response) = admit(deadline, response) {
                    let _ = response.send(self.apply_sync(server_id, player_id, amount));
                }
            }

            LedgerMessage::GetEntry {
                server_id,
                player_id,
                deadline,
                response,
            } => {
                if let Some(response) = admit(deadline, response) {
                    let _ = response.send(self.store.get(&server_id, &player_id));
                }
            }

            LedgerMessage::ListEntries {
                scope,
                deadline,
                response,
            } => {
                if let Some(response) = admit(deadline, response) {
                    let result = match scope {
                        Scope::AllServers => self.store.list_all(),
                        Scope::Server(server_id) => self.store.list_by_server(&server_id),
                        Scope::Player(player_id) => self.store.list_by_player(&player_id),
                    };
                    let _ = response.send(result);
                }
            }

            LedgerMessage::IssueCurrency {
                server_id,
                new_total,
                deadline,
                response,
            } => {
                if let Some(response) = admit(deadline, response) {
                    let _ = response.send(self.apply_issue(server_id, new_total));
                }
            }

            LedgerMessage::SupplySnapshot {
                server_id,
                deadline,
                response,
            } => {
                if let Some(response) = admit(deadline, response) {
                    let _ = response.send(self.snapshot(server_id));
                }
            }

            LedgerMessage::Shutdown => {
                // Handled in run loop
            }
        }
    }

    /// Read-modify-write of one balance
    fn apply_sync(
        &self,
        server_id: ServerId,
        player_id: PlayerId,
        amount: Decimal,
    ) -> Result<LedgerEntry> {
        let entry = match self.store.get(&server_id, &player_id)? {
            Some(mut entry) => {
                let candidate = entry.balance.checked_add(amount).ok_or_else(|| {
                    Error::Validation("balance change out of range".to_string())
                })?;
                if candidate < Decimal::ZERO {
                    return Err(self.reject_sync(&server_id, &player_id, entry.balance, amount));
                }
                entry.balance = candidate;
                entry.updated_at = Utc::now();
                entry
            }
            None => {
                // A first transaction may not open a negative balance
                if amount < Decimal::ZERO {
                    return Err(self.reject_sync(&server_id, &player_id, Decimal::ZERO, amount));
                }
                let total_issued = self.store.server_total_issued(&server_id)?;
                tracing::info!(
                    server_id = %server_id,
                    player_id = %player_id,
                    total_issued = %total_issued,
                    "Creating ledger entry"
                );
                LedgerEntry::new(server_id, player_id, amount, total_issued)
            }
        };

        self.store.upsert(&entry)?;
        self.metrics.record_sync();

        tracing::debug!(
            server_id = %entry.server_id,
            player_id = %entry.player_id,
            amount = %amount,
            balance = %entry.balance,
            "Balance synced"
        );

        Ok(entry)
    }

    fn reject_sync(
        &self,
        server_id: &ServerId,
        player_id: &PlayerId,
        balance: Decimal,
        amount: Decimal,
    ) -> Error {
        self.metrics.record_sync_rejected();
        tracing::info!(
            server_id = %server_id,
            player_id = %player_id,
            balance = %balance,
            amount = %amount,
            "Sync rejected: insufficient balance"
        );
        Error::InsufficientBalance {
            balance,
            requested: amount,
        }
    }

    /// Sum, compare, then update every row of the server
    fn apply_issue(&self, server_id: ServerId, new_total: Decimal) -> Result<SupplySnapshot> {
        let entries = self.store.list_by_server(&server_id)?;
        let circulating = circulating_supply(&entries)?;

        if new_total < circulating {
            self.metrics.record_issuance_rejected();
            tracing::info!(
                server_id = %server_id,
                new_total = %new_total,
                circulating = %circulating,
                "Issuance rejected: below circulating supply"
            );
            return Err(Error::Conflict(format!(
                "issuance below circulating supply: new total {} < circulating {}",
                new_total, circulating
            )));
        }

        self.store.update_total_issued_for_server(&server_id, new_total)?;
        self.metrics.record_issuance();

        tracing::info!(
            server_id = %server_id,
            new_total = %new_total,
            circulating = %circulating,
            "Currency issued"
        );

        Ok(SupplySnapshot {
            server_id,
            circulating,
            total_issued: new_total,
            entry_count: entries.len(),
        })
    }

    fn snapshot(&self, server_id: ServerId) -> Result<SupplySnapshot> {
        let entries = self.store.list_by_server(&server_id)?;
        let circulating = circulating_supply(&entries)?;
        let total_issued = self.store.server_total_issued(&server_id)?;

        let snapshot = SupplySnapshot {
            server_id,
            circulating,
            total_issued,
            entry_count: entries.len(),
        };

        if !snapshot.is_consistent() {
            tracing::warn!(
                server_id = %snapshot.server_id,
                circulating = %snapshot.circulating,
                total_issued = %snapshot.total_issued,
                "Circulating supply exceeds issuance"
            );
        }

        Ok(snapshot)
    }
}

/// Pass the responder through only if the request may still run
fn admit<T>(
    deadline: Instant,
    response: oneshot::Sender<Result<T>>,
) -> Option<oneshot::Sender<Result<T>>> {
    if response.is_closed() {
        tracing::debug!("Dropping ledger request: caller went away");
        return None;
    }
    if Instant::now() >= deadline {
        tracing::warn!("Dropping ledger request: deadline passed while queued");
        let _ = response.send(Err(Error::Transient(
            "ledger request expired before it was applied".to_string(),
        )));
        return None;
    }
    Some(response)
}

/// Sum of balances
fn circulating_supply(entries: &[LedgerEntry]) -> Result<Decimal> {
    entries.iter().try_fold(Decimal::ZERO, |acc, e| {
        acc.checked_add(e.balance)
            .ok_or_else(|| Error::Validation("circulating supply overflow".to_string()))
    })
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
    request_timeout: Duration,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>, request_timeout: Duration) -> Self {
        Self {
            sender,
            request_timeout,
        }
    }

    /// Send a request and wait for the actor's reply
    ///
    /// The timeout only covers getting a mailbox slot. A request that is
    /// still queued at its deadline is answered with a transient error by
    /// the actor without being applied.
    async fn request<T>(
        &self,
        build: impl FnOnce(Instant, oneshot::Sender<Result<T>>) -> LedgerMessage,
    ) -> Result<T> {
        let deadline = Instant::now() + self.request_timeout;
        let (tx, rx) = oneshot::channel();
        self.sender
            .send_timeout(build(deadline, tx), self.request_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => {
                    tracing::warn!(
                        timeout_ms = self.request_timeout.as_millis() as u64,
                        "Ledger mailbox full"
                    );
                    Error::Transient("ledger busy, request not queued".to_string())
                }
                SendTimeoutError::Closed(_) => {
                    Error::Concurrency("Actor mailbox closed".to_string())
                }
            })?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Apply a signed balance delta
    pub async fn sync_balance(
        &self,
        server_id: ServerId,
        player_id: PlayerId,
        amount: Decimal,
    ) -> Result<LedgerEntry> {
        self.request(|deadline, response| LedgerMessage::SyncBalance {
            server_id,
            player_id,
            amount,
            deadline,
            response,
        })
        .await
    }

    /// Read one entry
    pub async fn get_entry(
        &self,
        server_id: ServerId,
        player_id: PlayerId,
    ) -> Result<Option<LedgerEntry>> {
        self.request(|deadline, response| LedgerMessage::GetEntry {
            server_id,
            player_id,
            deadline,
            response,
        })
        .await
    }

    /// List entries within a scope
    pub async fn list_entries(&self, scope: Scope) -> Result<Vec<LedgerEntry>> {
        self.request(|deadline, response| LedgerMessage::ListEntries {
            scope,
            deadline,
            response,
        })
        .await
    }

    /// Set a server's total issuance
    pub async fn issue_currency(
        &self,
        server_id: ServerId,
        new_total: Decimal,
    ) -> Result<SupplySnapshot> {
        self.request(|deadline, response| LedgerMessage::IssueCurrency {
            server_id,
            new_total,
            deadline,
            response,
        })
        .await
    }

    /// Circulating supply versus issuance
    pub async fn supply_snapshot(&self, server_id: ServerId) -> Result<SupplySnapshot> {
        self.request(|deadline, response| LedgerMessage::SupplySnapshot {
            server_id,
            deadline,
            response,
        })
        .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    store: Arc<dyn LedgerStore>,
    mailbox_capacity: usize,
    request_timeout: Duration,
    metrics: Metrics,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1)); // Bounded channel for backpressure
    let actor = LedgerActor::new(store, rx, metrics);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx, request_timeout)
}
