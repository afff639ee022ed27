//! Store contracts and the in-memory backend
//!
//! The ledger service only talks to the [`LedgerStore`] and [`AccountStore`]
//! traits, so the durable RocksDB backend and the in-memory one are
//! interchangeable.

use crate::{
    config::StorageBackend,
    error::Result,
    storage::RocksStore,
    types::{Account, LedgerEntry, PlayerId, ServerId},
    Config,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Durable (server, player) → entry mapping
pub trait LedgerStore: Send + Sync {
    /// Get an entry, `None` if the pair never transacted
    fn get(&self, server_id: &ServerId, player_id: &PlayerId) -> Result<Option<LedgerEntry>>;

    /// Create or replace by (server, player)
    fn upsert(&self, entry: &LedgerEntry) -> Result<()>;

    /// All entries of one server
    fn list_by_server(&self, server_id: &ServerId) -> Result<Vec<LedgerEntry>>;

    /// All entries of one player, across servers
    fn list_by_player(&self, player_id: &PlayerId) -> Result<Vec<LedgerEntry>>;

    /// Every entry
    fn list_all(&self) -> Result<Vec<LedgerEntry>>;

    /// Current issuance of a server, zero if unseen
    fn server_total_issued(&self, server_id: &ServerId) -> Result<Decimal>;

    /// Set the issuance of a server on every entry of that server as one
    /// atomic unit. With no entries the value is kept for the first entry
    /// created later.
    fn update_total_issued_for_server(&self, server_id: &ServerId, new_total: Decimal)
        -> Result<()>;
}

/// Web account persistence
pub trait AccountStore: Send + Sync {
    /// Look up by username
    fn get_account(&self, username: &str) -> Result<Option<Account>>;

    /// Create or replace by username
    fn put_account(&self, account: &Account) -> Result<()>;

    /// Every account
    fn list_accounts(&self) -> Result<Vec<Account>>;
}

#[derive(Default)]
struct MemoryState {
    entries: BTreeMap<ServerId, BTreeMap<PlayerId, LedgerEntry>>,
    issuance: HashMap<ServerId, Decimal>,
    accounts: BTreeMap<String, Account>,
}

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn get(&self, server_id: &ServerId, player_id: &PlayerId) -> Result<Option<LedgerEntry>> {
        let state = self.state.read();
        Ok(state
            .entries
            .get(server_id)
            .and_then(|players| players.get(player_id))
            .cloned())
    }

    fn upsert(&self, entry: &LedgerEntry) -> Result<()> {
        let mut state = self.state.write();
        state
            .entries
            .entry(entry.server_id.clone())
            .or_default()
            .insert(entry.player_id.clone(), entry.clone());
        Ok(())
    }

    fn list_by_server(&self, server_id: &ServerId) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read();
        Ok(state
            .entries
            .get(server_id)
            .map(|players| players.values().cloned().collect())
            .unwrap_or_default())
    }

    fn list_by_player(&self, player_id: &PlayerId) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read();
        Ok(state
            .entries
            .values()
            .filter_map(|players| players.get(player_id))
            .cloned()
            .collect())
    }

    fn list_all(&self) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read();
        Ok(state
            .entries
            .values()
            .flat_map(|players| players.values())
            .cloned()
            .collect())
    }

    fn server_total_issued(&self, server_id: &ServerId) -> Result<Decimal> {
        Ok(self
            .state
            .read()
            .issuance
            .get(server_id)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    fn update_total_issued_for_server(
        &self,
        server_id: &ServerId,
        new_total: Decimal,
    ) -> Result<()> {
        // One write guard covers the scalar and every row
        let mut state = self.state.write();
        state.issuance.insert(server_id.clone(), new_total);
        if let Some(players) = state.entries.get_mut(server_id) {
            for entry in players.values_mut() {
                entry.total_issued = new_total;
            }
        }
        Ok(())
    }
}

impl AccountStore for MemoryStore {
    fn get_account(&self, username: &str) -> Result<Option<Account>> {
        Ok(self.state.read().accounts.get(username).cloned())
    }

    fn put_account(&self, account: &Account) -> Result<()> {
        self.state
            .write()
            .accounts
            .insert(account.username.clone(), account.clone());
        Ok(())
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.state.read().accounts.values().cloned().collect())
    }
}

/// An opened backend, shared by the ledger and the authenticator
#[derive(Clone)]
pub enum StoreHandle {
    /// In-memory backend
    Memory(Arc<MemoryStore>),
    /// RocksDB backend
    RocksDb(Arc<RocksStore>),
}

impl StoreHandle {
    /// Ledger view of the backend
    pub fn ledger_store(&self) -> Arc<dyn LedgerStore> {
        match self {
            StoreHandle::Memory(store) => store.clone(),
            StoreHandle::RocksDb(store) => store.clone(),
        }
    }

    /// Account view of the backend
    pub fn account_store(&self) -> Arc<dyn AccountStore> {
        match self {
            StoreHandle::Memory(store) => store.clone(),
            StoreHandle::RocksDb(store) => store.clone(),
        }
    }
}

/// Open the backend selected in config
pub fn open_store(config: &Config) -> Result<StoreHandle> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; balances will not survive a restart");
            Ok(StoreHandle::Memory(Arc::new(MemoryStore::new())))
        }
        StorageBackend::RocksDb => Ok(StoreHandle::RocksDb(Arc::new(RocksStore::open(config)?))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn server(id: &str) -> ServerId {
        ServerId::parse(id).unwrap()
    }

    fn player(id: &str) -> PlayerId {
        PlayerId::parse(id).unwrap()
    }

    #[test]
    fn test_get_missing_is_none() {
        let store = MemoryStore::new();
        assert!(store.get(&server("S1"), &player("steve")).unwrap().is_none());
        assert_eq!(store.server_total_issued(&server("S1")).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_upsert_replaces_by_key() {
        let store = MemoryStore::new();
        let mut entry = LedgerEntry::new(
            server("S1"),
            player("steve"),
            Decimal::from(10),
            Decimal::ZERO,
        );
        store.upsert(&entry).unwrap();

        entry.balance = Decimal::from(25);
        store.upsert(&entry).unwrap();

        assert_eq!(store.list_all().unwrap().len(), 1);
        let stored = store.get(&server("S1"), &player("steve")).unwrap().unwrap();
        assert_eq!(stored.balance, Decimal::from(25));
    }

    #[test]
    fn test_secondary_lookups() {
        let store = MemoryStore::new();
        for (s, p) in [("S1", "steve"), ("S1", "alex"), ("S2", "steve")] {
            store
                .upsert(&LedgerEntry::new(server(s), player(p), Decimal::ONE, Decimal::ZERO))
                .unwrap();
        }

        assert_eq!(store.list_by_server(&server("S1")).unwrap().len(), 2);
        assert_eq!(store.list_by_server(&server("S3")).unwrap().len(), 0);
        let steve = store.list_by_player(&player("steve")).unwrap();
        assert_eq!(steve.len(), 2);
        assert!(steve.iter().all(|e| e.player_id.as_str() == "steve"));
    }

    #[test]
    fn test_list_by_server_is_exact_and_ordered() {
        let store = MemoryStore::new();
        for (s, p) in [("S10", "zed"), ("S1", "steve"), ("S1", "alex"), ("S", "steve")] {
            store
                .upsert(&LedgerEntry::new(server(s), player(p), Decimal::ONE, Decimal::ZERO))
                .unwrap();
        }

        let s1: Vec<_> = store
            .list_by_server(&server("S1"))
            .unwrap()
            .into_iter()
            .map(|e| e.player_id.as_str().to_string())
            .collect();
        assert_eq!(s1, vec!["alex", "steve"]);
        assert_eq!(store.list_all().unwrap().len(), 4);
    }

    #[test]
    fn test_update_total_issued_touches_only_that_server() {
        let store = MemoryStore::new();
        for (s, p) in [("S1", "steve"), ("S1", "alex"), ("S2", "steve")] {
            store
                .upsert(&LedgerEntry::new(server(s), player(p), Decimal::ONE, Decimal::ZERO))
                .unwrap();
        }

        store
            .update_total_issued_for_server(&server("S1"), Decimal::from(500))
            .unwrap();

        assert!(store
            .list_by_server(&server("S1"))
            .unwrap()
            .iter()
            .all(|e| e.total_issued == Decimal::from(500)));
        assert_eq!(
            store.get(&server("S2"), &player("steve")).unwrap().unwrap().total_issued,
            Decimal::ZERO
        );
        assert_eq!(store.server_total_issued(&server("S1")).unwrap(), Decimal::from(500));
    }

    #[test]
    fn test_issuance_before_first_entry_is_remembered() {
        let store = MemoryStore::new();
        store
            .update_total_issued_for_server(&server("S9"), Decimal::from(42))
            .unwrap();
        assert!(store.list_by_server(&server("S9")).unwrap().is_empty());
        assert_eq!(store.server_total_issued(&server("S9")).unwrap(), Decimal::from(42));
    }

    #[test]
    fn test_accounts() {
        let store = MemoryStore::new();
        let account = Account::new("admin", "hash", Role::Admin, None, None).unwrap();
        store.put_account(&account).unwrap();

        assert_eq!(store.get_account("admin").unwrap(), Some(account));
        assert!(store.get_account("nobody").unwrap().is_none());
        assert_eq!(store.list_accounts().unwrap().len(), 1);
    }
}
