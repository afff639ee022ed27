//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `entries` - Ledger entries (key: server_id || 0x00 || player_id)
//! - `indices` - Player lookup index (key: player_id || 0x00 || server_id)
//! - `issuance` - Per-server total issuance scalar (key: server_id)
//! - `accounts` - Web accounts (key: username)
//!
//! Identifiers never contain control characters, so the NUL separator keeps
//! prefixes unambiguous.

use crate::{
    error::{Error, Result},
    store::{AccountStore, LedgerStore},
    types::{Account, LedgerEntry, PlayerId, ServerId},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Column family names
const CF_ENTRIES: &str = "entries";
const CF_INDICES: &str = "indices";
const CF_ISSUANCE: &str = "issuance";
const CF_ACCOUNTS: &str = "accounts";

const KEY_SEPARATOR: u8 = 0x00;

/// RocksDB-backed ledger and account store
pub struct RocksStore {
    db: Arc<DB>,
}

impl RocksStore {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.storage.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.storage.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.storage.max_background_jobs);

        if config.storage.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ENTRIES, Self::cf_options_entries()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_ISSUANCE, Options::default()),
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB ledger store");

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_entries() -> Options {
        let mut opts = Options::default();
        // Entries are read on every sync, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Key helpers

    fn composite_key(first: &str, second: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(first.len() + second.len() + 1);
        key.extend_from_slice(first.as_bytes());
        key.push(KEY_SEPARATOR);
        key.extend_from_slice(second.as_bytes());
        key
    }

    fn prefix(first: &str) -> Vec<u8> {
        let mut key = first.as_bytes().to_vec();
        key.push(KEY_SEPARATOR);
        key
    }

    fn entry_key(server_id: &ServerId, player_id: &PlayerId) -> Vec<u8> {
        Self::composite_key(server_id.as_str(), player_id.as_str())
    }

    fn index_key(player_id: &PlayerId, server_id: &ServerId) -> Vec<u8> {
        Self::composite_key(player_id.as_str(), server_id.as_str())
    }

    /// Scan every (key, value) pair starting with `prefix`
    fn scan_prefix(&self, cf: &ColumnFamily, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut items = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            items.push((key, value));
        }
        Ok(items)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

impl LedgerStore for RocksStore {
    fn get(&self, server_id: &ServerId, player_id: &PlayerId) -> Result<Option<LedgerEntry>> {
        let cf = self.cf_handle(CF_ENTRIES)?;
        match self.db.get_cf(cf, Self::entry_key(server_id, player_id))? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn upsert(&self, entry: &LedgerEntry) -> Result<()> {
        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        // Entry and index commit together
        let mut batch = WriteBatch::default();
        batch.put_cf(
            cf_entries,
            Self::entry_key(&entry.server_id, &entry.player_id),
            bincode::serialize(entry)?,
        );
        batch.put_cf(
            cf_indices,
            Self::index_key(&entry.player_id, &entry.server_id),
            b"",
        );
        self.db.write(batch)?;

        tracing::debug!(
            server_id = %entry.server_id,
            player_id = %entry.player_id,
            balance = %entry.balance,
            "Entry written"
        );

        Ok(())
    }

    fn list_by_server(&self, server_id: &ServerId) -> Result<Vec<LedgerEntry>> {
        let cf = self.cf_handle(CF_ENTRIES)?;
        self.scan_prefix(cf, &Self::prefix(server_id.as_str()))?
            .into_iter()
            .map(|(_, value)| bincode::deserialize(&value).map_err(Error::from))
            .collect()
    }

    fn list_by_player(&self, player_id: &PlayerId) -> Result<Vec<LedgerEntry>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let prefix = Self::prefix(player_id.as_str());

        let mut entries = Vec::new();
        for (key, _) in self.scan_prefix(cf_indices, &prefix)? {
            let server_raw = std::str::from_utf8(&key[prefix.len()..])
                .map_err(|e| Error::Storage(format!("Corrupt index key: {}", e)))?;
            let server_id = ServerId::parse(server_raw)?;

            match self.get(&server_id, player_id)? {
                Some(entry) => entries.push(entry),
                None => {
                    tracing::warn!(
                        server_id = %server_id,
                        player_id = %player_id,
                        "Index points at missing entry"
                    );
                }
            }
        }
        Ok(entries)
    }

    fn list_all(&self) -> Result<Vec<LedgerEntry>> {
        let cf = self.cf_handle(CF_ENTRIES)?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            entries.push(bincode::deserialize(&value)?);
        }
        Ok(entries)
    }

    fn server_total_issued(&self, server_id: &ServerId) -> Result<Decimal> {
        let cf = self.cf_handle(CF_ISSUANCE)?;
        match self.db.get_cf(cf, server_id.as_str().as_bytes())? {
            Some(value) => Ok(bincode::deserialize(&value)?),
            None => Ok(Decimal::ZERO),
        }
    }

    fn update_total_issued_for_server(
        &self,
        server_id: &ServerId,
        new_total: Decimal,
    ) -> Result<()> {
        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        let cf_issuance = self.cf_handle(CF_ISSUANCE)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            cf_issuance,
            server_id.as_str().as_bytes(),
            bincode::serialize(&new_total)?,
        );

        let mut touched = 0usize;
        for mut entry in self.list_by_server(server_id)? {
            entry.total_issued = new_total;
            batch.put_cf(
                cf_entries,
                Self::entry_key(&entry.server_id, &entry.player_id),
                bincode::serialize(&entry)?,
            );
            touched += 1;
        }

        // All rows and the scalar, or nothing
        self.db.write(batch)?;

        tracing::info!(
            server_id = %server_id,
            total_issued = %new_total,
            entries = touched,
            "Total issuance updated"
        );

        Ok(())
    }
}

impl AccountStore for RocksStore {
    fn get_account(&self, username: &str) -> Result<Option<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        match self.db.get_cf(cf, username.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        self.db
            .put_cf(cf, account.username.as_bytes(), bincode::serialize(account)?)?;
        Ok(())
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            accounts.push(bincode::deserialize(&value)?);
        }
        Ok(accounts)
    }
}
