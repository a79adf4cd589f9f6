//! Blacklist Store
//!
//! Durable per-contract copy of the registry-derived operator blacklist.
//! One row per collection, keyed by the raw 20-byte address. Rows are only
//! ever replaced wholesale by a fresh resolution, never merged.
//!
//! Created: 2026-10-18

use crate::types::{to_lower_hex, Blacklist};
use alloy::primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Durable blacklist persistence.
#[async_trait]
pub trait BlacklistStore: Send + Sync {
    /// Latest stored blacklist for the contract, if one was ever written.
    async fn get(&self, contract: &Address) -> Result<Option<Blacklist>>;

    /// Replace the stored blacklist for the contract.
    async fn put(&self, contract: &Address, blacklist: &Blacklist) -> Result<()>;
}

/// SQLite-backed store.
pub struct SqliteBlacklistStore {
    pool: Pool<Sqlite>,
}

impl SqliteBlacklistStore {
    /// Open (creating if needed) the database at `database_url` and ensure the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let mut opts = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        if !database_url.contains(":memory:") {
            opts = opts.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .context("Failed to open blacklist database")?;

        let store = Self { pool };
        store.migrate().await?;
        info!("Blacklist store ready at {}", database_url);
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS operator_blacklists (
                address BLOB PRIMARY KEY NOT NULL,
                operators TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create operator_blacklists table")?;
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl BlacklistStore for SqliteBlacklistStore {
    async fn get(&self, contract: &Address) -> Result<Option<Blacklist>> {
        let row = sqlx::query("SELECT operators FROM operator_blacklists WHERE address = ?")
            .bind(contract.to_vec())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read blacklist for {}", to_lower_hex(contract)))?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("operators")?;
                Ok(Some(Blacklist::from_json(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, contract: &Address, blacklist: &Blacklist) -> Result<()> {
        sqlx::query(
            "INSERT INTO operator_blacklists (address, operators, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(address) DO UPDATE SET
                operators = excluded.operators,
                updated_at = excluded.updated_at",
        )
        .bind(contract.to_vec())
        .bind(blacklist.to_json())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write blacklist for {}", to_lower_hex(contract)))?;

        debug!(
            "Stored blacklist for {}: {} operators",
            to_lower_hex(contract),
            blacklist.len()
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Store wrapper that counts operations and can simulate an outage.

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryStore {
        pub rows: Mutex<HashMap<Address, Blacklist>>,
        pub reads: AtomicUsize,
        pub writes: AtomicUsize,
        pub down: AtomicBool,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn ops(&self) -> usize {
            self.reads.load(Ordering::SeqCst) + self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BlacklistStore for MemoryStore {
        async fn get(&self, contract: &Address) -> Result<Option<Blacklist>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                anyhow::bail!("store unavailable");
            }
            Ok(self.rows.lock().unwrap().get(contract).cloned())
        }

        async fn put(&self, contract: &Address, blacklist: &Blacklist) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                anyhow::bail!("store unavailable");
            }
            self.rows
                .lock()
                .unwrap()
                .insert(*contract, blacklist.clone());
            Ok(())
        }
    }
}
