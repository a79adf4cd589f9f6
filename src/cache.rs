//! Fast Cache
//!
//! Ephemeral key/value layer with per-entry expiry. Sits in front of the
//! durable blacklist store and is the only home of custom-logic verdicts.
//!
//! Two backends:
//! - `MemoryCache`: in-process moka cache (single instance deployments, tests)
//! - `RedisCache`: shared Redis instance (multiple workers)
//!
//! Key families:
//! - `blacklist:{contract}`                 → JSON operator list
//! - `custom-logic:{contract}:{operators}`  → "1" (blocked) / "0" (allowed)
//!
//! Created: 2026-10-18

use crate::types::{to_lower_hex, OperatorSet};
use alloy::primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::{Duration, Instant};
use tracing::debug;

/// Both key families expire after 24 hours unless configured otherwise.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on entries held by the in-process backend.
const MEMORY_CACHE_CAPACITY: u64 = 100_000;

pub fn blacklist_key(contract: &Address) -> String {
    format!("blacklist:{}", to_lower_hex(contract))
}

pub fn custom_logic_key(contract: &Address, operators: &OperatorSet) -> String {
    format!(
        "custom-logic:{}:{}",
        to_lower_hex(contract),
        operators.serialize_key()
    )
}

pub fn encode_flag(blocked: bool) -> &'static str {
    if blocked {
        "1"
    } else {
        "0"
    }
}

/// Anything other than "1" reads as not blocked.
pub fn decode_flag(raw: &str) -> bool {
    raw.trim() == "1"
}

/// Key/value cache with expiry.
///
/// Errors are returned to the caller, which treats them as a miss.
#[async_trait]
pub trait FastCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-process backend
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with. Overwrites restart
/// the clock; reads don't extend it.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// moka-backed cache with a TTL chosen per write.
#[derive(Clone)]
pub struct MemoryCache {
    cache: Cache<String, Entry>,
}

impl MemoryCache {
    pub fn new(capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    /// Number of live entries (approximate, moka counts lazily).
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Apply pending evictions and expirations now.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(MEMORY_CACHE_CAPACITY)
    }
}

#[async_trait]
impl FastCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self.cache.get(key).await.map(|entry| entry.value);
        if value.is_none() {
            debug!("Cache miss: {}", key);
        }
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let entry = Entry {
            value: value.to_string(),
            ttl,
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Redis backend
// ---------------------------------------------------------------------------

/// Redis-backed cache over a single multiplexed connection.
#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .with_context(|| format!("Invalid Redis URL: {}", redis_url))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl FastCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .with_context(|| format!("Redis GET {} failed", key))?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, secs)
            .await
            .with_context(|| format!("Redis SETEX {} failed", key))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .with_context(|| format!("Redis DEL {} failed", key))?;
        Ok(())
    }
}
