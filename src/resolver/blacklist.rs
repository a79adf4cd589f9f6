//! Layered blacklist lookup: fast cache → durable store → registries.
//!
//! A miss at one layer falls through to the next and back-fills the layers
//! above it. A forced refresh skips straight to the registries and
//! overwrites both layers with the fresh union.
//!
//! Cache and store failures are logged and treated as a miss so a decision
//! can still be made from chain data.
//!
//! A union missing an unreachable registry is used for the current decision
//! only. Writing it to either layer would hide that registry's operators
//! until the next explicit refresh.
//!
//! Created: 2026-10-18

use super::registry::RegistryBlacklistResolver;
use crate::cache::{blacklist_key, FastCache};
use crate::store::BlacklistStore;
use crate::types::{to_lower_hex, Blacklist};
use alloy::primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct CachedBlacklist {
    resolver: RegistryBlacklistResolver,
    store: Arc<dyn BlacklistStore>,
    cache: Arc<dyn FastCache>,
    ttl: Duration,
}

impl CachedBlacklist {
    pub fn new(
        resolver: RegistryBlacklistResolver,
        store: Arc<dyn BlacklistStore>,
        cache: Arc<dyn FastCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            resolver,
            store,
            cache,
            ttl,
        }
    }

    /// Blacklist for the contract, recomputed from the registries when `refresh` is set.
    pub async fn get(&self, contract: &Address, refresh: bool) -> Blacklist {
        if refresh {
            info!("Refreshing operator blacklist for {}", to_lower_hex(contract));
            return self.recompute(contract).await;
        }

        if let Some(blacklist) = self.from_cache(contract).await {
            return blacklist;
        }

        if let Some(blacklist) = self.from_store(contract).await {
            self.write_cache(contract, &blacklist).await;
            return blacklist;
        }

        self.recompute(contract).await
    }

    async fn from_cache(&self, contract: &Address) -> Option<Blacklist> {
        let key = blacklist_key(contract);
        match self.cache.get(&key).await {
            Ok(Some(raw)) => match Blacklist::from_json(&raw) {
                Ok(blacklist) => {
                    debug!("Blacklist cache hit: {}", key);
                    Some(blacklist)
                }
                Err(e) => {
                    warn!("Discarding unreadable cache entry {}: {:#}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Blacklist cache read failed for {}, treating as miss: {:#}", key, e);
                None
            }
        }
    }

    async fn from_store(&self, contract: &Address) -> Option<Blacklist> {
        match self.store.get(contract).await {
            Ok(found) => {
                if found.is_some() {
                    debug!("Blacklist store hit: {}", to_lower_hex(contract));
                }
                found
            }
            Err(e) => {
                warn!(
                    "Blacklist store read failed for {}, treating as absent: {:#}",
                    to_lower_hex(contract),
                    e
                );
                None
            }
        }
    }

    /// Resolve from the registries and overwrite both layers.
    async fn recompute(&self, contract: &Address) -> Blacklist {
        let resolution = self.resolver.resolve(contract).await;

        if !resolution.is_authoritative() {
            // Nothing answered; don't pin an empty list for a day.
            warn!(
                "No registry answered for {}, using empty blacklist without persisting",
                to_lower_hex(contract)
            );
            return resolution.blacklist;
        }

        if !resolution.is_persistable() {
            warn!(
                "{} of {} registries unreachable for {}, using partial blacklist ({} operators) without persisting",
                resolution.transient,
                self.resolver.registries().len(),
                to_lower_hex(contract),
                resolution.blacklist.len()
            );
            return resolution.blacklist;
        }

        if let Err(e) = self.store.put(contract, &resolution.blacklist).await {
            warn!("Failed to persist blacklist for {}: {:#}", to_lower_hex(contract), e);
        }
        self.write_cache(contract, &resolution.blacklist).await;

        info!(
            "Resolved blacklist for {}: {} operators ({} registries answered, {} failed)",
            to_lower_hex(contract),
            resolution.blacklist.len(),
            resolution.succeeded,
            resolution.failed
        );
        resolution.blacklist
    }

    async fn write_cache(&self, contract: &Address, blacklist: &Blacklist) {
        let key = blacklist_key(contract);
        if let Err(e) = self.cache.set_ex(&key, &blacklist.to_json(), self.ttl).await {
            warn!("Failed to cache blacklist {}: {:#}", key, e);
        }
    }
}
