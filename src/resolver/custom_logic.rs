//! Custom Logic Prober
//!
//! Some collections skip the standard registries and enforce their own
//! operator allowlist. Two on-chain shapes are supported, probed in order:
//!
//! 1. whitelist-function: `getWhitelistedOperators()` on the collection.
//!    Blocked iff a requested operator is missing from the returned list.
//! 2. registry-indirection: `registry()` on the collection, then
//!    `isAllowedOperator(op)` on that registry for every requested operator
//!    (issued concurrently). Blocked iff any answer is false. Any failed
//!    call means no evidence from this protocol.
//!
//! The first protocol that reports blocked wins and is cached immediately.
//! Otherwise the negative verdict is cached once both were tried, unless a
//! transport failure left the answer open; then nothing is cached so the
//! next request probes again.
//!
//! Verdicts are cached per (contract, exact operator set). Concurrent probes
//! of the same key are coalesced.
//!
//! Created: 2026-10-18

use crate::cache::{custom_logic_key, decode_flag, encode_flag, FastCache};
use crate::chain::ChainReader;
use crate::types::{to_lower_hex, CustomProtocol, Evidence, NoEvidence, OperatorSet};
use alloy::primitives::Address;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct CustomLogicProber {
    chain: Arc<dyn ChainReader>,
    cache: Arc<dyn FastCache>,
    ttl: Duration,
    /// Per-key locks for probes currently in flight
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

/// Releases a key's in-flight lock when its holder finishes or is cancelled.
/// Only the map entry this caller joined is removed, never a newer one.
struct InFlightSlot<'a> {
    in_flight: &'a DashMap<String, Arc<Mutex<()>>>,
    key: &'a str,
    lock: &'a Arc<Mutex<()>>,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.in_flight
            .remove_if(self.key, |_, current| Arc::ptr_eq(current, self.lock));
    }
}

impl CustomLogicProber {
    pub fn new(chain: Arc<dyn ChainReader>, cache: Arc<dyn FastCache>, ttl: Duration) -> Self {
        Self {
            chain,
            cache,
            ttl,
            in_flight: DashMap::new(),
        }
    }

    /// True if the collection's own logic disallows any of the operators.
    pub async fn is_blocked(&self, contract: &Address, operators: &OperatorSet) -> bool {
        let key = custom_logic_key(contract, operators);

        if let Some(blocked) = self.cached(&key).await {
            return blocked;
        }

        let lock = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _slot = InFlightSlot {
            in_flight: &self.in_flight,
            key: &key,
            lock: &lock,
        };
        let _guard = lock.lock().await;

        // Another task may have finished the same probe while we waited
        match self.cached(&key).await {
            Some(blocked) => blocked,
            None => self.probe_and_cache(&key, contract, operators).await,
        }
    }

    async fn cached(&self, key: &str) -> Option<bool> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => {
                debug!("Custom-logic cache hit: {}", key);
                Some(decode_flag(&raw))
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Custom-logic cache read failed for {}, treating as miss: {:#}", key, e);
                None
            }
        }
    }

    async fn probe_and_cache(&self, key: &str, contract: &Address, operators: &OperatorSet) -> bool {
        let mut transient = false;

        for protocol in CustomProtocol::FALLBACK_CHAIN {
            let evidence = self.probe(protocol, contract, operators).await;
            debug!(
                "Custom-logic {} on {}: {:?}",
                protocol,
                to_lower_hex(contract),
                evidence
            );

            match evidence {
                Evidence::Blocked => {
                    info!(
                        "Operators blocked by custom logic ({}) on {}",
                        protocol,
                        to_lower_hex(contract)
                    );
                    self.store(key, true).await;
                    return true;
                }
                Evidence::Inconclusive(NoEvidence::Transient) => transient = true,
                Evidence::NotBlocked | Evidence::Inconclusive(NoEvidence::Unsupported) => {}
            }
        }

        if transient {
            warn!(
                "Custom-logic probe of {} inconclusive (transport failure), not caching",
                to_lower_hex(contract)
            );
        } else {
            self.store(key, false).await;
        }
        false
    }

    async fn store(&self, key: &str, blocked: bool) {
        if let Err(e) = self.cache.set_ex(key, encode_flag(blocked), self.ttl).await {
            warn!("Failed to cache custom-logic verdict {}: {:#}", key, e);
        }
    }

    /// Run one protocol against the collection.
    pub async fn probe(
        &self,
        protocol: CustomProtocol,
        contract: &Address,
        operators: &OperatorSet,
    ) -> Evidence {
        match protocol {
            CustomProtocol::WhitelistFunction => self.probe_whitelist(contract, operators).await,
            CustomProtocol::RegistryIndirection => {
                self.probe_registry_indirection(contract, operators).await
            }
        }
    }

    async fn probe_whitelist(&self, contract: &Address, operators: &OperatorSet) -> Evidence {
        match self.chain.whitelisted_operators(*contract).await {
            Ok(whitelist) => {
                if operators.iter().any(|op| !whitelist.contains(op)) {
                    Evidence::Blocked
                } else {
                    Evidence::NotBlocked
                }
            }
            Err(e) => {
                debug!("getWhitelistedOperators() unavailable on {}: {}", to_lower_hex(contract), e);
                Evidence::Inconclusive(e.as_no_evidence())
            }
        }
    }

    async fn probe_registry_indirection(
        &self,
        contract: &Address,
        operators: &OperatorSet,
    ) -> Evidence {
        let registry = match self.chain.allowlist_registry(*contract).await {
            Ok(registry) => registry,
            Err(e) => {
                debug!("registry() unavailable on {}: {}", to_lower_hex(contract), e);
                return Evidence::Inconclusive(e.as_no_evidence());
            }
        };

        let futs = operators.iter().map(|op| {
            let chain = Arc::clone(&self.chain);
            let op = *op;
            async move { chain.is_allowed_operator(registry, op).await }
        });

        let mut any_disallowed = false;
        for result in join_all(futs).await {
            match result {
                Ok(allowed) => any_disallowed |= !allowed,
                Err(e) => {
                    debug!(
                        "isAllowedOperator() failed on registry {}: {}",
                        to_lower_hex(&registry),
                        e
                    );
                    return Evidence::Inconclusive(e.as_no_evidence());
                }
            }
        }

        if any_disallowed {
            Evidence::Blocked
        } else {
            Evidence::NotBlocked
        }
    }
}
