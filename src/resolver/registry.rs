//! Registry Blacklist Resolver
//!
//! Computes the full blacklist of a collection by asking every configured
//! operator-filter registry for its `filteredOperators(collection)` list and
//! taking the union.
//!
//! Registry calls run concurrently and fail independently: one unreachable
//! registry does not blank out what the others returned. A registry that
//! reverts (e.g. not deployed on this chain) is a settled answer; one that
//! could not be reached leaves the union incomplete.
//!
//! Created: 2026-10-18

use crate::chain::ChainReader;
use crate::types::{to_lower_hex, Blacklist, NoEvidence};
use alloy::primitives::Address;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of one resolution round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub blacklist: Blacklist,
    /// Registries that answered
    pub succeeded: usize,
    /// Registries whose call failed
    pub failed: usize,
    /// Subset of `failed` that hit a transport error and may answer next time
    pub transient: usize,
}

impl Resolution {
    /// True when at least one registry answered.
    pub fn is_authoritative(&self) -> bool {
        self.succeeded > 0
    }

    /// True when the union is complete enough to persist: something answered
    /// and no registry was merely unreachable.
    pub fn is_persistable(&self) -> bool {
        self.is_authoritative() && self.transient == 0
    }
}

pub struct RegistryBlacklistResolver {
    chain: Arc<dyn ChainReader>,
    registries: Vec<Address>,
}

impl RegistryBlacklistResolver {
    pub fn new(chain: Arc<dyn ChainReader>, registries: Vec<Address>) -> Self {
        Self { chain, registries }
    }

    pub fn registries(&self) -> &[Address] {
        &self.registries
    }

    /// Query all registries and union their filtered operators.
    pub async fn resolve(&self, contract: &Address) -> Resolution {
        let futs = self.registries.iter().map(|registry| {
            let chain = Arc::clone(&self.chain);
            let registry = *registry;
            let contract = *contract;
            async move { (registry, chain.filtered_operators(registry, contract).await) }
        });

        let mut blacklist = Blacklist::new();
        let mut succeeded = 0;
        let mut failed = 0;
        let mut transient = 0;

        for (registry, result) in join_all(futs).await {
            match result {
                Ok(operators) => {
                    debug!(
                        "Registry {} lists {} filtered operators for {}",
                        to_lower_hex(&registry),
                        operators.len(),
                        to_lower_hex(contract)
                    );
                    blacklist.extend(operators);
                    succeeded += 1;
                }
                Err(e) => {
                    warn!(
                        "Registry {} lookup failed for {}: {}",
                        to_lower_hex(&registry),
                        to_lower_hex(contract),
                        e
                    );
                    failed += 1;
                    if e.as_no_evidence() == NoEvidence::Transient {
                        transient += 1;
                    }
                }
            }
        }

        Resolution {
            blacklist,
            succeeded,
            failed,
            transient,
        }
    }
}
