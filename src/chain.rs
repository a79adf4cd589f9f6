//! Chain Query Adapter
//!
//! Thin read-only wrapper around the contract calls the filter checks need.
//! Every call returns `Result<_, ChainCallError>` so the resolvers can tell a
//! collection that simply does not implement a function (revert, empty return
//! data) apart from an unreachable RPC endpoint, and apply their fail-open
//! policy uniformly.
//!
//! Created: 2026-10-18

use crate::contracts::{
    IOperatorAllowlist, IOperatorFilterRegistry, IRegistryHolder, IWhitelistedOperators,
};
use crate::types::NoEvidence;
use alloy::primitives::Address;
use alloy::providers::Provider;
use alloy::rpc::json_rpc::ErrorPayload;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Distinguishable failure of a single contract read.
#[derive(Debug, Error)]
pub enum ChainCallError {
    /// Call reverted, the function does not exist, or returned no data
    #[error("call reverted: {0}")]
    Reverted(String),
    /// Return data could not be decoded into the expected type
    #[error("failed to decode return data: {0}")]
    Decode(String),
    /// RPC endpoint unreachable, rate limited, or failed the call for non-revert reasons
    #[error("transport error: {0}")]
    Transport(String),
}

impl ChainCallError {
    /// Map the failure to the kind of missing evidence it represents.
    pub fn as_no_evidence(&self) -> NoEvidence {
        match self {
            ChainCallError::Reverted(_) | ChainCallError::Decode(_) => NoEvidence::Unsupported,
            ChainCallError::Transport(_) => NoEvidence::Transient,
        }
    }
}

impl From<alloy::contract::Error> for ChainCallError {
    fn from(err: alloy::contract::Error) -> Self {
        match &err {
            alloy::contract::Error::TransportError(rpc) => match rpc.as_error_resp() {
                Some(payload) if is_revert(payload) => ChainCallError::Reverted(err.to_string()),
                // Rate limits, missing state, internal node errors, dropped connections
                _ => ChainCallError::Transport(err.to_string()),
            },
            alloy::contract::Error::AbiError(_) => ChainCallError::Decode(err.to_string()),
            // Zero-length return data, unknown selectors and similar
            _ => ChainCallError::Reverted(err.to_string()),
        }
    }
}

/// An error response only means "reverted" when the node says so: code 3,
/// revert data attached, or an "execution reverted" style message.
fn is_revert(payload: &ErrorPayload) -> bool {
    if payload.is_retry_err() {
        return false;
    }
    payload.code == 3
        || payload.as_revert_data().is_some()
        || payload.message.to_ascii_lowercase().contains("revert")
}

/// Read-only contract calls used by the registry resolver and the custom-logic prober.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `filteredOperators(collection)` on an operator-filter registry
    async fn filtered_operators(
        &self,
        registry: Address,
        collection: Address,
    ) -> Result<Vec<Address>, ChainCallError>;

    /// `getWhitelistedOperators()` on the collection
    async fn whitelisted_operators(&self, collection: Address)
        -> Result<Vec<Address>, ChainCallError>;

    /// `registry()` on the collection
    async fn allowlist_registry(&self, collection: Address) -> Result<Address, ChainCallError>;

    /// `isAllowedOperator(operator)` on a delegated allowlist registry
    async fn is_allowed_operator(
        &self,
        registry: Address,
        operator: Address,
    ) -> Result<bool, ChainCallError>;
}

/// [`ChainReader`] backed by any alloy provider.
pub struct AlloyChainReader<P> {
    provider: Arc<P>,
}

impl<P: Provider + 'static> AlloyChainReader<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: Provider + 'static> ChainReader for AlloyChainReader<P> {
    async fn filtered_operators(
        &self,
        registry: Address,
        collection: Address,
    ) -> Result<Vec<Address>, ChainCallError> {
        let contract = IOperatorFilterRegistry::new(registry, self.provider.clone());
        let operators = contract.filteredOperators(collection).call().await?;
        Ok(operators)
    }

    async fn whitelisted_operators(
        &self,
        collection: Address,
    ) -> Result<Vec<Address>, ChainCallError> {
        let contract = IWhitelistedOperators::new(collection, self.provider.clone());
        let operators = contract.getWhitelistedOperators().call().await?;
        Ok(operators)
    }

    async fn allowlist_registry(&self, collection: Address) -> Result<Address, ChainCallError> {
        let contract = IRegistryHolder::new(collection, self.provider.clone());
        let registry = contract.registry().call().await?;
        Ok(registry)
    }

    async fn is_allowed_operator(
        &self,
        registry: Address,
        operator: Address,
    ) -> Result<bool, ChainCallError> {
        let contract = IOperatorAllowlist::new(registry, self.provider.clone());
        let allowed = contract.isAllowedOperator(operator).call().await?;
        Ok(allowed)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory chain used by the resolver and engine tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct CallCounts {
        pub filtered_operators: AtomicUsize,
        pub whitelisted_operators: AtomicUsize,
        pub allowlist_registry: AtomicUsize,
        pub is_allowed_operator: AtomicUsize,
    }

    impl CallCounts {
        pub fn total(&self) -> usize {
            self.filtered_operators.load(Ordering::SeqCst)
                + self.whitelisted_operators.load(Ordering::SeqCst)
                + self.allowlist_registry.load(Ordering::SeqCst)
                + self.is_allowed_operator.load(Ordering::SeqCst)
        }
    }

    /// Canned answers keyed by contract address. Anything not configured reverts.
    #[derive(Default)]
    pub struct MockChain {
        pub registry_lists: Mutex<HashMap<(Address, Address), Vec<Address>>>,
        pub unreachable_registries: Mutex<Vec<Address>>,
        pub reverting_registries: Mutex<Vec<Address>>,
        pub whitelists: Mutex<HashMap<Address, Vec<Address>>>,
        pub allowlist_registries: Mutex<HashMap<Address, Address>>,
        pub allowed: Mutex<HashMap<(Address, Address), bool>>,
        pub offline: Mutex<bool>,
        pub calls: CallCounts,
    }

    impl MockChain {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_registry_list(&self, registry: Address, collection: Address, ops: Vec<Address>) {
            self.registry_lists
                .lock()
                .unwrap()
                .insert((registry, collection), ops);
        }

        pub fn set_registry_unreachable(&self, registry: Address) {
            self.unreachable_registries.lock().unwrap().push(registry);
        }

        pub fn set_registry_reachable(&self, registry: Address) {
            self.unreachable_registries
                .lock()
                .unwrap()
                .retain(|r| *r != registry);
        }

        /// Registry not deployed on this chain: every call reverts.
        pub fn set_registry_reverting(&self, registry: Address) {
            self.reverting_registries.lock().unwrap().push(registry);
        }

        pub fn set_whitelist(&self, collection: Address, ops: Vec<Address>) {
            self.whitelists.lock().unwrap().insert(collection, ops);
        }

        pub fn set_allowlist_registry(&self, collection: Address, registry: Address) {
            self.allowlist_registries
                .lock()
                .unwrap()
                .insert(collection, registry);
        }

        pub fn set_allowed(&self, registry: Address, operator: Address, allowed: bool) {
            self.allowed
                .lock()
                .unwrap()
                .insert((registry, operator), allowed);
        }

        /// Every subsequent call fails with a transport error.
        pub fn set_offline(&self, offline: bool) {
            *self.offline.lock().unwrap() = offline;
        }

        fn check_online(&self) -> Result<(), ChainCallError> {
            if *self.offline.lock().unwrap() {
                return Err(ChainCallError::Transport("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ChainReader for MockChain {
        async fn filtered_operators(
            &self,
            registry: Address,
            collection: Address,
        ) -> Result<Vec<Address>, ChainCallError> {
            self.calls.filtered_operators.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;
            if self.unreachable_registries.lock().unwrap().contains(&registry) {
                return Err(ChainCallError::Transport("registry timed out".to_string()));
            }
            if self.reverting_registries.lock().unwrap().contains(&registry) {
                return Err(ChainCallError::Reverted("execution reverted".to_string()));
            }
            Ok(self
                .registry_lists
                .lock()
                .unwrap()
                .get(&(registry, collection))
                .cloned()
                .unwrap_or_default())
        }

        async fn whitelisted_operators(
            &self,
            collection: Address,
        ) -> Result<Vec<Address>, ChainCallError> {
            self.calls.whitelisted_operators.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;
            self.whitelists
                .lock()
                .unwrap()
                .get(&collection)
                .cloned()
                .ok_or_else(|| ChainCallError::Reverted("execution reverted".to_string()))
        }

        async fn allowlist_registry(&self, collection: Address) -> Result<Address, ChainCallError> {
            self.calls.allowlist_registry.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;
            self.allowlist_registries
                .lock()
                .unwrap()
                .get(&collection)
                .copied()
                .ok_or_else(|| ChainCallError::Reverted("execution reverted".to_string()))
        }

        async fn is_allowed_operator(
            &self,
            registry: Address,
            operator: Address,
        ) -> Result<bool, ChainCallError> {
            self.calls.is_allowed_operator.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;
            self.allowed
                .lock()
                .unwrap()
                .get(&(registry, operator))
                .copied()
                .ok_or_else(|| ChainCallError::Reverted("execution reverted".to_string()))
        }
    }
}
