//! Filter Decision Engine
//!
//! Public entry point answering "is collection C filtered against operators O?".
//!
//! Decision order:
//! 1. Static override rules: a match returns true with no I/O at all.
//! 2. Registry blacklist (cache → store → registries, or forced refresh).
//! 3. Custom-logic probe, always consulted alongside step 2.
//! 4. Filtered iff any operator is blacklisted OR custom logic blocks.
//!
//! Every infrastructure failure below this layer degrades to "no evidence",
//! so the answer is always a plain bool and biased towards not filtered.
//!
//! Created: 2026-10-18

use super::static_rules::{StaticRule, StaticRules};
use crate::cache::{FastCache, MemoryCache, RedisCache};
use crate::chain::{AlloyChainReader, ChainReader};
use crate::config::FilterConfig;
use crate::resolver::{CachedBlacklist, CustomLogicProber, RegistryBlacklistResolver};
use crate::store::{BlacklistStore, SqliteBlacklistStore};
use crate::types::{to_lower_hex, OperatorSet};
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct FilterEngine {
    chain_id: u64,
    static_rules: StaticRules,
    blacklists: CachedBlacklist,
    custom_logic: CustomLogicProber,
}

impl FilterEngine {
    /// Wire the engine from already-constructed collaborators.
    pub fn new(
        chain_id: u64,
        registries: Vec<Address>,
        static_rules: &[StaticRule],
        chain: Arc<dyn ChainReader>,
        store: Arc<dyn BlacklistStore>,
        cache: Arc<dyn FastCache>,
        ttl: Duration,
    ) -> Self {
        let resolver = RegistryBlacklistResolver::new(Arc::clone(&chain), registries);
        let blacklists = CachedBlacklist::new(resolver, store, Arc::clone(&cache), ttl);
        let custom_logic = CustomLogicProber::new(chain, cache, ttl);

        Self {
            chain_id,
            static_rules: StaticRules::new(static_rules),
            blacklists,
            custom_logic,
        }
    }

    /// Connect to the RPC endpoint, durable store and fast cache named in the
    /// config for `network`.
    pub async fn connect(config: &FilterConfig, network: &str) -> Result<Self> {
        let net = config.network(network)?;

        let provider = ProviderBuilder::new()
            .connect(&net.rpc_url)
            .await
            .with_context(|| format!("Failed to connect to RPC for network '{}'", network))?;
        let block = provider
            .get_block_number()
            .await
            .context("RPC endpoint did not answer eth_blockNumber")?;
        info!("Connected to {} (chain {}) at block {}", network, net.chain_id, block);
        let chain: Arc<dyn ChainReader> = Arc::new(AlloyChainReader::new(Arc::new(provider)));

        let store: Arc<dyn BlacklistStore> =
            Arc::new(SqliteBlacklistStore::connect(&config.storage.database_url).await?);

        let cache: Arc<dyn FastCache> = match &config.storage.redis_url {
            Some(url) => {
                info!("Using Redis fast cache");
                Arc::new(RedisCache::connect(url).await?)
            }
            None => {
                info!("No Redis configured, using in-process fast cache");
                Arc::new(MemoryCache::default())
            }
        };

        Ok(Self::new(
            net.chain_id,
            net.registries.clone(),
            &config.static_rules,
            chain,
            store,
            cache,
            config.cache_ttl(),
        ))
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Is `contract` filtered against any operator in `operators`?
    pub async fn is_filtered(
        &self,
        contract: &Address,
        operators: &OperatorSet,
        refresh: bool,
    ) -> bool {
        if operators.is_empty() {
            debug!("Empty operator set for {}, nothing to filter", to_lower_hex(contract));
            return false;
        }

        if self.static_rules.matches(self.chain_id, contract, operators) {
            return true;
        }

        let (blacklist, custom_blocked) = tokio::join!(
            self.blacklists.get(contract, refresh),
            self.custom_logic.is_blocked(contract, operators),
        );

        let blacklisted = blacklist.contains_any(operators);
        debug!(
            "Filter decision for {}: blacklisted={} custom_logic={}",
            to_lower_hex(contract),
            blacklisted,
            custom_blocked
        );
        blacklisted || custom_blocked
    }

    /// Entry point for marketplace order checks.
    pub async fn check_marketplace_is_filtered(
        &self,
        contract: Address,
        operators: &[Address],
        refresh: bool,
    ) -> bool {
        self.is_filtered(&contract, &OperatorSet::from(operators), refresh)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::mock::CountingCache;
    use crate::cache::DEFAULT_CACHE_TTL;
    use crate::chain::mock::MockChain;
    use crate::store::mock::MemoryStore;
    use crate::types::Blacklist;
    use alloy::primitives::address;
    use std::sync::atomic::Ordering;

    const REGISTRY_A: Address = address!("000000000000aaeb6d7670e522a718067333cd4e");
    const REGISTRY_B: Address = address!("9dc5ee2d52d014f8b81d662fa8f4ca525f27cd6b");
    const ALLOWLIST: Address = address!("4fee7b061c97c9c496b01dbce9cdb10c02f0a0be");
    const COLLECTION: Address = address!("bc4ca0eda7647a8ab7c2061c2e118a18a936f13d");
    const OVERRIDDEN: Address = address!("60e4d786628fea6478f785a6d7e704777c86a7c6");
    const X: Address = address!("00000000000000adc04c56bf30ac9d3c0aaf14dc");
    const Y: Address = address!("1e0049783f008a0085193e00003d00cd54003c71");
    const Z: Address = address!("f849de01b080adc3a814fabe1e2087475cf2e354");

    struct Fixture {
        chain: Arc<MockChain>,
        store: Arc<MemoryStore>,
        cache: Arc<CountingCache>,
        engine: FilterEngine,
    }

    fn fixture() -> Fixture {
        let chain = Arc::new(MockChain::new());
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(CountingCache::new());
        let rules = vec![StaticRule {
            chain_id: 1,
            contract: OVERRIDDEN,
            operators: vec![],
            reason: "refuses all marketplaces".to_string(),
        }];
        let engine = FilterEngine::new(
            1,
            vec![REGISTRY_A, REGISTRY_B],
            &rules,
            chain.clone(),
            store.clone(),
            cache.clone(),
            DEFAULT_CACHE_TTL,
        );
        Fixture {
            chain,
            store,
            cache,
            engine,
        }
    }

    #[tokio::test]
    async fn test_static_override_skips_all_io() {
        let f = fixture();
        assert!(f.engine.check_marketplace_is_filtered(OVERRIDDEN, &[Z], false).await);
        assert!(f.engine.check_marketplace_is_filtered(OVERRIDDEN, &[Z], true).await);
        assert_eq!(f.chain.calls.total(), 0);
        assert_eq!(f.cache.ops(), 0);
        assert_eq!(f.store.ops(), 0);
    }

    #[tokio::test]
    async fn test_union_across_registries() {
        let f = fixture();
        f.chain.set_registry_list(REGISTRY_A, COLLECTION, vec![X]);
        f.chain.set_registry_list(REGISTRY_B, COLLECTION, vec![Y, X]);

        assert!(f.engine.check_marketplace_is_filtered(COLLECTION, &[Y], false).await);
        assert_eq!(
            f.store.rows.lock().unwrap().get(&COLLECTION).cloned(),
            Some([X, Y].into_iter().collect::<Blacklist>())
        );
    }

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let f = fixture();
        f.chain.set_registry_list(REGISTRY_A, COLLECTION, vec![X]);

        let first = f.engine.check_marketplace_is_filtered(COLLECTION, &[Z], false).await;
        let second = f.engine.check_marketplace_is_filtered(COLLECTION, &[Z], false).await;

        assert_eq!(first, second);
        assert!(!first);
        assert_eq!(f.chain.calls.filtered_operators.load(Ordering::SeqCst), 2);
        assert_eq!(f.chain.calls.whitelisted_operators.load(Ordering::SeqCst), 1);
        assert_eq!(f.chain.calls.allowlist_registry.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_always_runs_one_registry_round() {
        let f = fixture();
        f.chain.set_registry_list(REGISTRY_A, COLLECTION, vec![X]);
        f.engine.check_marketplace_is_filtered(COLLECTION, &[Y], false).await;
        assert_eq!(f.chain.calls.filtered_operators.load(Ordering::SeqCst), 2);

        f.chain.set_registry_list(REGISTRY_B, COLLECTION, vec![Y]);
        assert!(f.engine.check_marketplace_is_filtered(COLLECTION, &[Y], true).await);
        assert_eq!(f.chain.calls.filtered_operators.load(Ordering::SeqCst), 4);
        assert_eq!(f.store.writes.load(Ordering::SeqCst), 2);
        assert_eq!(
            f.store.rows.lock().unwrap().get(&COLLECTION).cloned(),
            Some([X, Y].into_iter().collect::<Blacklist>())
        );

        // Cache now carries the refreshed list
        assert!(f.engine.check_marketplace_is_filtered(COLLECTION, &[Y], false).await);
        assert_eq!(f.chain.calls.filtered_operators.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_custom_logic_blocks_despite_empty_blacklist() {
        let f = fixture();
        f.chain.set_allowlist_registry(COLLECTION, ALLOWLIST);
        f.chain.set_allowed(ALLOWLIST, Z, false);

        assert!(f.engine.check_marketplace_is_filtered(COLLECTION, &[Z], false).await);
    }

    #[tokio::test]
    async fn test_nothing_configured_is_not_filtered() {
        let f = fixture();
        assert!(!f.engine.check_marketplace_is_filtered(COLLECTION, &[X, Y, Z], false).await);
        assert!(!f.engine.check_marketplace_is_filtered(COLLECTION, &[X], true).await);
    }

    #[tokio::test]
    async fn test_total_outage_fails_open() {
        let f = fixture();
        f.chain.set_registry_list(REGISTRY_A, COLLECTION, vec![X]);
        f.chain.set_offline(true);
        f.cache.down.store(true, Ordering::SeqCst);
        f.store.down.store(true, Ordering::SeqCst);

        assert!(!f.engine.check_marketplace_is_filtered(COLLECTION, &[X], false).await);
    }

    #[tokio::test]
    async fn test_empty_operator_set() {
        let f = fixture();
        assert!(!f.engine.check_marketplace_is_filtered(COLLECTION, &[], false).await);
        assert_eq!(f.chain.calls.total(), 0);
    }
}
