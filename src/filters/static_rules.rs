//! Static Override Rules
//!
//! Hardcoded (chain, collection, operator) rules that mark an operator set as
//! filtered without touching the cache or the chain. Built once at startup
//! from the config file and never mutated afterwards.
//!
//! A rule with an empty `operators` list matches every operator set for its
//! collection; otherwise it matches when any requested operator is listed.
//!
//! Created: 2026-10-18

use crate::types::{to_lower_hex, OperatorSet};
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct StaticRule {
    pub chain_id: u64,
    pub contract: Address,
    #[serde(default)]
    pub operators: Vec<Address>,
    #[serde(default)]
    pub reason: String,
}

/// Precomputed lookup over the configured rules.
#[derive(Debug, Default)]
pub struct StaticRules {
    /// (chain_id, contract) → operators; `None` means any operator
    rules: HashMap<(u64, Address), Option<HashSet<Address>>>,
}

impl StaticRules {
    pub fn new(raw: &[StaticRule]) -> Self {
        let mut rules: HashMap<(u64, Address), Option<HashSet<Address>>> = HashMap::new();

        for rule in raw {
            let key = (rule.chain_id, rule.contract);
            if rule.operators.is_empty() {
                rules.insert(key, None);
                continue;
            }
            // A catch-all rule for this collection (None) already covers everything
            if let Some(ops) = rules.entry(key).or_insert_with(|| Some(HashSet::new())) {
                ops.extend(rule.operators.iter().copied());
            }
        }

        if !rules.is_empty() {
            info!("Static override rules loaded: {} collections", rules.len());
        }
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Does a rule force this request to "filtered"?
    pub fn matches(&self, chain_id: u64, contract: &Address, operators: &OperatorSet) -> bool {
        let hit = match self.rules.get(&(chain_id, *contract)) {
            Some(None) => true,
            Some(Some(listed)) => operators.iter().any(|op| listed.contains(op)),
            None => false,
        };
        if hit {
            debug!(
                "Static override: {} on chain {} is filtered",
                to_lower_hex(contract),
                chain_id
            );
        }
        hit
    }
}
