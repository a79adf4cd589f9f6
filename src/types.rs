// Core data structures shared by the resolvers and the decision engine

use alloy::primitives::Address;
use anyhow::Context;
use std::collections::BTreeSet;
use std::fmt;

/// Lowercase 0x-prefixed hex form of an address.
/// All cache keys and log lines use this form.
pub fn to_lower_hex(address: &Address) -> String {
    format!("{:?}", address).to_lowercase()
}

/// Operators checked together in one call.
///
/// Order does not affect the decision, but it is preserved so the
/// custom-logic cache key reflects the exact request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperatorSet {
    operators: Vec<Address>,
}

impl OperatorSet {
    pub fn new(operators: Vec<Address>) -> Self {
        Self { operators }
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.operators
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.operators.iter()
    }

    /// JSON array of lowercase addresses in request order, e.g.
    /// `["0xabc...","0xdef..."]`. Used as the custom-logic cache key suffix.
    pub fn serialize_key(&self) -> String {
        let lowered: Vec<String> = self.operators.iter().map(to_lower_hex).collect();
        // Vec<String> serialization cannot fail
        serde_json::to_string(&lowered).unwrap_or_default()
    }
}

impl From<Vec<Address>> for OperatorSet {
    fn from(operators: Vec<Address>) -> Self {
        Self::new(operators)
    }
}

impl From<&[Address]> for OperatorSet {
    fn from(operators: &[Address]) -> Self {
        Self::new(operators.to_vec())
    }
}

/// Deduplicated set of operators a collection filters via the registries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blacklist {
    operators: BTreeSet<Address>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend<I: IntoIterator<Item = Address>>(&mut self, operators: I) {
        self.operators.extend(operators);
    }

    pub fn contains(&self, operator: &Address) -> bool {
        self.operators.contains(operator)
    }

    /// True if any operator of the set is blacklisted.
    pub fn contains_any(&self, operators: &OperatorSet) -> bool {
        operators.iter().any(|op| self.operators.contains(op))
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Address> {
        self.operators.iter().copied().collect()
    }

    /// JSON array of lowercase addresses, the form kept in the cache and the store.
    pub fn to_json(&self) -> String {
        let lowered: Vec<String> = self.operators.iter().map(to_lower_hex).collect();
        serde_json::to_string(&lowered).unwrap_or_else(|_| "[]".to_string())
    }

    /// Parse the JSON array written by [`Blacklist::to_json`]. Any address casing is accepted.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let entries: Vec<String> =
            serde_json::from_str(raw).context("Blacklist is not a JSON string array")?;
        entries
            .iter()
            .map(|s| {
                s.trim()
                    .parse::<Address>()
                    .with_context(|| format!("Invalid operator address in blacklist: {}", s))
            })
            .collect()
    }
}

impl FromIterator<Address> for Blacklist {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Self {
            operators: iter.into_iter().collect(),
        }
    }
}

/// Why a protocol step produced no evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoEvidence {
    /// The collection does not implement the protocol (revert, missing function, bad data)
    Unsupported,
    /// The chain endpoint could not be reached
    Transient,
}

/// Outcome of probing a collection with one custom-logic protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evidence {
    Blocked,
    NotBlocked,
    Inconclusive(NoEvidence),
}

impl Evidence {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Evidence::Blocked)
    }
}

/// On-chain mechanisms a collection may use instead of the standard registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomProtocol {
    /// `getWhitelistedOperators()` on the collection itself
    WhitelistFunction,
    /// `registry()` on the collection, then `isAllowedOperator(op)` on that registry
    RegistryIndirection,
}

impl CustomProtocol {
    /// Probe order: first positive wins.
    pub const FALLBACK_CHAIN: [CustomProtocol; 2] = [
        CustomProtocol::WhitelistFunction,
        CustomProtocol::RegistryIndirection,
    ];
}

impl fmt::Display for CustomProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CustomProtocol::WhitelistFunction => write!(f, "whitelist-function"),
            CustomProtocol::RegistryIndirection => write!(f, "registry-indirection"),
        }
    }
}
