//! Marketplace Operator Filter Library
//!
//! Decides whether an NFT collection filters a set of marketplace operators,
//! combining static overrides, operator-filter registry blacklists (cached in
//! a fast cache and a durable store) and collection-specific allowlist logic.
//!
//! Created: 2026-10-18

pub mod cache;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod filters;
pub mod resolver;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::FilterConfig;
pub use filters::FilterEngine;
pub use types::{Blacklist, OperatorSet};
