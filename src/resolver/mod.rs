//! Operator blacklist and custom-logic resolution
//!
//! - `registry`: union of the operator-filter registries' lists
//! - `blacklist`: cache → store → registry read-through over that union
//! - `custom_logic`: whitelist-function / registry-indirection probes
//!
//! Created: 2026-10-18

pub mod blacklist;
pub mod custom_logic;
pub mod registry;

pub use blacklist::CachedBlacklist;
pub use custom_logic::CustomLogicProber;
pub use registry::{RegistryBlacklistResolver, Resolution};
