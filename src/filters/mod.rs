//! Operator filtering decisions
//!
//! Static override rules plus the decision engine that combines them with
//! the registry blacklist and custom-logic probes.
//!
//! Created: 2026-10-18

pub mod engine;
pub mod static_rules;

pub use engine::FilterEngine;
pub use static_rules::{StaticRule, StaticRules};
