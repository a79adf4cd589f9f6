//! Centralized Contract Definitions
//!
//! Solidity interfaces consulted by the operator-filter checks,
//! defined using alloy's `sol!` macro.
//!
//! Each interface is annotated with `#[sol(rpc)]` to generate
//! contract instance types that can make RPC calls via any alloy Provider.
//!
//! Created: 2026-10-18

use alloy::sol;

// ── Operator filter registries ───────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IOperatorFilterRegistry {
        function filteredOperators(address registrant) external view returns (address[] memory);
    }
}

// ── Custom logic: explicit whitelist accessor ────────────────────────

sol! {
    #[sol(rpc)]
    interface IWhitelistedOperators {
        function getWhitelistedOperators() external view returns (address[] memory);
    }
}

// ── Custom logic: delegated allowlist registry ───────────────────────

sol! {
    #[sol(rpc)]
    interface IRegistryHolder {
        function registry() external view returns (address);
    }
}

sol! {
    #[sol(rpc)]
    interface IOperatorAllowlist {
        function isAllowedOperator(address operator) external view returns (bool);
    }
}
