//! Operator Filter CLI
//!
//! Checks whether a collection filters any of the given marketplace operators.
//!
//! Usage:
//!   operator-filter --network mainnet \
//!       --contract 0xbc4c...f13d \
//!       --operators 0x1e00...3c71,0x0000...14dc [--refresh]
//!
//! Prints `filtered` or `not filtered`.
//!
//! Created: 2026-10-18

use alloy::primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;
use operator_filter::{FilterConfig, FilterEngine};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Marketplace operator-filter check
#[derive(Parser)]
#[command(name = "operator-filter")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, env = "OPERATOR_FILTER_CONFIG", default_value = "config/operator_filter.toml")]
    config: String,

    /// Network name from the config file (mainnet, polygon, ...)
    #[arg(short, long, env = "NETWORK", default_value = "mainnet")]
    network: String,

    /// Collection address
    #[arg(short, long)]
    contract: String,

    /// Comma-separated operator addresses
    #[arg(short, long, value_delimiter = ',', required = true)]
    operators: Vec<String>,

    /// Recompute the registry blacklist instead of using cached data
    #[arg(long)]
    refresh: bool,
}

fn parse_address(raw: &str) -> Result<Address> {
    raw.trim()
        .parse::<Address>()
        .with_context(|| format!("Invalid address: {}", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = FilterConfig::load(&args.config)?;

    // RUST_LOG wins over the config file
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .with_target(false)
        .init();

    let contract = parse_address(&args.contract)?;
    let operators = args
        .operators
        .iter()
        .map(|op| parse_address(op))
        .collect::<Result<Vec<_>>>()?;

    let engine = FilterEngine::connect(&config, &args.network).await?;
    info!(
        "Checking {:?} against {} operators on chain {}",
        contract,
        operators.len(),
        engine.chain_id()
    );

    let filtered = engine
        .check_marketplace_is_filtered(contract, &operators, args.refresh)
        .await;

    println!("{}", if filtered { "filtered" } else { "not filtered" });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "operator-filter",
            "--contract",
            "0xbc4ca0eda7647a8ab7c2061c2e118a18a936f13d",
            "--operators",
            "0x1e0049783f008a0085193e00003d00cd54003c71,0x00000000000000adc04c56bf30ac9d3c0aaf14dc",
            "--refresh",
        ])
        .unwrap();
        assert_eq!(args.operators.len(), 2);
        assert!(args.refresh);
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address(" 0xbc4ca0eda7647a8ab7c2061c2e118a18a936f13d ").is_ok());
    }
}
