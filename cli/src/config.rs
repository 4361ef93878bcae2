//! Command line arguments and the JSON configuration file.

use alloy_primitives::Address;
use clap::{Parser, Subcommand};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokenbank_chain_eip155::chain::BankChainConfig;
use tokenbank_chain_eip155::orchestrator::DepositStrategy;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// CLI arguments of the token bank client.
#[derive(Parser, Debug)]
#[command(name = "tokenbank", version)]
#[command(about = "Deposit into and withdraw from the token bank")]
pub struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show wallet and bank balances of the configured account
    Balances,
    /// Deposit an amount of tokens into the bank
    Deposit {
        #[arg(allow_hyphen_values = true)]
        amount: String,
        /// approve, eip2612 or permit2
        #[arg(long, short, default_value = "approve")]
        strategy: DepositStrategy,
    },
    /// Withdraw an amount of tokens from the bank
    Withdraw {
        #[arg(allow_hyphen_values = true)]
        amount: String,
    },
    /// Print the unsigned EIP-712 payload of a permit deposit
    TypedData {
        #[arg(allow_hyphen_values = true)]
        amount: String,
        /// eip2612 or permit2
        #[arg(long, short)]
        strategy: DepositStrategy,
        /// Owner to build the payload for; defaults to the configured account
        #[arg(long)]
        owner: Option<Address>,
    },
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Loads the chain configuration from `path`.
///
/// A missing file at the default location is not an error: the built-in
/// Sepolia deployment is used instead. An explicitly given path must exist.
pub fn load(path: &Path) -> Result<BankChainConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == ErrorKind::NotFound && path == Path::new(DEFAULT_CONFIG_PATH) => {
            tracing::info!("No {DEFAULT_CONFIG_PATH} found, using the Sepolia defaults");
            Ok(BankChainConfig::default())
        }
        Err(e) => Err(ConfigError::FileRead(path.to_path_buf(), e)),
    }
}
