//! EVM plumbing for the token bank: deployment types, contract bindings,
//! configuration and the alloy-backed provider.
//!
//! # Key Types
//!
//! - [`BankDeployment`] - Chain id plus token, bank and Permit2 addresses
//! - [`TokenDeployment`] - Token address and decimals, with amount parsing
//! - [`BankChainConfig`] - JSON configuration, defaulting to Sepolia
//! - [`BankChainProvider`] - Reads and writes over a throttled fallback transport
//! - [`LocalTypedDataSigner`] - EIP-712 signing with a local private key

pub mod config;
pub use config::*;

pub mod contracts;

pub mod provider;
pub use provider::*;

pub mod types;
pub use types::*;
