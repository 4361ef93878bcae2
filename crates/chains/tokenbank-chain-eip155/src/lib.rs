//! EVM deposit authorization for the token bank.
//!
//! A holder of an EIP-2612 capable ERC-20 token can move tokens into the bank
//! contract in three ways, all driven by [`orchestrator::DepositOrchestrator`]:
//!
//! - **approve then deposit**: an exact `approve(bank, amount)` when the current
//!   allowance is short, followed by `deposit(amount)`
//! - **EIP-2612 permit**: one off-chain `Permit` signature over the token's own
//!   domain, then `permitDeposit` with the decomposed `(v, r, s)`
//! - **Permit2**: a one-time unbounded approval of the canonical Permit2
//!   contract, then a `PermitTransferFrom` signature per deposit passed to
//!   `depositWithPermit2`
//!
//! Withdrawals and balance reads are available next to the deposit flows.
//!
//! # Architecture
//!
//! - [`capability`] - The reader, sender and signer traits the flows depend on
//! - [`chain`] - Deployment types, configuration, contract bindings and the alloy-backed provider
//! - [`permit`] - Builders for the EIP-712 payloads of both permit flavours
//! - [`signature`] - Hex signature validation and `(r, s, v)` decomposition
//! - [`allowance`] - Whether an approval is needed and for how much
//! - [`reader`] - Wallet and bank balances of an account
//! - [`orchestrator`] - The deposit and withdraw state machine
//! - [`error`] - Flow errors and their user-facing classification
//!
//! # Feature Flags
//!
//! - `telemetry` - Tracing spans and events for chain calls and flow transitions
//!
//! # Example
//!
//! ```ignore
//! use tokenbank_chain_eip155::chain::{BankChainConfig, BankChainProvider, LocalTypedDataSigner};
//! use tokenbank_chain_eip155::orchestrator::{DepositOrchestrator, DepositStrategy, FlowSettings};
//! use std::sync::Arc;
//!
//! let config = BankChainConfig::default();
//! let provider = Arc::new(BankChainProvider::from_config(&config)?);
//! let signer = LocalTypedDataSigner::from_config(&config)?;
//! let orchestrator = DepositOrchestrator::new(
//!     Arc::clone(&provider),
//!     provider,
//!     signer,
//!     config.deployment(),
//! )
//! .with_settings(FlowSettings::from(&config));
//!
//! let outcome = orchestrator
//!     .execute(DepositStrategy::Permit2PermitDeposit, "12.5")
//!     .await?;
//! ```

pub mod allowance;
pub mod capability;
pub mod chain;
pub mod error;
pub mod orchestrator;
pub mod permit;
pub mod reader;
pub mod signature;
