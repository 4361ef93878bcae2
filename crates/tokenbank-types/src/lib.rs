//! Core types shared by the token bank crates.
//!
//! Nothing in here knows about a particular chain. The EVM-specific pieces live in
//! `tokenbank-chain-eip155`, which builds on these primitives.
//!
//! # Modules
//!
//! - [`config`] - RPC endpoint configuration and `$ENV` resolution for config values
//! - [`timestamp`] - Unix timestamps used for signature deadlines
//! - [`util`] - Decimal amount parsing for user-entered quantities

pub mod config;
pub mod timestamp;
pub mod util;
