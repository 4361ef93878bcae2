//! EIP-712 payloads for the two gasless deposit standards.
//!
//! - [`eip2612`] - token-native `Permit`, domain of the token itself
//! - [`permit2`] - Uniswap Permit2 `PermitTransferFrom`, domain of the Permit2 contract
//!
//! The builders only assemble the typed data. Signing happens through a
//! [`TypedDataSigner`](crate::capability::TypedDataSigner); nothing here holds keys.

pub mod eip2612;
pub use eip2612::*;

pub mod permit2;
pub use permit2::*;

/// Failure to assemble a typed-data payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("No account connected")]
    NoAccount,
}
