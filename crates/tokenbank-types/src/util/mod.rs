//! Helper types used across the token bank crates.

pub mod money_amount;

pub use money_amount::*;
