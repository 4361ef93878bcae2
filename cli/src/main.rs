//! Token bank command line client.
//!
//! Deposits tokens into the bank contract with one of three authorization
//! strategies (classic approve, EIP-2612 permit, Permit2), withdraws them
//! again and shows balances.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG` selects the configuration file (default `config.json`)
//! - `RUST_LOG` controls log verbosity

mod config;
mod run;
mod sig_down;

use std::process;

use crate::run::run;

#[tokio::main]
async fn main() {
    let result = run().await;
    if let Err(e) = result {
        eprintln!("{e}");
        process::exit(1)
    }
}
