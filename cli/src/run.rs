use clap::Parser;
use dotenvy::dotenv;
use std::sync::Arc;
use tokenbank_chain_eip155::capability::TypedDataSigner;
use tokenbank_chain_eip155::chain::{BankChainProvider, LocalTypedDataSigner};
use tokenbank_chain_eip155::error::DepositError;
use tokenbank_chain_eip155::orchestrator::{
    DepositOrchestrator, DepositOutcome, FlowSettings, FlowState, WithdrawOutcome,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{self, CliArgs, Command};
use crate::sig_down::SigDown;

type Orchestrator =
    DepositOrchestrator<Arc<BankChainProvider>, Arc<BankChainProvider>, LocalTypedDataSigner>;

/// Runs one command of the token bank client.
///
/// - Loads `.env` variables.
/// - Installs a `fmt` subscriber on stderr, filtered by `RUST_LOG` (default `info`).
/// - Builds the provider and signer from the configuration file.
/// - Executes the requested command, printing progress to stderr and results to stdout.
///
/// A transaction that is still unconfirmed when the wait ends is not a failure.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();
    let config = config::load(&args.config)?;

    let provider = Arc::new(BankChainProvider::from_config(&config)?);
    let signer = LocalTypedDataSigner::from_config(&config)?;
    match signer.account() {
        Some(account) => tracing::info!(%account, "Using configured signer"),
        None => tracing::warn!("No signer key configured, only `typed-data --owner` is available"),
    }

    let sig_down = SigDown::try_new()?;
    let orchestrator: Orchestrator = DepositOrchestrator::new(
        Arc::clone(&provider),
        provider,
        signer,
        config.deployment(),
    )
    .with_settings(FlowSettings::from(&config))
    .with_cancellation(sig_down.cancellation_token());

    let decimals = config.token.decimals;
    let result = match args.command {
        Command::Balances => balances(&orchestrator, decimals).await,
        Command::Deposit { amount, strategy } => {
            let (tx, rx) = mpsc::unbounded_channel();
            let printer = tokio::spawn(print_progress(rx));
            let outcome = orchestrator
                .execute_with_progress(strategy, &amount, tx)
                .await;
            printer.await?;
            outcome.map(|outcome| print_deposit(outcome, decimals))
        }
        Command::Withdraw { amount } => {
            let (tx, rx) = mpsc::unbounded_channel();
            let printer = tokio::spawn(print_progress(rx));
            let outcome = orchestrator.withdraw_with_progress(&amount, tx).await;
            printer.await?;
            outcome.map(|outcome| print_withdraw(outcome, decimals))
        }
        Command::TypedData {
            amount,
            strategy,
            owner,
        } => match orchestrator
            .prepare_typed_data(strategy, &amount, owner)
            .await
        {
            Ok(typed_data) => {
                println!("{}", serde_json::to_string_pretty(&typed_data)?);
                Ok(())
            }
            Err(e) => Err(e),
        },
    };
    sig_down.shutdown().await;

    result.map_err(|e| {
        tracing::debug!(error = ?e, stage = ?e.stage(), "Command failed");
        e.notice().to_string().into()
    })
}

async fn balances(orchestrator: &Orchestrator, decimals: u8) -> Result<(), DepositError> {
    let sheet = orchestrator.balances().await?;
    println!("{}", sheet.display(decimals));
    Ok(())
}

async fn print_progress(mut rx: mpsc::UnboundedReceiver<FlowState>) {
    while let Some(state) = rx.recv().await {
        if !state.is_terminal() {
            eprintln!("... {state}");
        }
    }
}

fn print_deposit(outcome: DepositOutcome, decimals: u8) {
    match outcome {
        DepositOutcome::Confirmed {
            approval_tx,
            deposit_tx,
            balances,
        } => {
            if let Some(approval_tx) = approval_tx {
                println!("approval confirmed: {approval_tx}");
            }
            println!("deposit confirmed: {deposit_tx}");
            if let Some(balances) = balances {
                println!("{}", balances.display(decimals));
            }
        }
        DepositOutcome::StillPending { stage, tx_hash } => {
            println!("still pending while {stage}: {tx_hash}");
        }
    }
}

fn print_withdraw(outcome: WithdrawOutcome, decimals: u8) {
    match outcome {
        WithdrawOutcome::Confirmed {
            withdraw_tx,
            balances,
        } => {
            println!("withdrawal confirmed: {withdraw_tx}");
            if let Some(balances) = balances {
                println!("{}", balances.display(decimals));
            }
        }
        WithdrawOutcome::StillPending { stage, tx_hash } => {
            println!("still pending while {stage}: {tx_hash}");
        }
    }
}
