use alloy_primitives::TxHash;
use tokio::sync::mpsc;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::capability::{BankCall, ChainReader, TransactionSender, TypedDataSigner};
use crate::error::DepositError;
use crate::orchestrator::{
    Action, Confirmation, DepositOrchestrator, FlowState, InFlightGuard, Progress,
};
use crate::reader::BalanceSheet;

/// How a withdrawal ended, short of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawOutcome {
    Confirmed {
        withdraw_tx: TxHash,
        balances: Option<BalanceSheet>,
    },
    StillPending { stage: FlowState, tx_hash: TxHash },
}

impl<R, T, S> DepositOrchestrator<R, T, S>
where
    R: ChainReader,
    T: TransactionSender,
    S: TypedDataSigner,
{
    /// Withdraws the decimal `amount` from the bank. No authorization step is involved.
    pub async fn withdraw(&self, amount: &str) -> Result<WithdrawOutcome, DepositError> {
        self.run_withdraw(amount, Progress { observer: None }).await
    }

    pub async fn withdraw_with_progress(
        &self,
        amount: &str,
        progress: mpsc::UnboundedSender<FlowState>,
    ) -> Result<WithdrawOutcome, DepositError> {
        self.run_withdraw(
            amount,
            Progress {
                observer: Some(&progress),
            },
        )
        .await
    }

    #[cfg_attr(feature = "telemetry", instrument(skip_all, err))]
    async fn run_withdraw(
        &self,
        amount: &str,
        progress: Progress<'_>,
    ) -> Result<WithdrawOutcome, DepositError> {
        let _guard = InFlightGuard::acquire(&self.in_flight, Action::Withdraw)?;
        let result = self.withdraw_flow(amount, &progress).await;
        progress.emit(match &result {
            Ok(WithdrawOutcome::Confirmed { .. }) => FlowState::Succeeded,
            Ok(WithdrawOutcome::StillPending { .. }) => FlowState::StillPending,
            Err(_) => FlowState::Failed,
        });
        result
    }

    async fn withdraw_flow(
        &self,
        amount: &str,
        progress: &Progress<'_>,
    ) -> Result<WithdrawOutcome, DepositError> {
        let (owner, amount) = self.validate(amount, progress)?;
        let confirmation = self
            .submit_and_confirm(
                owner,
                BankCall::Withdraw { amount },
                FlowState::SubmittingWithdrawal,
                FlowState::AwaitingWithdrawalConfirmation,
                progress,
            )
            .await?;
        Ok(match confirmation {
            Confirmation::Confirmed(withdraw_tx) => WithdrawOutcome::Confirmed {
                withdraw_tx,
                balances: self.refreshed_balances(owner).await,
            },
            Confirmation::Pending(tx_hash) => WithdrawOutcome::StillPending {
                stage: FlowState::AwaitingWithdrawalConfirmation,
                tx_hash,
            },
        })
    }
}
