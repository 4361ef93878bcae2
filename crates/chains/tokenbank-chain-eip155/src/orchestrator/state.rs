use std::fmt::{Display, Formatter};

/// Where a deposit or withdrawal invocation currently is.
///
/// Every invocation starts in [`FlowState::Idle`] and ends in exactly one of
/// [`FlowState::Succeeded`], [`FlowState::StillPending`] or [`FlowState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowState {
    Idle,
    ValidatingInput,
    CheckingAllowance,
    Approving,
    AwaitingApprovalConfirmation,
    RequestingSignature,
    DecodingSignature,
    SubmittingDeposit,
    AwaitingDepositConfirmation,
    SubmittingWithdrawal,
    AwaitingWithdrawalConfirmation,
    Succeeded,
    /// A confirmation wait ran out of time or was cancelled; the transaction may still land.
    StillPending,
    Failed,
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowState::Succeeded | FlowState::StillPending | FlowState::Failed
        )
    }
}

impl Display for FlowState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FlowState::Idle => "idle",
            FlowState::ValidatingInput => "validating input",
            FlowState::CheckingAllowance => "checking allowance",
            FlowState::Approving => "approving",
            FlowState::AwaitingApprovalConfirmation => "awaiting approval confirmation",
            FlowState::RequestingSignature => "requesting signature",
            FlowState::DecodingSignature => "decoding signature",
            FlowState::SubmittingDeposit => "submitting deposit",
            FlowState::AwaitingDepositConfirmation => "awaiting deposit confirmation",
            FlowState::SubmittingWithdrawal => "submitting withdrawal",
            FlowState::AwaitingWithdrawalConfirmation => "awaiting withdrawal confirmation",
            FlowState::Succeeded => "succeeded",
            FlowState::StillPending => "still pending",
            FlowState::Failed => "failed",
        };
        f.write_str(label)
    }
}
