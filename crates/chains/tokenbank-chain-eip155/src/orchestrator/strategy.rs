use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// How a deposit is authorized. Always chosen by the caller, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepositStrategy {
    /// `approve` (only if the allowance is short), then `deposit`.
    ApproveThenDeposit,
    /// EIP-2612 `Permit` signature, then `permitDeposit`.
    Eip2612PermitDeposit,
    /// Permit2 `PermitTransferFrom` signature, then `depositWithPermit2`.
    Permit2PermitDeposit,
}

impl DepositStrategy {
    pub const ALL: [DepositStrategy; 3] = [
        DepositStrategy::ApproveThenDeposit,
        DepositStrategy::Eip2612PermitDeposit,
        DepositStrategy::Permit2PermitDeposit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStrategy::ApproveThenDeposit => "approve",
            DepositStrategy::Eip2612PermitDeposit => "eip2612",
            DepositStrategy::Permit2PermitDeposit => "permit2",
        }
    }

    /// Whether the strategy asks the account holder for an EIP-712 signature.
    pub fn is_signature_based(&self) -> bool {
        !matches!(self, DepositStrategy::ApproveThenDeposit)
    }
}

impl Display for DepositStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown deposit strategy '{0}', expected one of: approve, eip2612, permit2")]
pub struct UnknownStrategy(String);

impl FromStr for DepositStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DepositStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

/// A user-triggerable action. At most one invocation per action is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Deposit(DepositStrategy),
    Withdraw,
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Deposit(strategy) => write!(f, "deposit ({strategy})"),
            Action::Withdraw => f.write_str("withdraw"),
        }
    }
}
