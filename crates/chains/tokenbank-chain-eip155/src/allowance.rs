//! Decides whether an `approve` must precede a deposit.

use alloy_primitives::{Address, U256};

/// How much to approve when the current allowance falls short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPolicy {
    /// Approve exactly the required amount.
    Exact,
    /// Approve `U256::MAX`, so the approval only ever happens once.
    Unbounded,
}

/// Outcome of comparing an allowance against a required amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Sufficient,
    Required { spender: Address, amount: U256 },
}

/// `true` iff `current` does not cover `required`.
///
/// An allowance exactly equal to the required amount is enough.
pub fn needs_approval(current: U256, required: U256) -> bool {
    current < required
}

pub fn classify(
    current: U256,
    required: U256,
    spender: Address,
    policy: ApprovalPolicy,
) -> ApprovalDecision {
    if !needs_approval(current, required) {
        return ApprovalDecision::Sufficient;
    }
    let amount = match policy {
        ApprovalPolicy::Exact => required,
        ApprovalPolicy::Unbounded => U256::MAX,
    };
    ApprovalDecision::Required { spender, amount }
}
