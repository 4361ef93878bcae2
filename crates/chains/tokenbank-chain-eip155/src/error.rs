//! Errors of the deposit and withdraw flows, and their user-facing classification.

use alloy_primitives::TxHash;
use std::fmt::{Display, Formatter};
use tokenbank_types::timestamp::UnixTimestamp;
use tokenbank_types::util::money_amount::MoneyAmountParseError;

use crate::capability::CapabilityError;
use crate::orchestrator::{Action, DepositStrategy, FlowState};
use crate::permit::PayloadError;
use crate::signature::SignatureFormatError;

/// Input rejected before any chain interaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Connect an account first")]
    NoAccount,
    #[error("Enter an amount")]
    EmptyAmount,
    #[error("Amount is not a number")]
    InvalidAmount,
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,
    #[error("Amount has {money} decimal places, the token supports {token}")]
    Precision { money: u32, token: u32 },
    #[error("Amount is too large for the token")]
    AmountTooLarge,
}

impl From<MoneyAmountParseError> for ValidationError {
    fn from(value: MoneyAmountParseError) -> Self {
        match value {
            MoneyAmountParseError::Empty => ValidationError::EmptyAmount,
            MoneyAmountParseError::InvalidFormat => ValidationError::InvalidAmount,
            MoneyAmountParseError::NotPositive => ValidationError::NonPositiveAmount,
            MoneyAmountParseError::WrongPrecision { money, token } => {
                ValidationError::Precision { money, token }
            }
            MoneyAmountParseError::TooLarge => ValidationError::AmountTooLarge,
        }
    }
}

/// Why a deposit or withdrawal did not complete.
///
/// Failures that happen at a particular step carry the [`FlowState`] the flow
/// was in, so a caller can tell e.g. a failed approval from a failed deposit.
#[derive(Debug, thiserror::Error)]
pub enum DepositError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Request declined while {stage}")]
    UserDeclined { stage: FlowState },
    #[error("No wallet available while {stage}: {reason}")]
    ProviderUnavailable { stage: FlowState, reason: String },
    #[error("Chain read failed while {stage}: {source}")]
    ChainRead {
        stage: FlowState,
        #[source]
        source: CapabilityError,
    },
    #[error("Signing failed while {stage}: {source}")]
    Signing {
        stage: FlowState,
        #[source]
        source: CapabilityError,
    },
    #[error("Transaction submission failed while {stage}: {source}")]
    ChainWrite {
        stage: FlowState,
        #[source]
        source: CapabilityError,
    },
    #[error("Waiting for confirmation failed while {stage}: {source}")]
    Confirmation {
        stage: FlowState,
        #[source]
        source: CapabilityError,
    },
    #[error("Transaction {tx_hash} reverted while {stage}")]
    Reverted { stage: FlowState, tx_hash: TxHash },
    #[error(transparent)]
    SignatureFormat(#[from] SignatureFormatError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("Signature expired at {deadline} before it could be submitted")]
    SignatureExpired { deadline: UnixTimestamp },
    #[error("A {0} is already in progress")]
    Busy(Action),
    #[error("Strategy '{0}' does not use a signature")]
    NotSignatureBased(DepositStrategy),
}

impl DepositError {
    pub(crate) fn read(stage: FlowState, error: CapabilityError) -> Self {
        Self::classify(stage, error, |stage, source| DepositError::ChainRead {
            stage,
            source,
        })
    }

    pub(crate) fn write(stage: FlowState, error: CapabilityError) -> Self {
        Self::classify(stage, error, |stage, source| DepositError::ChainWrite {
            stage,
            source,
        })
    }

    pub(crate) fn confirmation(stage: FlowState, error: CapabilityError) -> Self {
        Self::classify(stage, error, |stage, source| DepositError::Confirmation {
            stage,
            source,
        })
    }

    pub(crate) fn signing(stage: FlowState, error: CapabilityError) -> Self {
        Self::classify(stage, error, |stage, source| DepositError::Signing {
            stage,
            source,
        })
    }

    fn classify(
        stage: FlowState,
        error: CapabilityError,
        otherwise: impl FnOnce(FlowState, CapabilityError) -> DepositError,
    ) -> Self {
        match error {
            CapabilityError::UserRejected => DepositError::UserDeclined { stage },
            CapabilityError::Unavailable(reason) => {
                DepositError::ProviderUnavailable { stage, reason }
            }
            other => otherwise(stage, other),
        }
    }

    /// The step the flow was in when it failed, if the failure belongs to one.
    pub fn stage(&self) -> Option<FlowState> {
        match self {
            DepositError::Validation(_) => Some(FlowState::ValidatingInput),
            DepositError::UserDeclined { stage }
            | DepositError::ProviderUnavailable { stage, .. }
            | DepositError::ChainRead { stage, .. }
            | DepositError::Signing { stage, .. }
            | DepositError::ChainWrite { stage, .. }
            | DepositError::Confirmation { stage, .. }
            | DepositError::Reverted { stage, .. } => Some(*stage),
            DepositError::SignatureFormat(_) => Some(FlowState::DecodingSignature),
            DepositError::Payload(_) => Some(FlowState::RequestingSignature),
            DepositError::SignatureExpired { .. } => Some(FlowState::SubmittingDeposit),
            DepositError::Busy(_) | DepositError::NotSignatureBased(_) => None,
        }
    }

    /// The message category shown to the user.
    pub fn notice(&self) -> Notice {
        match self {
            DepositError::Validation(e) => Notice::Invalid(e.to_string()),
            DepositError::NotSignatureBased(_) => Notice::Invalid(self.to_string()),
            DepositError::UserDeclined { .. } => Notice::Declined,
            other => Notice::Failed(other.to_string()),
        }
    }
}

/// User-facing classification of a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The input needs fixing.
    Invalid(String),
    /// The account holder declined a prompt.
    Declined,
    /// Anything else.
    Failed(String),
}

impl Display for Notice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Invalid(message) => write!(f, "Invalid input: {message}"),
            Notice::Declined => f.write_str("The request was declined"),
            Notice::Failed(message) => write!(f, "Operation failed: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_rejection_is_declined_at_any_stage() {
        for stage in [
            FlowState::Approving,
            FlowState::RequestingSignature,
            FlowState::SubmittingDeposit,
        ] {
            let error = DepositError::write(stage, CapabilityError::UserRejected);
            assert!(matches!(error, DepositError::UserDeclined { stage: s } if s == stage));
            assert_eq!(error.notice(), Notice::Declined);
        }
    }

    #[test]
    fn test_unavailable_maps_to_provider_unavailable() {
        let error = DepositError::signing(
            FlowState::RequestingSignature,
            CapabilityError::Unavailable("no signer".into()),
        );
        assert!(matches!(error, DepositError::ProviderUnavailable { .. }));
        assert!(matches!(error.notice(), Notice::Failed(_)));
    }

    #[test]
    fn test_transport_errors_keep_category() {
        let source = CapabilityError::Transport("timeout".into());
        assert!(matches!(
            DepositError::read(FlowState::CheckingAllowance, source.clone()),
            DepositError::ChainRead { stage: FlowState::CheckingAllowance, .. }
        ));
        assert!(matches!(
            DepositError::confirmation(FlowState::AwaitingDepositConfirmation, source),
            DepositError::Confirmation { .. }
        ));
    }

    #[test]
    fn test_validation_notice() {
        let error = DepositError::from(ValidationError::from(MoneyAmountParseError::NotPositive));
        assert_eq!(
            error.notice(),
            Notice::Invalid("Amount must be greater than zero".into())
        );
        assert_eq!(error.stage(), Some(FlowState::ValidatingInput));
    }
}
