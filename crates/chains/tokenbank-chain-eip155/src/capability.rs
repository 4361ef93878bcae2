//! The three capabilities the deposit flows depend on.
//!
//! [`ChainReader`] answers read-only contract queries, [`TransactionSender`]
//! submits state-changing calls and waits for their receipts, and
//! [`TypedDataSigner`] produces EIP-712 signatures for the connected account.
//! The orchestrator only ever sees these traits; the alloy-backed
//! implementations live in [`crate::chain::provider`].

use alloy_dyn_abi::eip712::TypedData;
use alloy_primitives::{Address, B256, Bytes, TxHash, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::sync::Arc;

use crate::chain::BankDeployment;
use crate::chain::contracts::{IERC20Permit, ITokenBank};

/// EIP-1193 error code for "user rejected the request".
pub const USER_REJECTED_CODE: i64 = 4001;

/// Failure reported by a capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// The account holder declined a signature or transaction prompt.
    #[error("Request rejected by the user")]
    UserRejected,
    /// No wallet or signer is connected.
    #[error("Capability unavailable: {0}")]
    Unavailable(String),
    /// The RPC endpoint could not be reached or returned an error.
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("{0}")]
    Other(String),
}

impl CapabilityError {
    /// Classifies a free-form provider error message.
    ///
    /// Wallets signal a declined prompt inconsistently: some use EIP-1193
    /// code `4001`, others only say "user rejected" or "user denied". All of
    /// those become [`CapabilityError::UserRejected`]; anything else is
    /// [`CapabilityError::Other`].
    pub fn classify_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_user_rejection(&message) {
            CapabilityError::UserRejected
        } else {
            CapabilityError::Other(message)
        }
    }

    /// Classifies a JSON-RPC error response by code, falling back to its message.
    pub fn from_rpc_error(code: i64, message: impl Into<String>) -> Self {
        if code == USER_REJECTED_CODE {
            CapabilityError::UserRejected
        } else {
            Self::classify_message(message)
        }
    }

    pub fn is_user_rejected(&self) -> bool {
        matches!(self, CapabilityError::UserRejected)
    }
}

fn is_user_rejection(message: &str) -> bool {
    let lower = message.to_lowercase();
    if lower.contains("user rejected") || lower.contains("user denied") {
        return true;
    }
    lower
        .split(|c: char| !c.is_ascii_digit())
        .any(|token| token == "4001")
}

/// Result of waiting for a transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_hash: TxHash,
    /// `false` if the transaction was mined but reverted.
    pub success: bool,
    pub block_number: Option<u64>,
}

/// A state-changing call against the token or the bank.
#[derive(Debug, Clone)]
pub enum BankCall {
    /// `token.approve(spender, amount)`.
    Approve { spender: Address, amount: U256 },
    /// `bank.deposit(amount)`, pulling funds under an existing allowance.
    Deposit { amount: U256 },
    /// `bank.withdraw(amount)`.
    Withdraw { amount: U256 },
    /// `bank.permitDeposit(owner, amount, deadline, v, r, s)`.
    PermitDeposit {
        owner: Address,
        amount: U256,
        deadline: U256,
        v: u8,
        r: B256,
        s: B256,
    },
    /// `bank.depositWithPermit2(permit, signature, owner)`.
    DepositWithPermit2 {
        permit: ITokenBank::PermitTransferFrom,
        signature: Bytes,
        owner: Address,
    },
}

impl BankCall {
    /// Contract function name, for logs and messages.
    pub fn name(&self) -> &'static str {
        match self {
            BankCall::Approve { .. } => "approve",
            BankCall::Deposit { .. } => "deposit",
            BankCall::Withdraw { .. } => "withdraw",
            BankCall::PermitDeposit { .. } => "permitDeposit",
            BankCall::DepositWithPermit2 { .. } => "depositWithPermit2",
        }
    }

    /// The contract the call is addressed to: the token for approvals, the bank otherwise.
    pub fn target(&self, deployment: &BankDeployment) -> Address {
        match self {
            BankCall::Approve { .. } => deployment.token_address(),
            _ => deployment.bank,
        }
    }

    /// ABI-encoded calldata.
    pub fn calldata(&self) -> Bytes {
        let encoded = match self.clone() {
            BankCall::Approve { spender, amount } => IERC20Permit::approveCall {
                spender,
                value: amount,
            }
            .abi_encode(),
            BankCall::Deposit { amount } => ITokenBank::depositCall { amount }.abi_encode(),
            BankCall::Withdraw { amount } => ITokenBank::withdrawCall { amount }.abi_encode(),
            BankCall::PermitDeposit {
                owner,
                amount,
                deadline,
                v,
                r,
                s,
            } => ITokenBank::permitDepositCall {
                owner,
                amount,
                deadline,
                v,
                r,
                s,
            }
            .abi_encode(),
            BankCall::DepositWithPermit2 {
                permit,
                signature,
                owner,
            } => ITokenBank::depositWithPermit2Call {
                permit,
                signature,
                owner,
            }
            .abi_encode(),
        };
        Bytes::from(encoded)
    }
}

/// Read-only queries against the token and the bank.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn token_name(&self) -> Result<String, CapabilityError>;
    async fn token_symbol(&self) -> Result<String, CapabilityError>;
    async fn balance_of(&self, owner: Address) -> Result<U256, CapabilityError>;
    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, CapabilityError>;
    /// Current EIP-2612 nonce of `owner` on the token.
    async fn nonces(&self, owner: Address) -> Result<U256, CapabilityError>;
    /// Amount `owner` holds in the bank.
    async fn deposit_of(&self, owner: Address) -> Result<U256, CapabilityError>;
}

/// Submission of state-changing calls.
#[async_trait]
pub trait TransactionSender: Send + Sync {
    /// Signs and broadcasts `call` from `from`, returning once the node accepted it.
    async fn send_transaction(&self, from: Address, call: BankCall)
    -> Result<TxHash, CapabilityError>;

    /// Waits for the receipt of `tx_hash`. May wait indefinitely; callers bound it.
    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<TxOutcome, CapabilityError>;
}

/// EIP-712 signing on behalf of the connected account.
#[async_trait]
pub trait TypedDataSigner: Send + Sync {
    /// The connected account, if any.
    fn account(&self) -> Option<Address>;

    /// Signs `typed_data`, returning a `0x`-prefixed 65-byte hex signature.
    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<String, CapabilityError>;
}

#[async_trait]
impl<T: ChainReader + ?Sized> ChainReader for Arc<T> {
    async fn token_name(&self) -> Result<String, CapabilityError> {
        (**self).token_name().await
    }

    async fn token_symbol(&self) -> Result<String, CapabilityError> {
        (**self).token_symbol().await
    }

    async fn balance_of(&self, owner: Address) -> Result<U256, CapabilityError> {
        (**self).balance_of(owner).await
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, CapabilityError> {
        (**self).allowance(owner, spender).await
    }

    async fn nonces(&self, owner: Address) -> Result<U256, CapabilityError> {
        (**self).nonces(owner).await
    }

    async fn deposit_of(&self, owner: Address) -> Result<U256, CapabilityError> {
        (**self).deposit_of(owner).await
    }
}

#[async_trait]
impl<T: TransactionSender + ?Sized> TransactionSender for Arc<T> {
    async fn send_transaction(
        &self,
        from: Address,
        call: BankCall,
    ) -> Result<TxHash, CapabilityError> {
        (**self).send_transaction(from, call).await
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<TxOutcome, CapabilityError> {
        (**self).wait_for_confirmation(tx_hash).await
    }
}

#[async_trait]
impl<T: TypedDataSigner + ?Sized> TypedDataSigner for Arc<T> {
    fn account(&self) -> Option<Address> {
        (**self).account()
    }

    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<String, CapabilityError> {
        (**self).sign_typed_data(typed_data).await
    }
}
