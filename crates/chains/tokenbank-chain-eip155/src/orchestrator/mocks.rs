//! In-memory capabilities that record every interaction.

use alloy_dyn_abi::eip712::TypedData;
use alloy_primitives::{Address, TxHash, U256, address};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::capability::{
    BankCall, CapabilityError, ChainReader, TransactionSender, TxOutcome, TypedDataSigner,
};
use crate::chain::BankDeployment;

/// How [`MockChain::wait_for_confirmation`] behaves.
#[derive(Debug, Clone)]
pub enum ConfirmationMode {
    /// Mine and apply the call.
    Confirm,
    /// Mine without applying; the receipt reports failure.
    Revert,
    /// Never resolve.
    Hang,
    Fail(CapabilityError),
}

#[derive(Debug, Default)]
struct ChainState {
    balances: HashMap<Address, U256>,
    deposits: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    nonces: HashMap<Address, U256>,
    reads: Vec<&'static str>,
    sent: Vec<(Address, BankCall)>,
    pending: HashMap<TxHash, (Address, BankCall)>,
    read_error: Option<CapabilityError>,
    /// Sends fail once this many have gone through.
    send_error: Option<(usize, CapabilityError)>,
}

/// A token plus bank living in memory.
///
/// Calls take effect only once confirmed, like on a real chain.
pub struct MockChain {
    deployment: BankDeployment,
    state: Mutex<ChainState>,
    confirmation: Mutex<ConfirmationMode>,
}

impl MockChain {
    pub const SYMBOL: &'static str = "TBK";
    pub const NAME: &'static str = "Bank Token";

    pub fn new() -> Self {
        Self {
            deployment: BankDeployment::sepolia(),
            state: Mutex::new(ChainState::default()),
            confirmation: Mutex::new(ConfirmationMode::Confirm),
        }
    }

    pub fn owner() -> Address {
        address!("0x00000000000000000000000000000000000000aa")
    }

    pub fn deployment(&self) -> BankDeployment {
        self.deployment
    }

    pub fn set_balance(&self, owner: Address, amount: U256) {
        self.lock().balances.insert(owner, amount);
    }

    pub fn set_deposit(&self, owner: Address, amount: U256) {
        self.lock().deposits.insert(owner, amount);
    }

    pub fn set_allowance(&self, owner: Address, spender: Address, amount: U256) {
        self.lock().allowances.insert((owner, spender), amount);
    }

    pub fn set_nonce(&self, owner: Address, nonce: U256) {
        self.lock().nonces.insert(owner, nonce);
    }

    pub fn fail_reads_with(&self, error: CapabilityError) {
        self.lock().read_error = Some(error);
    }

    pub fn fail_sends_with(&self, error: CapabilityError) {
        self.fail_sends_after(0, error);
    }

    pub fn fail_sends_after(&self, successful: usize, error: CapabilityError) {
        self.lock().send_error = Some((successful, error));
    }

    pub fn clear_send_failure(&self) {
        self.lock().send_error = None;
    }

    pub fn set_confirmation(&self, mode: ConfirmationMode) {
        *self.confirmation.lock().unwrap() = mode;
    }

    pub fn allowance_of(&self, owner: Address, spender: Address) -> U256 {
        self.lock()
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn deposit_balance(&self, owner: Address) -> U256 {
        self.lock().deposits.get(&owner).copied().unwrap_or_default()
    }

    pub fn reads(&self) -> Vec<&'static str> {
        self.lock().reads.clone()
    }

    pub fn sent(&self) -> Vec<(Address, BankCall)> {
        self.lock().sent.clone()
    }

    pub fn sent_names(&self) -> Vec<&'static str> {
        self.lock().sent.iter().map(|(_, call)| call.name()).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    fn read<V>(
        &self,
        name: &'static str,
        f: impl FnOnce(&ChainState) -> V,
    ) -> Result<V, CapabilityError> {
        let mut state = self.lock();
        state.reads.push(name);
        if let Some(error) = state.read_error.clone() {
            return Err(error);
        }
        Ok(f(&*state))
    }

    fn apply(state: &mut ChainState, token: Address, from: Address, call: BankCall) {
        let move_in = |state: &mut ChainState, owner: Address, amount: U256| {
            let balance = state.balances.entry(owner).or_default();
            *balance = balance.saturating_sub(amount);
            *state.deposits.entry(owner).or_default() += amount;
        };
        match call {
            BankCall::Approve { spender, amount } => {
                state.allowances.insert((from, spender), amount);
            }
            BankCall::Deposit { amount } => move_in(state, from, amount),
            BankCall::Withdraw { amount } => {
                let deposit = state.deposits.entry(from).or_default();
                *deposit = deposit.saturating_sub(amount);
                *state.balances.entry(from).or_default() += amount;
            }
            BankCall::PermitDeposit { owner, amount, .. } => {
                *state.nonces.entry(owner).or_default() += U256::from(1);
                move_in(state, owner, amount);
            }
            BankCall::DepositWithPermit2 { permit, owner, .. } => {
                debug_assert_eq!(permit.permitted.token, token);
                move_in(state, owner, permit.permitted.amount);
            }
        }
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn token_name(&self) -> Result<String, CapabilityError> {
        self.read("name", |_| Self::NAME.to_string())
    }

    async fn token_symbol(&self) -> Result<String, CapabilityError> {
        self.read("symbol", |_| Self::SYMBOL.to_string())
    }

    async fn balance_of(&self, owner: Address) -> Result<U256, CapabilityError> {
        self.read("balanceOf", |s| s.balances.get(&owner).copied().unwrap_or_default())
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, CapabilityError> {
        self.read("allowance", |s| {
            s.allowances
                .get(&(owner, spender))
                .copied()
                .unwrap_or_default()
        })
    }

    async fn nonces(&self, owner: Address) -> Result<U256, CapabilityError> {
        self.read("nonces", |s| s.nonces.get(&owner).copied().unwrap_or_default())
    }

    async fn deposit_of(&self, owner: Address) -> Result<U256, CapabilityError> {
        self.read("getDeposit", |s| s.deposits.get(&owner).copied().unwrap_or_default())
    }
}

#[async_trait]
impl TransactionSender for MockChain {
    async fn send_transaction(
        &self,
        from: Address,
        call: BankCall,
    ) -> Result<TxHash, CapabilityError> {
        let mut state = self.lock();
        if let Some((successful, error)) = state.send_error.clone() {
            if state.sent.len() >= successful {
                return Err(error);
            }
        }
        state.sent.push((from, call.clone()));
        let tx_hash = TxHash::with_last_byte(state.sent.len() as u8);
        state.pending.insert(tx_hash, (from, call));
        Ok(tx_hash)
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<TxOutcome, CapabilityError> {
        let mode = self.confirmation.lock().unwrap().clone();
        let success = match mode {
            ConfirmationMode::Confirm => true,
            ConfirmationMode::Revert => false,
            ConfirmationMode::Hang => return std::future::pending().await,
            ConfirmationMode::Fail(error) => return Err(error),
        };
        let mut state = self.lock();
        let pending = state.pending.remove(&tx_hash);
        if let (Some((from, call)), true) = (pending, success) {
            Self::apply(&mut state, self.deployment.token_address(), from, call);
        }
        Ok(TxOutcome {
            tx_hash,
            success,
            block_number: Some(1),
        })
    }
}

/// How [`MockSigner::sign_typed_data`] answers.
#[derive(Debug, Clone)]
pub enum SignerMode {
    Return(String),
    Fail(CapabilityError),
}

/// A wallet that answers every signature request the same way.
pub struct MockSigner {
    account: Option<Address>,
    mode: SignerMode,
    requests: Mutex<Vec<TypedData>>,
}

impl MockSigner {
    /// A 65-byte signature of `0xaa` bytes, so `r = s = 0xaa..aa` and `v = 0xaa`.
    pub fn aaaa_signature() -> String {
        format!("0x{}", "aa".repeat(65))
    }

    pub fn returning(account: Address, signature: impl Into<String>) -> Self {
        Self {
            account: Some(account),
            mode: SignerMode::Return(signature.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(account: Address) -> Self {
        Self {
            account: Some(account),
            mode: SignerMode::Fail(CapabilityError::UserRejected),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            account: None,
            mode: SignerMode::Fail(CapabilityError::Unavailable("no wallet".into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<TypedData> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TypedDataSigner for MockSigner {
    fn account(&self) -> Option<Address> {
        self.account
    }

    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<String, CapabilityError> {
        self.requests.lock().unwrap().push(typed_data.clone());
        match &self.mode {
            SignerMode::Return(signature) => Ok(signature.clone()),
            SignerMode::Fail(error) => Err(error.clone()),
        }
    }
}
