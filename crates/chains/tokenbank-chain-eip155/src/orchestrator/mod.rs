//! The deposit state machine.
//!
//! One [`DepositOrchestrator`] serves any number of invocations. Each call to
//! [`DepositOrchestrator::execute`] runs the transitions of the chosen
//! [`DepositStrategy`] from scratch: allowances, nonces and deadlines are read
//! or generated fresh every time, so a failed invocation can simply be repeated.
//!
//! | Strategy | Transitions |
//! |----------|-------------|
//! | `ApproveThenDeposit` | validate, check allowance, (approve, await), deposit, await |
//! | `Eip2612PermitDeposit` | validate, request signature, decode, `permitDeposit`, await |
//! | `Permit2PermitDeposit` | validate, check Permit2 allowance, (approve max, await), request signature, `depositWithPermit2`, await |
//!
//! Progress can be observed through an unbounded channel of [`FlowState`]s.
//! Confirmation waits are bounded by [`FlowSettings::confirmation_timeout`] and
//! a [`CancellationToken`]; either ends the invocation with
//! [`DepositOutcome::StillPending`] instead of blocking.

mod state;
pub use state::*;

mod strategy;
pub use strategy::*;

mod withdraw;
pub use withdraw::*;

#[cfg(test)]
pub(crate) mod mocks;

use alloy_dyn_abi::eip712::TypedData;
use alloy_primitives::{Address, TxHash, U256};
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use tokenbank_types::timestamp::UnixTimestamp;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::allowance::{ApprovalDecision, ApprovalPolicy, classify};
use crate::capability::{BankCall, ChainReader, TransactionSender, TypedDataSigner};
use crate::chain::{BankChainConfig, BankDeployment};
use crate::error::{DepositError, ValidationError};
use crate::permit::{
    Eip2612PermitParams, Permit2NonceSource, Permit2PermitParams, RandomPermit2Nonce,
    build_eip2612_permit, build_permit2_permit,
};
use crate::reader::{BalanceSheet, refresh_balances};
use crate::signature::{decompose, raw_signature_bytes};

/// Tunables of a flow invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSettings {
    /// Validity window of permit signatures, from the moment they are built.
    pub deadline_secs: u64,
    /// Upper bound on each confirmation wait.
    pub confirmation_timeout: Duration,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            deadline_secs: 3600,
            confirmation_timeout: Duration::from_secs(120),
        }
    }
}

impl From<&BankChainConfig> for FlowSettings {
    fn from(config: &BankChainConfig) -> Self {
        Self {
            deadline_secs: config.deadline_secs,
            confirmation_timeout: config.receipt_timeout(),
        }
    }
}

/// How a deposit invocation ended, short of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositOutcome {
    Confirmed {
        /// Set when an approval had to be sent first.
        approval_tx: Option<TxHash>,
        deposit_tx: TxHash,
        /// Fresh balances; `None` if refreshing them failed.
        balances: Option<BalanceSheet>,
    },
    /// A transaction was sent but its confirmation did not arrive in time.
    StillPending { stage: FlowState, tx_hash: TxHash },
}

/// Result of a bounded confirmation wait.
enum Confirmation {
    Confirmed(TxHash),
    Pending(TxHash),
}

/// Result of making sure the spender may pull the deposit amount.
enum AllowanceStep {
    /// Allowance covers the amount, after the given approval if one was needed.
    Ready(Option<TxHash>),
    ApprovalPending(TxHash),
}

impl AllowanceStep {
    fn pending_outcome(tx_hash: TxHash) -> DepositOutcome {
        DepositOutcome::StillPending {
            stage: FlowState::AwaitingApprovalConfirmation,
            tx_hash,
        }
    }
}

/// Reports transitions to an optional observer.
struct Progress<'a> {
    observer: Option<&'a mpsc::UnboundedSender<FlowState>>,
}

impl Progress<'_> {
    fn emit(&self, state: FlowState) {
        #[cfg(feature = "telemetry")]
        tracing::debug!(%state, "Flow transition");
        if let Some(observer) = self.observer {
            // A dropped receiver only means nobody is watching.
            let _ = observer.send(state);
        }
    }
}

/// Removes the action from the in-flight set when the invocation ends.
struct InFlightGuard {
    in_flight: Arc<DashSet<Action>>,
    action: Action,
}

impl InFlightGuard {
    fn acquire(in_flight: &Arc<DashSet<Action>>, action: Action) -> Result<Self, DepositError> {
        if !in_flight.insert(action) {
            return Err(DepositError::Busy(action));
        }
        Ok(Self {
            in_flight: Arc::clone(in_flight),
            action,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.action);
    }
}

/// Runs deposits and withdrawals against injected capabilities.
///
/// `R` reads the chain, `T` submits transactions and `S` signs typed data on
/// behalf of the connected account. None of them is reached through global state.
pub struct DepositOrchestrator<R, T, S> {
    reader: R,
    sender: T,
    signer: S,
    deployment: BankDeployment,
    settings: FlowSettings,
    nonce_source: Arc<dyn Permit2NonceSource>,
    in_flight: Arc<DashSet<Action>>,
    cancellation: CancellationToken,
}

impl<R, T, S> DepositOrchestrator<R, T, S>
where
    R: ChainReader,
    T: TransactionSender,
    S: TypedDataSigner,
{
    pub fn new(reader: R, sender: T, signer: S, deployment: BankDeployment) -> Self {
        Self {
            reader,
            sender,
            signer,
            deployment,
            settings: FlowSettings::default(),
            nonce_source: Arc::new(RandomPermit2Nonce),
            in_flight: Arc::new(DashSet::new()),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_settings(mut self, settings: FlowSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_nonce_source(mut self, nonce_source: Arc<dyn Permit2NonceSource>) -> Self {
        self.nonce_source = nonce_source;
        self
    }

    /// Cancelling `token` turns any ongoing confirmation wait into [`DepositOutcome::StillPending`].
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn deployment(&self) -> &BankDeployment {
        &self.deployment
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// The connected account, if any.
    pub fn account(&self) -> Option<Address> {
        self.signer.account()
    }

    /// Runs a deposit of the decimal `amount` with the chosen strategy.
    pub async fn execute(
        &self,
        strategy: DepositStrategy,
        amount: &str,
    ) -> Result<DepositOutcome, DepositError> {
        self.run_deposit(strategy, amount, Progress { observer: None })
            .await
    }

    /// Like [`Self::execute`], also sending every transition to `progress`.
    pub async fn execute_with_progress(
        &self,
        strategy: DepositStrategy,
        amount: &str,
        progress: mpsc::UnboundedSender<FlowState>,
    ) -> Result<DepositOutcome, DepositError> {
        self.run_deposit(
            strategy,
            amount,
            Progress {
                observer: Some(&progress),
            },
        )
        .await
    }

    /// Builds the unsigned typed data a signature-based strategy would ask to sign.
    ///
    /// Reads the token name and nonce for EIP-2612 and draws a fresh nonce for
    /// Permit2, exactly as [`Self::execute`] would, but submits nothing. `owner`
    /// defaults to the connected account.
    pub async fn prepare_typed_data(
        &self,
        strategy: DepositStrategy,
        amount: &str,
        owner: Option<Address>,
    ) -> Result<TypedData, DepositError> {
        let owner = owner
            .or_else(|| self.signer.account())
            .ok_or(ValidationError::NoAccount)?;
        let amount = self
            .deployment
            .token
            .parse(amount)
            .map_err(ValidationError::from)?;
        let deadline = UnixTimestamp::deadline_in(self.settings.deadline_secs);
        let stage = FlowState::RequestingSignature;
        let typed_data = match strategy {
            DepositStrategy::ApproveThenDeposit => {
                return Err(DepositError::NotSignatureBased(strategy));
            }
            DepositStrategy::Eip2612PermitDeposit => {
                let (token_name, nonce) =
                    tokio::try_join!(self.reader.token_name(), self.reader.nonces(owner))
                        .map_err(|e| DepositError::read(stage, e))?;
                build_eip2612_permit(&Eip2612PermitParams {
                    owner: Some(owner),
                    spender: self.deployment.bank,
                    value: amount,
                    nonce,
                    deadline,
                    token_name,
                    token: self.deployment.token_address(),
                    chain_id: self.deployment.chain.inner(),
                })?
                .typed_data
            }
            DepositStrategy::Permit2PermitDeposit => {
                build_permit2_permit(&Permit2PermitParams {
                    owner: Some(owner),
                    token: self.deployment.token_address(),
                    amount,
                    spender: self.deployment.bank,
                    nonce: self.nonce_source.next_nonce(),
                    deadline,
                    chain_id: self.deployment.chain.inner(),
                    permit2: self.deployment.permit2,
                })?
                .typed_data
            }
        };
        Ok(typed_data)
    }

    /// Current balances of the connected account.
    pub async fn balances(&self) -> Result<BalanceSheet, DepositError> {
        let owner = self.signer.account().ok_or(ValidationError::NoAccount)?;
        refresh_balances(&self.reader, owner)
            .await
            .map_err(|e| DepositError::read(FlowState::Idle, e))
    }

    #[cfg_attr(feature = "telemetry", instrument(skip_all, fields(strategy = %strategy), err))]
    async fn run_deposit(
        &self,
        strategy: DepositStrategy,
        amount: &str,
        progress: Progress<'_>,
    ) -> Result<DepositOutcome, DepositError> {
        let _guard = InFlightGuard::acquire(&self.in_flight, Action::Deposit(strategy))?;
        let result = match strategy {
            DepositStrategy::ApproveThenDeposit => {
                self.approve_then_deposit(amount, &progress).await
            }
            DepositStrategy::Eip2612PermitDeposit => {
                self.eip2612_permit_deposit(amount, &progress).await
            }
            DepositStrategy::Permit2PermitDeposit => {
                self.permit2_permit_deposit(amount, &progress).await
            }
        };
        progress.emit(match &result {
            Ok(DepositOutcome::Confirmed { .. }) => FlowState::Succeeded,
            Ok(DepositOutcome::StillPending { .. }) => FlowState::StillPending,
            Err(_) => FlowState::Failed,
        });
        result
    }

    fn validate(
        &self,
        amount: &str,
        progress: &Progress<'_>,
    ) -> Result<(Address, U256), DepositError> {
        progress.emit(FlowState::ValidatingInput);
        let owner = self.signer.account().ok_or(ValidationError::NoAccount)?;
        let amount = self
            .deployment
            .token
            .parse(amount)
            .map_err(ValidationError::from)?;
        Ok((owner, amount))
    }

    async fn approve_then_deposit(
        &self,
        amount: &str,
        progress: &Progress<'_>,
    ) -> Result<DepositOutcome, DepositError> {
        let (owner, amount) = self.validate(amount, progress)?;
        let bank = self.deployment.bank;
        let approval_tx = match self
            .ensure_allowance(owner, bank, amount, ApprovalPolicy::Exact, progress)
            .await?
        {
            AllowanceStep::Ready(approval_tx) => approval_tx,
            AllowanceStep::ApprovalPending(tx_hash) => {
                return Ok(AllowanceStep::pending_outcome(tx_hash));
            }
        };
        let call = BankCall::Deposit { amount };
        self.finish_deposit(owner, call, approval_tx, progress).await
    }

    async fn eip2612_permit_deposit(
        &self,
        amount: &str,
        progress: &Progress<'_>,
    ) -> Result<DepositOutcome, DepositError> {
        let (owner, amount) = self.validate(amount, progress)?;

        progress.emit(FlowState::RequestingSignature);
        let stage = FlowState::RequestingSignature;
        let token_name = self
            .reader
            .token_name()
            .await
            .map_err(|e| DepositError::read(stage, e))?;
        let nonce = self
            .reader
            .nonces(owner)
            .await
            .map_err(|e| DepositError::read(stage, e))?;
        let request = build_eip2612_permit(&Eip2612PermitParams {
            owner: Some(owner),
            spender: self.deployment.bank,
            value: amount,
            nonce,
            deadline: UnixTimestamp::deadline_in(self.settings.deadline_secs),
            token_name,
            token: self.deployment.token_address(),
            chain_id: self.deployment.chain.inner(),
        })?;
        let signature = self
            .signer
            .sign_typed_data(&request.typed_data)
            .await
            .map_err(|e| DepositError::signing(stage, e))?;

        progress.emit(FlowState::DecodingSignature);
        let parts = decompose(&signature)?;

        ensure_not_expired(request.deadline())?;
        let call = BankCall::PermitDeposit {
            owner,
            amount,
            deadline: request.permit.deadline,
            v: parts.v,
            r: parts.r,
            s: parts.s,
        };
        self.finish_deposit(owner, call, None, progress).await
    }

    async fn permit2_permit_deposit(
        &self,
        amount: &str,
        progress: &Progress<'_>,
    ) -> Result<DepositOutcome, DepositError> {
        let (owner, amount) = self.validate(amount, progress)?;
        let permit2 = self.deployment.permit2;
        let approval_tx = match self
            .ensure_allowance(owner, permit2, amount, ApprovalPolicy::Unbounded, progress)
            .await?
        {
            AllowanceStep::Ready(approval_tx) => approval_tx,
            AllowanceStep::ApprovalPending(tx_hash) => {
                return Ok(AllowanceStep::pending_outcome(tx_hash));
            }
        };

        progress.emit(FlowState::RequestingSignature);
        let request = build_permit2_permit(&Permit2PermitParams {
            owner: Some(owner),
            token: self.deployment.token_address(),
            amount,
            spender: self.deployment.bank,
            nonce: self.nonce_source.next_nonce(),
            deadline: UnixTimestamp::deadline_in(self.settings.deadline_secs),
            chain_id: self.deployment.chain.inner(),
            permit2,
        })?;
        let signature = self
            .signer
            .sign_typed_data(&request.typed_data)
            .await
            .map_err(|e| DepositError::signing(FlowState::RequestingSignature, e))?;
        let signature = raw_signature_bytes(&signature)?;

        ensure_not_expired(request.deadline())?;
        let call = BankCall::DepositWithPermit2 {
            permit: request.bank_permit(),
            signature,
            owner,
        };
        self.finish_deposit(owner, call, approval_tx, progress).await
    }

    /// Makes sure `spender` may pull `amount` from `owner`, approving if needed.
    async fn ensure_allowance(
        &self,
        owner: Address,
        spender: Address,
        amount: U256,
        policy: ApprovalPolicy,
        progress: &Progress<'_>,
    ) -> Result<AllowanceStep, DepositError> {
        progress.emit(FlowState::CheckingAllowance);
        let current = self
            .reader
            .allowance(owner, spender)
            .await
            .map_err(|e| DepositError::read(FlowState::CheckingAllowance, e))?;
        match classify(current, amount, spender, policy) {
            ApprovalDecision::Sufficient => {
                #[cfg(feature = "telemetry")]
                tracing::debug!(%current, %amount, %spender, "Allowance sufficient, skipping approval");
                Ok(AllowanceStep::Ready(None))
            }
            ApprovalDecision::Required { spender, amount } => {
                let call = BankCall::Approve { spender, amount };
                let confirmation = self
                    .submit_and_confirm(
                        owner,
                        call,
                        FlowState::Approving,
                        FlowState::AwaitingApprovalConfirmation,
                        progress,
                    )
                    .await?;
                Ok(match confirmation {
                    Confirmation::Confirmed(tx_hash) => AllowanceStep::Ready(Some(tx_hash)),
                    Confirmation::Pending(tx_hash) => AllowanceStep::ApprovalPending(tx_hash),
                })
            }
        }
    }

    async fn finish_deposit(
        &self,
        owner: Address,
        call: BankCall,
        approval_tx: Option<TxHash>,
        progress: &Progress<'_>,
    ) -> Result<DepositOutcome, DepositError> {
        let confirmation = self
            .submit_and_confirm(
                owner,
                call,
                FlowState::SubmittingDeposit,
                FlowState::AwaitingDepositConfirmation,
                progress,
            )
            .await?;
        match confirmation {
            Confirmation::Confirmed(deposit_tx) => Ok(DepositOutcome::Confirmed {
                approval_tx,
                deposit_tx,
                balances: self.refreshed_balances(owner).await,
            }),
            Confirmation::Pending(tx_hash) => Ok(DepositOutcome::StillPending {
                stage: FlowState::AwaitingDepositConfirmation,
                tx_hash,
            }),
        }
    }

    /// Sends `call` and waits for it, bounded by the timeout and the cancellation token.
    async fn submit_and_confirm(
        &self,
        owner: Address,
        call: BankCall,
        submit_stage: FlowState,
        await_stage: FlowState,
        progress: &Progress<'_>,
    ) -> Result<Confirmation, DepositError> {
        progress.emit(submit_stage);
        #[cfg(feature = "telemetry")]
        let call_name = call.name();
        let tx_hash = self
            .sender
            .send_transaction(owner, call)
            .await
            .map_err(|e| DepositError::write(submit_stage, e))?;
        #[cfg(feature = "telemetry")]
        tracing::info!(call = call_name, %tx_hash, "Transaction submitted");

        progress.emit(await_stage);
        let wait = tokio::time::timeout(
            self.settings.confirmation_timeout,
            self.sender.wait_for_confirmation(tx_hash),
        );
        let outcome = tokio::select! {
            _ = self.cancellation.cancelled() => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(%tx_hash, "Confirmation wait cancelled");
                return Ok(Confirmation::Pending(tx_hash));
            }
            result = wait => match result {
                Ok(outcome) => outcome.map_err(|e| DepositError::confirmation(await_stage, e))?,
                Err(_) => {
                    #[cfg(feature = "telemetry")]
                    tracing::warn!(%tx_hash, timeout = ?self.settings.confirmation_timeout, "Confirmation wait timed out");
                    return Ok(Confirmation::Pending(tx_hash));
                }
            },
        };
        if !outcome.success {
            return Err(DepositError::Reverted {
                stage: await_stage,
                tx_hash,
            });
        }
        Ok(Confirmation::Confirmed(tx_hash))
    }

    /// Balances after a confirmed operation, always recomputed in full.
    async fn refreshed_balances(&self, owner: Address) -> Option<BalanceSheet> {
        match refresh_balances(&self.reader, owner).await {
            Ok(balances) => Some(balances),
            Err(_error) => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(error = %_error, "Balance refresh failed");
                None
            }
        }
    }
}

fn ensure_not_expired(deadline: UnixTimestamp) -> Result<(), DepositError> {
    if deadline.has_passed(UnixTimestamp::now()) {
        return Err(DepositError::SignatureExpired { deadline });
    }
    Ok(())
}
