//! Alloy-backed implementations of the capabilities.
//!
//! [`BankChainProvider`] reads the token and the bank over JSON-RPC and, when a
//! signer key is configured, submits transactions from that key.
//! [`LocalTypedDataSigner`] produces EIP-712 signatures with the same key.

use alloy_dyn_abi::eip712::TypedData;
use alloy_network::{Ethereum, EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy_primitives::{Address, B256, TxHash, U256, hex};
use alloy_provider::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy_provider::{
    Identity, PendingTransactionBuilder, PendingTransactionError, Provider, ProviderBuilder,
    RootProvider,
};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::{LocalSignerError, PrivateKeySigner};
use alloy_transport::TransportError;
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport_http::Http;
use async_trait::async_trait;
use std::future::IntoFuture;
use std::num::NonZeroUsize;
use tokenbank_types::config::RpcConfig;
use tower::ServiceBuilder;

#[cfg(feature = "telemetry")]
use tracing::Instrument;

use crate::capability::{
    BankCall, CapabilityError, ChainReader, TransactionSender, TxOutcome, TypedDataSigner,
};
use crate::chain::config::{BankChainConfig, EvmPrivateKey};
use crate::chain::contracts::{IERC20Permit, ITokenBank};
use crate::chain::types::{BankDeployment, Eip155ChainReference};

/// Combined filler type for gas, blob gas, nonce, and chain ID.
pub type InnerFiller =
    JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>;

/// Provider that fills and signs transactions of the configured key.
pub type WalletProvider = FillProvider<
    JoinFill<JoinFill<Identity, InnerFiller>, WalletFiller<EthereumWallet>>,
    RootProvider,
>;

/// Failure to assemble a provider from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ProviderSetupError {
    #[error("At least one http(s) RPC endpoint should be configured")]
    NoTransports,
    #[error("Invalid signer key: {0}")]
    InvalidKey(#[from] LocalSignerError),
}

/// JSON-RPC access to one bank deployment.
///
/// Reads go through a plain [`RootProvider`]. Writes need the wallet provider,
/// which only exists when the configuration carries a signer key; without it
/// [`TransactionSender`] calls fail with [`CapabilityError::Unavailable`].
#[derive(Debug)]
pub struct BankChainProvider {
    deployment: BankDeployment,
    root: RootProvider,
    wallet: Option<WalletProvider>,
    signer_address: Option<Address>,
    confirmations: u64,
}

impl BankChainProvider {
    /// Builds the transport stack: every http(s) endpoint is throttled to its
    /// configured rate and all of them sit behind one fallback layer.
    #[allow(unused_variables)] // chain is needed for tracing only here
    pub fn rpc_client(
        chain: Eip155ChainReference,
        rpc: &[RpcConfig],
    ) -> Result<RpcClient, ProviderSetupError> {
        let transports = rpc
            .iter()
            .filter_map(|provider_config| {
                let scheme = provider_config.http.scheme();
                if scheme != "http" && scheme != "https" {
                    return None;
                }
                let rpc_url = provider_config.http.clone();
                #[cfg(feature = "telemetry")]
                tracing::info!(%chain, rpc_url=%rpc_url, rate_limit=?provider_config.rate_limit, "Using HTTP transport");
                let rate_limit = provider_config.rate_limit.unwrap_or(u32::MAX);
                let service = ServiceBuilder::new()
                    .layer(ThrottleLayer::new(rate_limit))
                    .service(Http::new(rpc_url));
                Some(service)
            })
            .collect::<Vec<_>>();
        let active =
            NonZeroUsize::new(transports.len()).ok_or(ProviderSetupError::NoTransports)?;
        let fallback = ServiceBuilder::new()
            .layer(FallbackLayer::default().with_active_transport_count(active))
            .service(transports);
        Ok(RpcClient::new(fallback, false))
    }

    pub fn from_config(config: &BankChainConfig) -> Result<Self, ProviderSetupError> {
        let client = Self::rpc_client(config.chain_id, &config.rpc)?;
        let root = RootProvider::new(client.clone());

        let signer = config
            .signer_key()
            .map(|key| local_signer(key, config.chain_id))
            .transpose()?;
        let signer_address = signer.as_ref().map(|s| s.address());
        let wallet = signer.map(|signer| {
            let filler = JoinFill::new(
                GasFiller,
                JoinFill::new(
                    BlobGasFiller::default(),
                    JoinFill::new(NonceFiller::default(), ChainIdFiller::default()),
                ),
            );
            let provider: WalletProvider = ProviderBuilder::default()
                .filler(filler)
                .wallet(EthereumWallet::from(signer))
                .connect_client(client);
            provider
        });

        #[cfg(feature = "telemetry")]
        tracing::info!(chain=%config.chain_id, signer=?signer_address, bank=%config.bank, "Using EVM provider");

        Ok(Self {
            deployment: config.deployment(),
            root,
            wallet,
            signer_address,
            confirmations: config.confirmations,
        })
    }

    pub fn deployment(&self) -> &BankDeployment {
        &self.deployment
    }

    /// Address transactions are sent from, if a key is configured.
    pub fn signer_address(&self) -> Option<Address> {
        self.signer_address
    }

    fn wallet_for(&self, from: Address) -> Result<&WalletProvider, CapabilityError> {
        let wallet = self
            .wallet
            .as_ref()
            .ok_or_else(|| CapabilityError::Unavailable("no signer key configured".into()))?;
        if self.signer_address != Some(from) {
            return Err(CapabilityError::Unavailable(format!(
                "no signer key for {from}"
            )));
        }
        Ok(wallet)
    }

    /// Receipt watcher for `tx_hash`. It is not time-bounded; the caller
    /// decides how long to wait and when to give up.
    fn pending_transaction(&self, tx_hash: TxHash) -> PendingTransactionBuilder<Ethereum> {
        PendingTransactionBuilder::new(self.root.clone(), tx_hash)
            .with_required_confirmations(self.confirmations)
            .with_timeout(None)
    }

    fn token(&self) -> IERC20Permit::IERC20PermitInstance<&RootProvider> {
        IERC20Permit::new(self.deployment.token_address(), &self.root)
    }

    fn bank(&self) -> ITokenBank::ITokenBankInstance<&RootProvider> {
        ITokenBank::new(self.deployment.bank, &self.root)
    }
}

#[async_trait]
impl ChainReader for BankChainProvider {
    async fn token_name(&self) -> Result<String, CapabilityError> {
        read("name", self.token().name().call()).await
    }

    async fn token_symbol(&self) -> Result<String, CapabilityError> {
        read("symbol", self.token().symbol().call()).await
    }

    async fn balance_of(&self, owner: Address) -> Result<U256, CapabilityError> {
        read("balanceOf", self.token().balanceOf(owner).call()).await
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, CapabilityError> {
        read("allowance", self.token().allowance(owner, spender).call()).await
    }

    async fn nonces(&self, owner: Address) -> Result<U256, CapabilityError> {
        read("nonces", self.token().nonces(owner).call()).await
    }

    async fn deposit_of(&self, owner: Address) -> Result<U256, CapabilityError> {
        read("getDeposit", self.bank().getDeposit(owner).call()).await
    }
}

#[async_trait]
impl TransactionSender for BankChainProvider {
    async fn send_transaction(
        &self,
        from: Address,
        call: BankCall,
    ) -> Result<TxHash, CapabilityError> {
        let wallet = self.wallet_for(from)?;
        let request = TransactionRequest::default()
            .with_to(call.target(&self.deployment))
            .with_from(from)
            .with_input(call.calldata());
        let send_fut = wallet.send_transaction(request);
        #[cfg(feature = "telemetry")]
        let pending = send_fut
            .instrument(tracing::info_span!(
                "send_transaction",
                call = call.name(),
                %from,
                otel.kind = "client"
            ))
            .await;
        #[cfg(not(feature = "telemetry"))]
        let pending = send_fut.await;
        let pending = pending.map_err(transport_error)?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<TxOutcome, CapabilityError> {
        let receipt_fut = self.pending_transaction(tx_hash).get_receipt();
        #[cfg(feature = "telemetry")]
        let receipt = receipt_fut
            .instrument(tracing::info_span!("get_receipt", %tx_hash, otel.kind = "client"))
            .await;
        #[cfg(not(feature = "telemetry"))]
        let receipt = receipt_fut.await;
        let receipt = receipt.map_err(pending_error)?;
        Ok(TxOutcome {
            tx_hash,
            success: receipt.status(),
            block_number: receipt.block_number(),
        })
    }
}

async fn read<T, F>(_call: &'static str, call: F) -> Result<T, CapabilityError>
where
    F: IntoFuture<Output = Result<T, alloy_contract::Error>>,
{
    let fut = call.into_future();
    #[cfg(feature = "telemetry")]
    let result = fut
        .instrument(tracing::info_span!("chain_read", call = _call, otel.kind = "client"))
        .await;
    #[cfg(not(feature = "telemetry"))]
    let result = fut.await;
    result.map_err(contract_error)
}

fn contract_error(error: alloy_contract::Error) -> CapabilityError {
    match error {
        alloy_contract::Error::TransportError(e) => transport_error(e),
        other => CapabilityError::Other(other.to_string()),
    }
}

fn pending_error(error: PendingTransactionError) -> CapabilityError {
    match error {
        PendingTransactionError::TransportError(e) => transport_error(e),
        other => CapabilityError::Transport(other.to_string()),
    }
}

/// JSON-RPC error responses keep their code so wallet rejections are recognised.
fn transport_error(error: TransportError) -> CapabilityError {
    match error.as_error_resp() {
        Some(payload) => CapabilityError::from_rpc_error(payload.code, payload.message.to_string()),
        None => CapabilityError::Transport(error.to_string()),
    }
}

fn local_signer(
    key: &EvmPrivateKey,
    chain: Eip155ChainReference,
) -> Result<PrivateKeySigner, LocalSignerError> {
    let signer = PrivateKeySigner::from_bytes(&B256::from(*key.as_bytes()))?;
    Ok(signer.with_chain_id(Some(chain.inner())))
}

/// Signs typed data with a local private key.
///
/// Built without a key it behaves like a disconnected wallet: no account, and
/// every signature request fails with [`CapabilityError::Unavailable`].
#[derive(Debug, Clone)]
pub struct LocalTypedDataSigner {
    signer: Option<PrivateKeySigner>,
}

impl LocalTypedDataSigner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self {
            signer: Some(signer),
        }
    }

    pub fn read_only() -> Self {
        Self { signer: None }
    }

    pub fn from_config(config: &BankChainConfig) -> Result<Self, ProviderSetupError> {
        let signer = config
            .signer_key()
            .map(|key| local_signer(key, config.chain_id))
            .transpose()?;
        Ok(Self { signer })
    }
}

#[async_trait]
impl TypedDataSigner for LocalTypedDataSigner {
    fn account(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<String, CapabilityError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| CapabilityError::Unavailable("no signer key configured".into()))?;
        let signature = signer
            .sign_dynamic_typed_data(typed_data)
            .await
            .map_err(|e| CapabilityError::Other(e.to_string()))?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permit::{Eip2612PermitParams, build_eip2612_permit};
    use crate::signature::{decompose, raw_signature_bytes};
    use alloy_primitives::Signature;
    use tokenbank_types::timestamp::UnixTimestamp;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn typed_data(owner: Address) -> TypedData {
        let deployment = BankDeployment::sepolia();
        build_eip2612_permit(&Eip2612PermitParams {
            owner: Some(owner),
            spender: deployment.bank,
            value: U256::from(1_000u64),
            nonce: U256::ZERO,
            deadline: UnixTimestamp::from_secs(1_700_000_000),
            token_name: "Bank Token".into(),
            token: deployment.token_address(),
            chain_id: deployment.chain.inner(),
        })
        .unwrap()
        .typed_data
    }

    #[tokio::test]
    async fn test_local_signer_output_decomposes_and_recovers() {
        let key: PrivateKeySigner = TEST_KEY.parse().unwrap();
        let owner = key.address();
        let signer = LocalTypedDataSigner::new(key);
        assert_eq!(signer.account(), Some(owner));

        let typed = typed_data(owner);
        let hex = signer.sign_typed_data(&typed).await.unwrap();
        assert_eq!(hex.len(), 132);
        let parts = decompose(&hex).unwrap();
        assert!(parts.v == 27 || parts.v == 28);

        let raw = raw_signature_bytes(&hex).unwrap();
        let signature = Signature::from_raw(&raw).unwrap();
        let hash = typed.eip712_signing_hash().unwrap();
        assert_eq!(
            signature.recover_address_from_prehash(&hash).unwrap(),
            owner
        );
    }

    #[tokio::test]
    async fn test_read_only_signer_is_unavailable() {
        let signer = LocalTypedDataSigner::read_only();
        assert_eq!(signer.account(), None);
        let error = signer
            .sign_typed_data(&typed_data(Address::with_last_byte(1)))
            .await
            .unwrap_err();
        assert!(matches!(error, CapabilityError::Unavailable(_)));
    }

    #[test]
    fn test_signer_from_config() {
        let config: BankChainConfig =
            serde_json::from_str(&format!(r#"{{"signer":"{TEST_KEY}"}}"#)).unwrap();
        let signer = LocalTypedDataSigner::from_config(&config).unwrap();
        let expected: PrivateKeySigner = TEST_KEY.parse().unwrap();
        assert_eq!(signer.account(), Some(expected.address()));

        let read_only = LocalTypedDataSigner::from_config(&BankChainConfig::default()).unwrap();
        assert_eq!(read_only.account(), None);
    }

    #[test]
    fn test_rpc_client_requires_http_endpoint() {
        let rpc = vec![RpcConfig {
            http: "ws://localhost:8546".parse().unwrap(),
            rate_limit: None,
        }];
        assert!(matches!(
            BankChainProvider::rpc_client(Eip155ChainReference::SEPOLIA, &rpc),
            Err(ProviderSetupError::NoTransports)
        ));
    }

    #[tokio::test]
    async fn test_read_only_provider_cannot_send() {
        let provider = BankChainProvider::from_config(&BankChainConfig::default()).unwrap();
        assert_eq!(provider.signer_address(), None);
        let error = provider
            .send_transaction(
                Address::with_last_byte(1),
                BankCall::Deposit {
                    amount: U256::from(1),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(error, CapabilityError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_receipt_watch_leaves_timeout_to_caller() {
        let config: BankChainConfig =
            serde_json::from_str(r#"{"confirmations": 2, "receipt_timeout_secs": 5}"#).unwrap();
        let provider = BankChainProvider::from_config(&config).unwrap();
        let pending = provider.pending_transaction(TxHash::with_last_byte(1));
        assert_eq!(pending.timeout(), None);
        assert_eq!(pending.required_confirmations(), 2);
    }
}
