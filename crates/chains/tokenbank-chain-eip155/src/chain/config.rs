use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tokenbank_types::config::{LiteralOrEnv, RpcConfig};
use url::Url;

use crate::chain::types::{
    BankDeployment, CANONICAL_PERMIT2_ADDRESS, ChecksummedAddress, Eip155ChainReference,
    TokenDeployment,
};

/// Chain-side configuration of the token bank client.
///
/// Every field has a default pointing at the Sepolia deployment, so an empty
/// JSON object is a valid (read-only) configuration. The signer key is optional:
/// without it balances can still be read but nothing can be signed or sent.
///
/// ```json
/// {
///   "chain_id": 11155111,
///   "token": { "address": "0xDE784e5EEbdA4cBCe967eA51CF8815f248C9A6C5", "decimals": 18 },
///   "bank": "0xd3AA7Bda2f03DA385Befb7ab8EaAECE4B3d6b8A3",
///   "rpc": [{ "http": "https://ethereum-sepolia-rpc.publicnode.com", "rate_limit": 10 }],
///   "signer": "$TOKENBANK_PRIVATE_KEY",
///   "receipt_timeout_secs": 120
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankChainConfig {
    #[serde(default = "config_defaults::default_chain_id")]
    pub chain_id: Eip155ChainReference,
    #[serde(default = "config_defaults::default_token")]
    pub token: TokenDeployment,
    #[serde(default = "config_defaults::default_bank")]
    pub bank: ChecksummedAddress,
    #[serde(default = "config_defaults::default_permit2")]
    pub permit2: ChecksummedAddress,
    /// RPC endpoints, tried in order of health by the fallback transport.
    #[serde(default = "config_defaults::default_rpc")]
    pub rpc: Vec<RpcConfig>,
    /// Private key of the depositing account, literal or `$ENV` reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<LiteralOrEnv<EvmPrivateKey>>,
    /// Upper bound on a single confirmation wait before reporting "still pending".
    #[serde(default = "config_defaults::default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    /// Blocks to wait on top of inclusion.
    #[serde(default = "config_defaults::default_confirmations")]
    pub confirmations: u64,
    /// Validity window of permit signatures.
    #[serde(default = "config_defaults::default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for BankChainConfig {
    fn default() -> Self {
        Self {
            chain_id: config_defaults::default_chain_id(),
            token: config_defaults::default_token(),
            bank: config_defaults::default_bank(),
            permit2: config_defaults::default_permit2(),
            rpc: config_defaults::default_rpc(),
            signer: None,
            receipt_timeout_secs: config_defaults::default_receipt_timeout_secs(),
            confirmations: config_defaults::default_confirmations(),
            deadline_secs: config_defaults::default_deadline_secs(),
        }
    }
}

impl BankChainConfig {
    pub fn deployment(&self) -> BankDeployment {
        BankDeployment {
            chain: self.chain_id,
            token: self.token,
            bank: self.bank.into(),
            permit2: self.permit2.into(),
        }
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn signer_key(&self) -> Option<&EvmPrivateKey> {
        self.signer.as_ref().map(|s| s.inner())
    }
}

mod config_defaults {
    use super::*;

    pub const DEFAULT_RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";

    pub fn default_chain_id() -> Eip155ChainReference {
        BankDeployment::sepolia().chain
    }

    pub fn default_token() -> TokenDeployment {
        BankDeployment::sepolia().token
    }

    pub fn default_bank() -> ChecksummedAddress {
        BankDeployment::sepolia().bank.into()
    }

    pub fn default_permit2() -> ChecksummedAddress {
        ChecksummedAddress(CANONICAL_PERMIT2_ADDRESS)
    }

    pub fn default_rpc() -> Vec<RpcConfig> {
        match Url::parse(DEFAULT_RPC_URL) {
            Ok(http) => vec![RpcConfig {
                http,
                rate_limit: None,
            }],
            Err(_) => Vec::new(),
        }
    }

    pub fn default_receipt_timeout_secs() -> u64 {
        120
    }

    pub fn default_confirmations() -> u64 {
        1
    }

    pub fn default_deadline_secs() -> u64 {
        3600
    }
}

/// A validated EVM private key (32 bytes).
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvmPrivateKey(B256);

impl EvmPrivateKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for EvmPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EvmPrivateKey(..)")
    }
}

impl FromStr for EvmPrivateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s.trim())
            .map(Self)
            .map_err(|e| format!("Invalid evm private key: {e}"))
    }
}

impl From<EvmPrivateKey> for B256 {
    fn from(value: EvmPrivateKey) -> Self {
        value.0
    }
}
