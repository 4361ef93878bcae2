use alloy_dyn_abi::eip712::TypedData;
use alloy_primitives::{Address, U256};
use alloy_sol_types::{Eip712Domain, eip712_domain};
use rand::Rng;
use tokenbank_types::timestamp::UnixTimestamp;

use crate::chain::contracts::{ITokenBank, PermitTransferFrom, TokenPermissions};
use crate::permit::PayloadError;

/// Domain name of the Permit2 contract. Its domain has no `version`.
pub const PERMIT2_DOMAIN_NAME: &str = "Permit2";

/// Exclusive upper bound of randomly drawn Permit2 nonces.
pub const PERMIT2_NONCE_UPPER_BOUND: u64 = 1_000_000_000;

/// Supplies nonces for Permit2 signature transfers.
///
/// Permit2 keeps a per-owner bitmap of used nonces, so a reused nonce makes the
/// deposit revert on-chain rather than double-spend. Nothing is tracked locally.
pub trait Permit2NonceSource: Send + Sync {
    fn next_nonce(&self) -> U256;
}

/// Draws nonces uniformly from `[0, 10^9)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPermit2Nonce;

impl Permit2NonceSource for RandomPermit2Nonce {
    fn next_nonce(&self) -> U256 {
        U256::from(rand::rng().random_range(0..PERMIT2_NONCE_UPPER_BOUND))
    }
}

/// Inputs of a Permit2 `PermitTransferFrom` for the bank.
#[derive(Debug, Clone)]
pub struct Permit2PermitParams {
    /// The connected account; `None` when no wallet is connected.
    pub owner: Option<Address>,
    pub token: Address,
    pub amount: U256,
    /// Always the bank contract.
    pub spender: Address,
    pub nonce: U256,
    pub deadline: UnixTimestamp,
    pub chain_id: u64,
    pub permit2: Address,
}

/// An unsigned Permit2 transfer together with its `eth_signTypedData_v4` form.
#[derive(Debug, Clone)]
pub struct Permit2PermitRequest {
    pub owner: Address,
    pub permit: PermitTransferFrom,
    pub domain: Eip712Domain,
    pub typed_data: TypedData,
}

impl Permit2PermitRequest {
    pub fn deadline(&self) -> UnixTimestamp {
        UnixTimestamp::from_secs(self.permit.deadline.saturating_to::<u64>())
    }

    /// The permit as `depositWithPermit2` takes it: the signed message minus the spender.
    pub fn bank_permit(&self) -> ITokenBank::PermitTransferFrom {
        ITokenBank::PermitTransferFrom {
            permitted: ITokenBank::TokenPermissions {
                token: self.permit.permitted.token,
                amount: self.permit.permitted.amount,
            },
            nonce: self.permit.nonce,
            deadline: self.permit.deadline,
        }
    }
}

/// Builds the typed data for a Permit2 `PermitTransferFrom`.
///
/// # Errors
///
/// [`PayloadError::NoAccount`] if `params.owner` is `None`.
pub fn build_permit2_permit(
    params: &Permit2PermitParams,
) -> Result<Permit2PermitRequest, PayloadError> {
    let owner = params.owner.ok_or(PayloadError::NoAccount)?;
    let domain = eip712_domain! {
        name: PERMIT2_DOMAIN_NAME,
        chain_id: params.chain_id,
        verifying_contract: params.permit2,
    };
    let permit = PermitTransferFrom {
        permitted: TokenPermissions {
            token: params.token,
            amount: params.amount,
        },
        spender: params.spender,
        nonce: params.nonce,
        deadline: U256::from(params.deadline.as_secs()),
    };
    let typed_data = TypedData::from_struct(&permit, Some(domain.clone()));
    Ok(Permit2PermitRequest {
        owner,
        permit,
        domain,
        typed_data,
    })
}
