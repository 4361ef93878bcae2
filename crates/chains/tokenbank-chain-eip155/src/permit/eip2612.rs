use alloy_dyn_abi::eip712::TypedData;
use alloy_primitives::{Address, U256};
use alloy_sol_types::{Eip712Domain, eip712_domain};
use tokenbank_types::timestamp::UnixTimestamp;

use crate::chain::contracts::Permit;
use crate::permit::PayloadError;

/// `version` of every EIP-2612 token domain the bank supports.
pub const EIP2612_DOMAIN_VERSION: &str = "1";

/// Inputs of an EIP-2612 `Permit` for the bank.
#[derive(Debug, Clone)]
pub struct Eip2612PermitParams {
    /// The connected account; `None` when no wallet is connected.
    pub owner: Option<Address>,
    /// Always the bank contract.
    pub spender: Address,
    pub value: U256,
    /// Token nonce of `owner`, read right before building.
    pub nonce: U256,
    pub deadline: UnixTimestamp,
    /// Result of the token's `name()`, part of its domain.
    pub token_name: String,
    pub token: Address,
    pub chain_id: u64,
}

/// An unsigned EIP-2612 permit together with its `eth_signTypedData_v4` form.
#[derive(Debug, Clone)]
pub struct Eip2612PermitRequest {
    pub permit: Permit,
    pub domain: Eip712Domain,
    pub typed_data: TypedData,
}

impl Eip2612PermitRequest {
    pub fn deadline(&self) -> UnixTimestamp {
        UnixTimestamp::from_secs(self.permit.deadline.saturating_to::<u64>())
    }
}

/// Builds the typed data for an EIP-2612 `Permit`.
///
/// Identical parameters always produce identical typed data.
///
/// # Errors
///
/// [`PayloadError::NoAccount`] if `params.owner` is `None`.
pub fn build_eip2612_permit(
    params: &Eip2612PermitParams,
) -> Result<Eip2612PermitRequest, PayloadError> {
    let owner = params.owner.ok_or(PayloadError::NoAccount)?;
    let domain = eip712_domain! {
        name: params.token_name.clone(),
        version: EIP2612_DOMAIN_VERSION,
        chain_id: params.chain_id,
        verifying_contract: params.token,
    };
    let permit = Permit {
        owner,
        spender: params.spender,
        value: params.value,
        nonce: params.nonce,
        deadline: U256::from(params.deadline.as_secs()),
    };
    let typed_data = TypedData::from_struct(&permit, Some(domain.clone()));
    Ok(Eip2612PermitRequest {
        permit,
        domain,
        typed_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_signer::Signer;
    use alloy_signer_local::PrivateKeySigner;
    use alloy_sol_types::SolStruct;

    use crate::chain::BankDeployment;
    use crate::signature::decompose;

    const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn params(owner: Option<Address>) -> Eip2612PermitParams {
        let deployment = BankDeployment::sepolia();
        Eip2612PermitParams {
            owner,
            spender: deployment.bank,
            value: U256::from(100),
            nonce: U256::from(3),
            deadline: UnixTimestamp::from_secs(1_700_003_600),
            token_name: "Bank Token".to_string(),
            token: deployment.token_address(),
            chain_id: deployment.chain.inner(),
        }
    }

    #[test]
    fn test_requires_account() {
        let result = build_eip2612_permit(&params(None));
        assert_eq!(result.unwrap_err(), PayloadError::NoAccount);
    }

    #[test]
    fn test_deterministic() {
        let owner = Some(Address::with_last_byte(7));
        let a = build_eip2612_permit(&params(owner)).unwrap();
        let b = build_eip2612_permit(&params(owner)).unwrap();
        assert_eq!(
            serde_json::to_value(&a.typed_data).unwrap(),
            serde_json::to_value(&b.typed_data).unwrap()
        );
        assert_eq!(
            a.typed_data.eip712_signing_hash().unwrap(),
            b.typed_data.eip712_signing_hash().unwrap()
        );
    }

    #[test]
    fn test_domain_and_message() {
        let owner = Address::with_last_byte(7);
        let request = build_eip2612_permit(&params(Some(owner))).unwrap();
        let domain = &request.typed_data.domain;
        assert_eq!(domain.name.as_deref(), Some("Bank Token"));
        assert_eq!(domain.version.as_deref(), Some("1"));
        assert_eq!(domain.chain_id, Some(U256::from(11_155_111u64)));
        assert_eq!(
            domain.verifying_contract,
            Some(BankDeployment::sepolia().token_address())
        );
        assert_eq!(request.typed_data.primary_type, "Permit");
        assert_eq!(request.permit.owner, owner);
        assert_eq!(request.permit.nonce, U256::from(3));
        assert_eq!(request.deadline(), UnixTimestamp::from_secs(1_700_003_600));
    }

    #[test]
    fn test_dynamic_hash_matches_static() {
        let request = build_eip2612_permit(&params(Some(Address::with_last_byte(7)))).unwrap();
        let static_hash = request.permit.eip712_signing_hash(&request.domain);
        assert_eq!(request.typed_data.eip712_signing_hash().unwrap(), static_hash);
    }

    #[tokio::test]
    async fn test_signature_recovers_owner() {
        let signer: PrivateKeySigner = TEST_KEY.parse().unwrap();
        let request = build_eip2612_permit(&params(Some(signer.address()))).unwrap();
        let signature = signer
            .sign_dynamic_typed_data(&request.typed_data)
            .await
            .unwrap();
        let hash = request.typed_data.eip712_signing_hash().unwrap();
        assert_eq!(
            signature.recover_address_from_prehash(&hash).unwrap(),
            signer.address()
        );

        let hex = format!("0x{}", alloy_primitives::hex::encode(signature.as_bytes()));
        let parts = decompose(&hex).unwrap();
        assert!(parts.v == 27 || parts.v == 28);
        assert_eq!(parts.r, alloy_primitives::B256::from(signature.r().to_be_bytes::<32>()));
        assert_eq!(parts.s, alloy_primitives::B256::from(signature.s().to_be_bytes::<32>()));
    }
}
