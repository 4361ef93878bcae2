//! EVM-side value types: addresses, chain ids, and the deployed contracts the
//! client talks to.

use alloy_primitives::{Address, U256, address, hex};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use tokenbank_types::util::money_amount::{MoneyAmount, MoneyAmountParseError};

/// An Ethereum address that serializes with EIP-55 checksum encoding.
///
/// ```
/// use tokenbank_chain_eip155::chain::ChecksummedAddress;
///
/// let addr: ChecksummedAddress = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045".parse().unwrap();
/// assert_eq!(addr.to_string(), "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ChecksummedAddress(pub Address);

impl FromStr for ChecksummedAddress {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Address::from_str(s)?;
        Ok(Self(address))
    }
}

impl Display for ChecksummedAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_checksum(None))
    }
}

impl Serialize for ChecksummedAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_checksum(None))
    }
}

impl<'de> Deserialize<'de> for ChecksummedAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl From<ChecksummedAddress> for Address {
    fn from(value: ChecksummedAddress) -> Self {
        value.0
    }
}

impl From<Address> for ChecksummedAddress {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

/// A numeric EIP-155 chain id, e.g. `11155111` for Sepolia.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Eip155ChainReference(u64);

impl Eip155ChainReference {
    pub const SEPOLIA: Eip155ChainReference = Eip155ChainReference(11_155_111);

    pub const fn new(chain_id: u64) -> Self {
        Self(chain_id)
    }

    /// Returns the numeric chain ID.
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl Display for Eip155ChainReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "eip155:{}", self.0)
    }
}

/// The canonical Permit2 deployment, identical on every chain it is deployed to.
pub const CANONICAL_PERMIT2_ADDRESS: Address =
    address!("0x000000000022D473030F116dDEE9F6B43aC78BA3");

/// An ERC-20 token as deployed on the configured chain.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TokenDeployment {
    pub address: ChecksummedAddress,
    /// Fractional digits of the token, 18 for most ERC-20s.
    #[serde(default = "token_deployment::default_decimals")]
    pub decimals: u8,
}

mod token_deployment {
    pub fn default_decimals() -> u8 {
        18
    }
}

impl TokenDeployment {
    /// Parses a user-entered decimal amount into the token's smallest unit.
    ///
    /// # Errors
    ///
    /// Everything [`MoneyAmount::parse`] rejects, plus
    /// [`MoneyAmountParseError::WrongPrecision`] when the input has more
    /// fractional digits than the token.
    /// [`MoneyAmountParseError::TooLarge`] when the result does not fit in a
    /// `U256`.
    ///
    /// ```
    /// use alloy_primitives::{U256, address};
    /// use tokenbank_chain_eip155::chain::TokenDeployment;
    ///
    /// let token = TokenDeployment {
    ///     address: address!("0x0000000000000000000000000000000000000001").into(),
    ///     decimals: 6,
    /// };
    /// assert_eq!(token.parse("1.5").unwrap(), U256::from(1_500_000u64));
    /// ```
    pub fn parse(&self, input: &str) -> Result<U256, MoneyAmountParseError> {
        let money_amount = MoneyAmount::parse(input)?;
        let scale = money_amount.scale();
        let token_scale = self.decimals as u32;
        if scale > token_scale {
            return Err(MoneyAmountParseError::WrongPrecision {
                money: scale,
                token: token_scale,
            });
        }
        let digits = U256::from_str_radix(money_amount.digits(), 10)
            .map_err(|_| MoneyAmountParseError::TooLarge)?;
        U256::from(10)
            .checked_pow(U256::from(token_scale - scale))
            .and_then(|multiplier| digits.checked_mul(multiplier))
            .ok_or(MoneyAmountParseError::TooLarge)
    }
}

/// Everything the client needs to know about the on-chain side of the bank.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct BankDeployment {
    pub chain: Eip155ChainReference,
    pub token: TokenDeployment,
    /// The custodial bank contract; spender for the classic and EIP-2612 paths.
    pub bank: Address,
    /// The Permit2 contract; spender of the one-time bootstrap approval.
    pub permit2: Address,
}

impl BankDeployment {
    /// The Sepolia deployment the token bank was first released against.
    pub fn sepolia() -> Self {
        Self {
            chain: Eip155ChainReference::SEPOLIA,
            token: TokenDeployment {
                address: address!("0xDE784e5EEbdA4cBCe967eA51CF8815f248C9A6C5").into(),
                decimals: 18,
            },
            bank: address!("0xd3AA7Bda2f03DA385Befb7ab8EaAECE4B3d6b8A3"),
            permit2: CANONICAL_PERMIT2_ADDRESS,
        }
    }

    pub fn token_address(&self) -> Address {
        self.token.address.0
    }
}
