//! Balance snapshots of an account against the token and the bank.

use alloy_primitives::utils::format_units;
use alloy_primitives::{Address, U256};
use std::fmt::{Display, Formatter};

use crate::capability::{CapabilityError, ChainReader};

/// Wallet balance, bank deposit and token symbol of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceSheet {
    pub token_balance: U256,
    pub symbol: String,
    pub deposited: U256,
}

impl BalanceSheet {
    /// Human-readable view with amounts scaled by `decimals`.
    pub fn display(&self, decimals: u8) -> BalanceSheetDisplay<'_> {
        BalanceSheetDisplay {
            sheet: self,
            decimals,
        }
    }
}

pub struct BalanceSheetDisplay<'a> {
    sheet: &'a BalanceSheet,
    decimals: u8,
}

impl Display for BalanceSheetDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let balance = format_amount(self.sheet.token_balance, self.decimals);
        let deposited = format_amount(self.sheet.deposited, self.decimals);
        let symbol = &self.sheet.symbol;
        write!(f, "wallet: {balance} {symbol}, deposited: {deposited} {symbol}")
    }
}

/// Formats a raw token amount with trailing fractional zeros removed.
pub fn format_amount(amount: U256, decimals: u8) -> String {
    match format_units(amount, decimals) {
        Ok(formatted) if formatted.contains('.') => formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string(),
        Ok(formatted) => formatted,
        Err(_) => amount.to_string(),
    }
}

/// Reads token balance, symbol and bank deposit of `owner` concurrently.
///
/// The three reads are independent; the first failure aborts the snapshot.
pub async fn refresh_balances<R: ChainReader + ?Sized>(
    reader: &R,
    owner: Address,
) -> Result<BalanceSheet, CapabilityError> {
    let (token_balance, symbol, deposited) = tokio::try_join!(
        reader.balance_of(owner),
        reader.token_symbol(),
        reader.deposit_of(owner),
    )?;
    Ok(BalanceSheet {
        token_balance,
        symbol,
        deposited,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::mocks::MockChain;

    #[test]
    fn test_format_amount() {
        let one_and_half = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(format_amount(one_and_half, 18), "1.5");
        assert_eq!(format_amount(U256::ZERO, 18), "0");
        assert_eq!(format_amount(U256::from(100), 0), "100");
        assert_eq!(format_amount(U256::from(1), 18), "0.000000000000000001");
    }

    #[test]
    fn test_display() {
        let sheet = BalanceSheet {
            token_balance: U256::from(2_000_000_000_000_000_000u128),
            symbol: "TBK".into(),
            deposited: U256::from(250_000_000_000_000_000u128),
        };
        assert_eq!(
            sheet.display(18).to_string(),
            "wallet: 2 TBK, deposited: 0.25 TBK"
        );
    }

    #[tokio::test]
    async fn test_refresh_balances() {
        let chain = MockChain::new();
        let owner = MockChain::owner();
        chain.set_balance(owner, U256::from(1_000));
        chain.set_deposit(owner, U256::from(50));
        let sheet = refresh_balances(&chain, owner).await.unwrap();
        assert_eq!(sheet.token_balance, U256::from(1_000));
        assert_eq!(sheet.deposited, U256::from(50));
        assert_eq!(sheet.symbol, "TBK");
    }

    #[tokio::test]
    async fn test_refresh_balances_fails_on_any_read() {
        let chain = MockChain::new();
        chain.fail_reads_with(CapabilityError::Transport("connection refused".into()));
        let result = refresh_balances(&chain, MockChain::owner()).await;
        assert_eq!(
            result.unwrap_err(),
            CapabilityError::Transport("connection refused".into())
        );
    }
}
