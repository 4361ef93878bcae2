//! Decimal amount parsing for user-entered quantities.
//!
//! Users type amounts such as `"1.5"` or `"1,000"`. [`MoneyAmount`] keeps that
//! text as an exact digit string and scale (never a float, never rounded) which
//! the chain layer then scales to the token's smallest unit.
//!
//! ```rust
//! use tokenbank_types::util::money_amount::MoneyAmount;
//!
//! let amount = MoneyAmount::parse("10.50").unwrap();
//! assert_eq!(amount.scale(), 2);
//! assert_eq!(amount.digits(), "1050");
//! ```

use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

/// A strictly positive decimal amount with its original precision preserved.
///
/// `"10.50"` has scale 2 and digits `1050`. Keeping the scale lets the caller
/// reject inputs more precise than the token supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneyAmount {
    /// Integer and fractional digits without the point, leading zeros removed.
    digits: String,
    scale: u32,
}

impl MoneyAmount {
    /// Number of fractional digits in the input.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// The digits without the decimal point, e.g. `"12.34"` gives `"1234"`.
    ///
    /// Never empty and never starts with `0`.
    pub fn digits(&self) -> &str {
        &self.digits
    }
}

/// Errors that can occur when parsing a monetary amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyAmountParseError {
    #[error("Amount is empty")]
    Empty,
    #[error("Invalid number format")]
    InvalidFormat,
    #[error("Amount must be greater than zero")]
    NotPositive,
    /// The input has more fractional digits than the token supports.
    #[error("Too big of a precision: {money} vs {token} on token")]
    WrongPrecision {
        /// Decimal places in the input.
        money: u32,
        /// Decimal places supported by the token.
        token: u32,
    },
    /// The amount in the token's smallest unit does not fit in 256 bits.
    #[error("Amount is too large")]
    TooLarge,
}

impl MoneyAmount {
    /// Parses a decimal string.
    ///
    /// Surrounding whitespace and `,`/`_` digit separators are ignored. Anything
    /// else that is not part of a plain decimal number is an error: signs other
    /// than a leading `-`, exponents and trailing garbage are all rejected.
    ///
    /// # Errors
    ///
    /// - [`MoneyAmountParseError::Empty`] for blank input
    /// - [`MoneyAmountParseError::InvalidFormat`] if the text is not a decimal number
    /// - [`MoneyAmountParseError::NotPositive`] for zero or negative values
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        let cleaned: String = input
            .trim()
            .chars()
            .filter(|c| *c != ',' && *c != '_')
            .collect();
        if cleaned.is_empty() {
            return Err(MoneyAmountParseError::Empty);
        }
        let (negative, unsigned) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.as_str()),
        };
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let is_plain = !(whole.is_empty() && fraction.is_empty())
            && whole.chars().all(|c| c.is_ascii_digit())
            && fraction.chars().all(|c| c.is_ascii_digit());
        if !is_plain {
            return Err(MoneyAmountParseError::InvalidFormat);
        }

        let digits = format!("{whole}{fraction}")
            .trim_start_matches('0')
            .to_string();
        if negative || digits.is_empty() {
            return Err(MoneyAmountParseError::NotPositive);
        }
        let scale =
            u32::try_from(fraction.len()).map_err(|_| MoneyAmountParseError::InvalidFormat)?;

        Ok(MoneyAmount { digits, scale })
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s)
    }
}

impl TryFrom<&str> for MoneyAmount {
    type Error = MoneyAmountParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        MoneyAmount::from_str(value)
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = self.scale as usize;
        if scale == 0 {
            return f.write_str(&self.digits);
        }
        let padded = format!("{:0>width$}", self.digits, width = scale + 1);
        let (whole, fraction) = padded.split_at(padded.len() - scale);
        let fraction = fraction.trim_end_matches('0');
        if fraction.is_empty() {
            f.write_str(whole)
        } else {
            write!(f, "{whole}.{fraction}")
        }
    }
}
