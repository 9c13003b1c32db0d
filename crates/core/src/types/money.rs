//! Money helpers: currency codes and conversion to payment-processor units.
//!
//! Order totals and prices are stored as decimals in the currency's standard
//! unit (pounds, not pence). The payment processor expects integer amounts in
//! the smallest unit, so every charge and refund goes through
//! [`to_minor_units`].

use core::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Currencies the processor treats as having no minor unit.
const ZERO_DECIMAL: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("currency code must be three ASCII letters, got '{0}'")]
    InvalidCode(String),
    #[error("amount {0} cannot be represented in minor units")]
    OutOfRange(Decimal),
    #[error("amount {0} must not be negative")]
    Negative(Decimal),
}

/// Lower-case ISO 4217 currency code, e.g. `gbp`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parse a currency code, normalizing to lower case.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyError::InvalidCode` unless the input is exactly three
    /// ASCII letters.
    pub fn parse(s: &str) -> Result<Self, CurrencyError> {
        let s = s.trim();
        if s.len() != 3 || !s.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CurrencyError::InvalidCode(s.to_owned()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Pound sterling, the store's default settlement currency.
    #[must_use]
    pub fn gbp() -> Self {
        Self("gbp".to_owned())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of decimal places in the currency's minor unit.
    #[must_use]
    pub fn exponent(&self) -> u32 {
        if ZERO_DECIMAL.contains(&self.0.as_str()) {
            0
        } else {
            2
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// Convert a non-negative decimal amount to the currency's minor unit,
/// rounding half away from zero (`12.345 GBP` becomes `1235`).
///
/// # Errors
///
/// Returns `CurrencyError::Negative` for negative amounts and
/// `CurrencyError::OutOfRange` if the result does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal, currency: &CurrencyCode) -> Result<i64, CurrencyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(CurrencyError::Negative(amount));
    }
    let scale = Decimal::from(10_i64.pow(currency.exponent()));
    amount
        .checked_mul(scale)
        .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|rounded| rounded.to_i64())
        .ok_or(CurrencyError::OutOfRange(amount))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_normalizes_case() {
        assert_eq!(CurrencyCode::parse("GBP").unwrap(), CurrencyCode::gbp());
        assert!(CurrencyCode::parse("gb").is_err());
        assert!(CurrencyCode::parse("g8p").is_err());
    }

    #[test]
    fn test_to_minor_units_two_decimals() {
        let gbp = CurrencyCode::gbp();
        assert_eq!(to_minor_units(dec("19.99"), &gbp).unwrap(), 1999);
        assert_eq!(to_minor_units(dec("12.345"), &gbp).unwrap(), 1235);
        assert_eq!(to_minor_units(dec("0.004"), &gbp).unwrap(), 0);
        assert_eq!(to_minor_units(dec("40"), &gbp).unwrap(), 4000);
    }

    #[test]
    fn test_to_minor_units_zero_decimal_currency() {
        let jpy = CurrencyCode::parse("jpy").unwrap();
        assert_eq!(jpy.exponent(), 0);
        assert_eq!(to_minor_units(dec("1500.5"), &jpy).unwrap(), 1501);
    }

    #[test]
    fn test_to_minor_units_rejects_negative() {
        let gbp = CurrencyCode::gbp();
        assert!(matches!(
            to_minor_units(dec("-1.00"), &gbp),
            Err(CurrencyError::Negative(_))
        ));
    }
}
