//! Money type with decimal precision and currency.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! This type wraps `rust_decimal::Decimal` for arbitrary precision.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Integer digits allowed in any single recorded amount.
pub const MAX_INTEGER_DIGITS: u32 = 12;

/// Returns true if `amount` has more than [`MAX_INTEGER_DIGITS`] integer digits.
#[must_use]
pub fn exceeds_integer_digits(amount: Decimal) -> bool {
    amount.abs().trunc() >= Decimal::from(10_i64.pow(MAX_INTEGER_DIGITS))
}

/// Represents a monetary amount with currency.
///
/// Uses `Decimal` internally to avoid floating-point precision errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount in major units, rounded to the currency's minor units.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: Currency,
}

/// ISO 4217 currency codes supported by the system.
///
/// Settlements are denominated in a single currency; any other code is
/// rejected at the validation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Guatemalan Quetzal
    #[default]
    Gtq,
}

impl Currency {
    /// Number of decimal places used for amounts in this currency.
    #[must_use]
    pub const fn minor_units(self) -> u32 {
        match self {
            Self::Gtq => 2,
        }
    }

    /// Returns the ISO 4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Gtq => "GTQ",
        }
    }
}

impl Money {
    /// Creates a new Money instance.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates a zero amount in the specified currency.
    #[must_use]
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative()
    }

    /// Returns true if the amount carries more decimals than the currency allows.
    #[must_use]
    pub fn exceeds_minor_units(&self) -> bool {
        self.amount.normalize().scale() > self.currency.minor_units()
    }

    /// Returns true if the amount is above the largest recordable amount.
    #[must_use]
    pub fn exceeds_maximum(&self) -> bool {
        exceeds_integer_digits(self.amount)
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {:.prec$}",
            self.currency,
            self.amount,
            prec = self.currency.minor_units() as usize
        )
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GTQ" => Ok(Self::Gtq),
            _ => Err(format!("Unsupported currency: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn test_money_new() {
        let money = Money::new(dec!(500.00), Currency::Gtq);
        assert_eq!(money.amount, dec!(500.00));
        assert_eq!(money.currency, Currency::Gtq);
    }

    #[test]
    fn test_money_zero() {
        let money = Money::zero(Currency::Gtq);
        assert!(money.is_zero());
        assert!(!money.is_negative());
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::new(dec!(500), Currency::Gtq).to_string(), "GTQ 500.00");
        assert_eq!(
            Money::new(dec!(12.5), Currency::Gtq).to_string(),
            "GTQ 12.50"
        );
    }

    #[test]
    fn test_exceeds_minor_units() {
        assert!(!Money::new(dec!(10.50), Currency::Gtq).exceeds_minor_units());
        assert!(!Money::new(dec!(10.500), Currency::Gtq).exceeds_minor_units());
        assert!(Money::new(dec!(10.505), Currency::Gtq).exceeds_minor_units());
    }

    #[rstest]
    #[case(dec!(999999999999.99), false)]
    #[case(dec!(-999999999999.99), false)]
    #[case(dec!(1000000000000), true)]
    #[case(Decimal::MAX, true)]
    fn test_exceeds_maximum(#[case] amount: Decimal, #[case] expected: bool) {
        assert_eq!(Money::new(amount, Currency::Gtq).exceeds_maximum(), expected);
        assert_eq!(exceeds_integer_digits(amount), expected);
    }

    #[rstest]
    #[case("GTQ")]
    #[case("gtq")]
    #[case(" Gtq ")]
    fn test_currency_from_str_accepts(#[case] input: &str) {
        assert_eq!(Currency::from_str(input).unwrap(), Currency::Gtq);
    }

    #[rstest]
    #[case("USD")]
    #[case("Q")]
    #[case("")]
    fn test_currency_from_str_rejects(#[case] input: &str) {
        assert!(Currency::from_str(input).is_err());
    }
}
