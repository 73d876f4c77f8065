//! Money and currency value objects.
//!
//! Internal amounts are decimal major units (`49.90`). Providers speak
//! integer minor units (`4990`). The conversion lives here and nowhere else.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Currencies without a minor unit (ISO 4217 exponent 0).
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "ISK", "JPY", "KMF", "KRW", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

/// ISO 4217 currency code, always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Parses a three-letter currency code, case-insensitively.
    pub fn new(code: impl AsRef<str>) -> Result<Self, ValidationError> {
        let code = code.as_ref().trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::invalid_format(
                "currency",
                format!("expected a three-letter ISO 4217 code, got '{}'", code),
            ));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Swiss franc, the merchant home currency.
    pub fn chf() -> Self {
        Self("CHF".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of decimal places of the minor unit.
    pub fn minor_unit_exponent(&self) -> u32 {
        if ZERO_DECIMAL_CURRENCIES.contains(&self.0.as_str()) {
            0
        } else {
            2
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::chf()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

/// A strictly positive amount in a currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Creates a money value in major units.
    ///
    /// Rejects non-positive amounts and amounts with more decimal places
    /// than the currency's minor unit. Nothing is rounded.
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, ValidationError> {
        if amount <= Decimal::ZERO {
            return Err(ValidationError::not_positive("amount", amount));
        }
        let exponent = currency.minor_unit_exponent();
        if amount.normalize().scale() > exponent {
            return Err(ValidationError::invalid_format(
                "amount",
                format!(
                    "{} has more than {} decimal places for {}",
                    amount, exponent, currency
                ),
            ));
        }
        Ok(Self { amount, currency })
    }

    /// Converts a provider-reported minor-unit amount into major units.
    ///
    /// Zero is accepted here: providers report zero totals for fully
    /// discounted checkouts.
    pub fn from_minor_units(minor: i64, currency: Currency) -> Result<Self, ValidationError> {
        if minor < 0 {
            return Err(ValidationError::not_positive("amount", minor));
        }
        let amount = Decimal::new(minor, currency.minor_unit_exponent());
        Ok(Self { amount, currency })
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// Converts to integer minor units for a provider request.
    pub fn to_minor_units(&self) -> Result<i64, ValidationError> {
        let factor = Decimal::from(10_i64.pow(self.currency.minor_unit_exponent()));
        let scaled = self.amount * factor;
        if !scaled.fract().is_zero() {
            return Err(ValidationError::invalid_format(
                "amount",
                format!("{} is not representable in minor units", self.amount),
            ));
        }
        scaled.trunc().to_i64().ok_or_else(|| {
            ValidationError::invalid_format("amount", format!("{} is out of range", self.amount))
        })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.prec$} {}",
            self.amount,
            self.currency,
            prec = self.currency.minor_unit_exponent() as usize
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn currency_normalizes_case() {
        assert_eq!(Currency::new("chf").unwrap().as_str(), "CHF");
    }

    #[test]
    fn currency_rejects_bad_codes() {
        assert!(Currency::new("CH").is_err());
        assert!(Currency::new("CH1").is_err());
        assert!(Currency::new("EURO").is_err());
    }

    #[test]
    fn currency_defaults_to_chf() {
        assert_eq!(Currency::default(), Currency::chf());
    }

    #[test]
    fn chf_amount_converts_to_cents() {
        let money = Money::new(dec("49.90"), Currency::chf()).unwrap();
        assert_eq!(money.to_minor_units().unwrap(), 4990);
    }

    #[test]
    fn cents_convert_back_to_major_units() {
        let money = Money::from_minor_units(4990, Currency::chf()).unwrap();
        assert_eq!(money.amount(), dec("49.90"));
    }

    #[test]
    fn zero_decimal_currency_uses_exponent_zero() {
        let yen = Currency::new("JPY").unwrap();
        assert_eq!(yen.minor_unit_exponent(), 0);
        let money = Money::new(dec("5000"), yen.clone()).unwrap();
        assert_eq!(money.to_minor_units().unwrap(), 5000);
        assert_eq!(Money::from_minor_units(5000, yen).unwrap().amount(), dec("5000"));
    }

    #[test]
    fn excess_precision_is_rejected_not_rounded() {
        assert!(Money::new(dec("49.999"), Currency::chf()).is_err());
        assert!(Money::new(dec("10.5"), Currency::new("JPY").unwrap()).is_err());
    }

    #[test]
    fn trailing_zeros_do_not_count_as_precision() {
        let money = Money::new(dec("49.9000"), Currency::chf()).unwrap();
        assert_eq!(money.to_minor_units().unwrap(), 4990);
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert!(Money::new(Decimal::ZERO, Currency::chf()).is_err());
        assert!(Money::new(dec("-1.00"), Currency::chf()).is_err());
    }

    #[test]
    fn display_uses_currency_precision() {
        let money = Money::new(dec("49.9"), Currency::chf()).unwrap();
        assert_eq!(money.to_string(), "49.90 CHF");
    }
}
