use std::fmt;

use bigdecimal::BigDecimal;
use num_traits::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "NGN";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    #[error("amount {0} is not a finite number")]
    NotFinite(String),
}

/// An amount in a single ISO currency, stored with two decimal places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: BigDecimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: BigDecimal, currency: impl Into<String>) -> Self {
        Self {
            amount: amount.round(2),
            currency: currency.into(),
        }
    }

    pub fn from_f64(amount: f64, currency: impl Into<String>) -> Result<Self, MoneyError> {
        let amount = decimal_from_f64(amount)?;
        Ok(Self::new(amount, currency))
    }

    fn same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        Ok(Money::new(self.amount.clone() + other.amount.clone(), self.currency.clone()))
    }

    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        Ok(Money::new(self.amount.clone() - other.amount.clone(), self.currency.clone()))
    }

    /// Amount in the smallest currency unit (kobo for NGN), as payment gateways expect.
    pub fn to_minor_units(&self) -> i64 {
        (self.amount.clone() * BigDecimal::from(100_i64))
            .round(0)
            .to_i64()
            .unwrap_or(0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.currency, self.amount.with_scale(2))
    }
}

pub fn decimal_from_f64(value: f64) -> Result<BigDecimal, MoneyError> {
    if !value.is_finite() {
        return Err(MoneyError::NotFinite(value.to_string()));
    }
    BigDecimal::from_f64(value)
        .map(|d| d.round(2))
        .ok_or_else(|| MoneyError::NotFinite(value.to_string()))
}

pub fn decimal_to_f64(value: &BigDecimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Round half away from zero to `precision` decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10_f64.powi(precision as i32);
    (value * scale).round() / scale
}

pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ngn(s: &str) -> Money {
        Money::new(BigDecimal::from_str(s).unwrap(), "NGN")
    }

    #[test]
    fn minor_units_are_kobo() {
        assert_eq!(ngn("12.34").to_minor_units(), 1234);
        assert_eq!(ngn("5000").to_minor_units(), 500_000);
    }

    #[test]
    fn arithmetic_rejects_mixed_currencies() {
        let usd = Money::new(BigDecimal::from(10_i64), "USD");
        let err = ngn("10").checked_add(&usd).unwrap_err();
        assert_eq!(
            err,
            MoneyError::CurrencyMismatch {
                left: "NGN".into(),
                right: "USD".into()
            }
        );
        assert!(ngn("10").checked_sub(&usd).is_err());
    }

    #[test]
    fn arithmetic_in_one_currency() {
        let total = ngn("100.50").checked_add(&ngn("0.25")).unwrap();
        assert_eq!(total, ngn("100.75"));
        let rest = total.checked_sub(&ngn("0.75")).unwrap();
        assert_eq!(rest, ngn("100"));
    }

    #[test]
    fn from_f64_keeps_two_decimals() {
        let m = Money::from_f64(1234.5678, "NGN").unwrap();
        assert_eq!(m, ngn("1234.57"));
        assert!(Money::from_f64(f64::NAN, "NGN").is_err());
    }

    #[test]
    fn round2_matches_expected_values() {
        assert_eq!(round2(0.123), 0.12);
        assert_eq!(round2(2.0 / 3.0), 0.67);
    }
}
