use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

use crate::{Currency, EngineError, ResultEngine};

/// A signed amount of minor units tagged with its currency.
///
/// Only used for rendering; arithmetic happens on the raw `i64`.
///
/// ```rust
/// use engine::{Currency, Money};
///
/// assert_eq!(Money::new(1234, Currency::Eur).to_string(), "12.34 EUR");
/// assert_eq!(Money::new(-5, Currency::Usd).to_string(), "-0.05 USD");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Money {
    pub minor: i64,
    pub currency: Currency,
}

impl Money {
    #[must_use]
    pub const fn new(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minor < 0 { "-" } else { "" };
        let abs = self.minor.unsigned_abs();
        let digits = u32::from(self.currency.minor_units());
        if digits == 0 {
            return write!(f, "{sign}{abs} {}", self.currency);
        }
        let scale = 10u64.pow(digits);
        let major = abs / scale;
        let minor = abs % scale;
        write!(
            f,
            "{sign}{major}.{minor:0width$} {}",
            self.currency,
            width = digits as usize
        )
    }
}

/// Converts `amount_minor` at `rate`, rounding half away from zero.
///
/// Rates must be strictly positive.
pub fn convert_minor(amount_minor: i64, rate: Decimal) -> ResultEngine<i64> {
    if rate <= Decimal::ZERO {
        return Err(EngineError::InvalidInput("rate must be > 0".to_string()));
    }
    let converted = Decimal::from(amount_minor)
        .checked_mul(rate)
        .ok_or_else(|| EngineError::InvalidInput("converted amount too large".to_string()))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    converted
        .to_i64()
        .ok_or_else(|| EngineError::InvalidInput("converted amount too large".to_string()))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn display_pads_minor_digits() {
        assert_eq!(Money::new(0, Currency::Eur).to_string(), "0.00 EUR");
        assert_eq!(Money::new(10, Currency::Eur).to_string(), "0.10 EUR");
        assert_eq!(Money::new(-1050, Currency::Gbp).to_string(), "-10.50 GBP");
        assert_eq!(Money::new(1200, Currency::Jpy).to_string(), "1200 JPY");
    }

    #[test]
    fn convert_rounds_half_away_from_zero() {
        let rate = Decimal::from_str("0.5").unwrap();
        assert_eq!(convert_minor(3, rate).unwrap(), 2);
        assert_eq!(convert_minor(-3, rate).unwrap(), -2);
        let rate = Decimal::from_str("92.5").unwrap();
        assert_eq!(convert_minor(10_000, rate).unwrap(), 925_000);
    }

    #[test]
    fn convert_rejects_non_positive_rate() {
        assert!(convert_minor(100, Decimal::ZERO).is_err());
        assert!(convert_minor(100, Decimal::from(-1)).is_err());
    }
}
