//! Fixed-point money value object.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::OrderError;

/// Largest representable amount: 99999999.99, i.e. ten significant
/// digits with two decimal places (NUMERIC(10, 2) in the store).
const MAX_CENTS: i64 = 9_999_999_999;

/// Money amount represented in cents to avoid floating point issues.
///
/// Amounts are non-negative and carry exactly two decimal places.
/// On the wire a `Money` value is a decimal string (`"19.98"`) so no
/// layer ever routes it through a float; numeric JSON input is still
/// accepted for compatibility and normalized to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money {
    /// Amount in cents (e.g. 1998 = 19.98).
    cents: i64,
}

impl Money {
    /// Creates a Money amount from cents.
    ///
    /// Fails when the amount is negative or exceeds ten significant
    /// digits.
    pub fn from_cents(cents: i64) -> Result<Self, OrderError> {
        if cents < 0 {
            return Err(OrderError::Validation(
                "total price must not be negative".to_string(),
            ));
        }
        if cents > MAX_CENTS {
            return Err(OrderError::Validation(
                "total price exceeds 10 significant digits".to_string(),
            ));
        }
        Ok(Self { cents })
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Parses a decimal string such as `"19.98"`, `"5"` or `"0.50"`.
    ///
    /// At most two decimal places are accepted; fewer are padded
    /// (`"19.9"` reads as 19.90).
    pub fn parse(s: &str) -> Result<Self, OrderError> {
        let s = s.trim();
        let invalid = || OrderError::Validation(format!("invalid price: {s:?}"));

        if s.starts_with('-') {
            return Err(OrderError::Validation(
                "total price must not be negative".to_string(),
            ));
        }
        let (whole, frac) = match s.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (s, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if whole.trim_start_matches('0').len() > 8 {
            return Err(OrderError::Validation(
                "total price exceeds 10 significant digits".to_string(),
            ));
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let frac_cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };

        Self::from_cents(whole * 100 + frac_cents)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct MoneyVisitor;

impl Visitor<'_> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("a decimal string with at most two decimal places")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        let cents = i64::try_from(v)
            .ok()
            .and_then(|v| v.checked_mul(100))
            .ok_or_else(|| E::custom("price out of range"))?;
        Money::from_cents(cents).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        let cents = v
            .checked_mul(100)
            .ok_or_else(|| E::custom("price out of range"))?;
        Money::from_cents(cents).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        if !v.is_finite() {
            return Err(E::custom("price must be finite"));
        }
        // Two-decimal inputs such as 19.98 survive the round trip
        // exactly; anything that changes carries more precision than a
        // price allows and is rejected, same as the string path.
        let formatted = format!("{v:.2}");
        if formatted.parse::<f64>() != Ok(v) {
            return Err(E::custom(format!(
                "invalid price: {v} has more than two decimal places"
            )));
        }
        Money::parse(&formatted).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_two_decimal_string() {
        let money = Money::parse("19.98").unwrap();
        assert_eq!(money.cents(), 1998);
        assert_eq!(money.to_string(), "19.98");
    }

    #[test]
    fn parse_pads_short_fractions() {
        assert_eq!(Money::parse("5").unwrap().cents(), 500);
        assert_eq!(Money::parse("5.9").unwrap().cents(), 590);
        assert_eq!(Money::parse("0.05").unwrap().cents(), 5);
    }

    #[test]
    fn parse_rejects_negative_amounts() {
        assert!(Money::parse("-1.00").is_err());
        assert!(Money::from_cents(-1).is_err());
    }

    #[test]
    fn parse_rejects_malformed_input() {
        for s in ["", ".", "1.2.3", "1,00", "abc", "1.999", "1e3"] {
            assert!(Money::parse(s).is_err(), "accepted {s:?}");
        }
    }

    #[test]
    fn parse_enforces_ten_significant_digits() {
        assert_eq!(Money::parse("99999999.99").unwrap().cents(), MAX_CENTS);
        assert!(Money::parse("100000000.00").is_err());
        assert!(Money::from_cents(MAX_CENTS + 1).is_err());
    }

    #[test]
    fn display_pads_cents() {
        assert_eq!(Money::from_cents(5).unwrap().to_string(), "0.05");
        assert_eq!(Money::from_cents(100).unwrap().to_string(), "1.00");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn serializes_as_decimal_string() {
        let money = Money::parse("19.98").unwrap();
        assert_eq!(serde_json::to_string(&money).unwrap(), "\"19.98\"");
    }

    #[test]
    fn deserializes_from_string_without_precision_loss() {
        let money: Money = serde_json::from_str("\"19.98\"").unwrap();
        assert_eq!(money.cents(), 1998);
    }

    #[test]
    fn leading_zeros_do_not_count_as_significant_digits() {
        assert_eq!(Money::parse("000000001.00").unwrap().cents(), 100);
        assert_eq!(Money::parse("099999999.99").unwrap().cents(), MAX_CENTS);
        assert!(Money::parse("0100000000.00").is_err());
    }

    #[test]
    fn deserializes_from_json_number() {
        let money: Money = serde_json::from_str("19.98").unwrap();
        assert_eq!(money.cents(), 1998);
        let money: Money = serde_json::from_str("20").unwrap();
        assert_eq!(money.cents(), 2000);
    }

    #[test]
    fn numeric_input_with_excess_precision_is_rejected_not_rounded() {
        // The string path already rejects these; the number path must
        // not quietly round them into a different amount.
        assert!(serde_json::from_str::<Money>("\"19.999\"").is_err());
        assert!(serde_json::from_str::<Money>("19.999").is_err());
        assert!(serde_json::from_str::<Money>("0.001").is_err());
    }

    #[test]
    fn json_roundtrip_is_lossless() {
        let money = Money::parse("19.98").unwrap();
        let json = serde_json::to_string(&money).unwrap();
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(money, back);
    }
}
