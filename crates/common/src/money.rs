//! Money value type.
//!
//! Amounts are carried as integer cents. Order rows persist the price as a
//! plain decimal string (`"24.04"`) so nothing downstream ever touches a
//! float, which is why the decimal round-trip lives here next to the type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing a decimal money string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid money amount: {input}")]
pub struct MoneyParseError {
    /// The rejected input.
    pub input: String,
}

/// Money amount represented in cents to avoid floating point drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a whole dollar value.
    pub fn from_dollars(dollars: i64) -> Self {
        Self {
            cents: dollars * 100,
        }
    }

    /// Rounds a fractional dollar amount to the nearest cent.
    ///
    /// This is the only place fee arithmetic is allowed to leave floats.
    pub fn round_dollars(dollars: f64) -> Self {
        Self {
            cents: (dollars * 100.0).round() as i64,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the amount as fractional dollars.
    pub fn as_dollars(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Renders the amount as a bare decimal string (`"24.04"`), the format
    /// stored in the order row and sent to payment services.
    pub fn to_decimal_string(&self) -> String {
        if self.cents < 0 {
            format!("-{}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            format!("{}.{:02}", self.dollars(), self.cents_part())
        }
    }

    /// Parses a bare decimal string (`"24.04"`, `"30"`, `"-1.50"`).
    pub fn parse_decimal(input: &str) -> Result<Self, MoneyParseError> {
        let err = || MoneyParseError {
            input: input.to_string(),
        };

        let trimmed = input.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(err());
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
            || frac.len() > 2
        {
            return Err(err());
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err())?
        };
        let frac_cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| err())? * 10,
            _ => frac.parse().map_err(|_| err())?,
        };

        let cents = whole * 100 + frac_cents;
        Ok(Self {
            cents: if negative { -cents } else { cents },
        })
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents - rhs.cents,
        }
    }
}

impl std::str::FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_decimal(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1234);
        assert_eq!(money.cents(), 1234);
        assert_eq!(money.dollars(), 12);
        assert_eq!(money.cents_part(), 34);
    }

    #[test]
    fn test_round_dollars() {
        assert_eq!(Money::round_dollars(24.0448).cents(), 2404);
        assert_eq!(Money::round_dollars(24.045).cents(), 2405);
        assert_eq!(Money::round_dollars(0.005).cents(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "$12.34");
        assert_eq!(Money::from_cents(100).to_string(), "$1.00");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn test_decimal_string_roundtrip() {
        for cents in [0, 5, 100, 1234, 2404, 199_999] {
            let money = Money::from_cents(cents);
            let text = money.to_decimal_string();
            assert_eq!(Money::parse_decimal(&text).unwrap(), money);
        }
        assert_eq!(Money::from_cents(-150).to_decimal_string(), "-1.50");
    }

    #[test]
    fn test_parse_decimal_forms() {
        assert_eq!(Money::parse_decimal("30").unwrap().cents(), 3000);
        assert_eq!(Money::parse_decimal("24.04").unwrap().cents(), 2404);
        assert_eq!(Money::parse_decimal("1.5").unwrap().cents(), 150);
        assert_eq!(Money::parse_decimal(" 2.00 ").unwrap().cents(), 200);
        assert_eq!(Money::parse_decimal("-1.50").unwrap().cents(), -150);
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        for bad in ["", "-", "1.234", "12a", "$5", "1..2"] {
            assert!(Money::parse_decimal(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);
        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
    }

    #[test]
    fn test_comparison() {
        assert!(Money::from_cents(100).is_positive());
        assert!(Money::from_cents(0).is_zero());
        assert!(Money::from_cents(100) > Money::from_cents(50));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let money = Money::from_cents(2404);
        let json = serde_json::to_string(&money).unwrap();
        let deserialized: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(money, deserialized);
    }
}
