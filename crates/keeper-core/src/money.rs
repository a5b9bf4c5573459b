//! # Money Module
//!
//! Provides the `Money` type used for an asset's purchase cost.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Purchase cost arrives as free text from forms and imports:             │
//! │                                                                         │
//! │    "1,299.99"   "$ 45"   "0.5"   ""                                     │
//! │                                                                         │
//! │  It is parsed ONCE into integer cents and never touches a float:        │
//! │                                                                         │
//! │    "1,299.99" ──► Money(129999)                                         │
//! │    "$ 45"     ──► Money(4500)                                           │
//! │    "0.5"      ──► Money(50)                                             │
//! │    ""         ──► None (no cost recorded)                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use keeper_core::money::Money;
//!
//! let cost = Money::parse("1,299.99").unwrap().unwrap();
//! assert_eq!(cost.cents(), 129_999);
//! assert_eq!(cost.to_string(), "1299.99");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use ts_rs::TS;

use crate::error::ValidationError;

/// Symbols stripped from the front of a cost string before parsing.
const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Stored in the `purchase_cost_cents` column as a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use keeper_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1099).cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Parses a user-supplied cost string into cents.
    ///
    /// ## Rules
    /// - Blank input means "no cost" and yields `Ok(None)`
    /// - A leading currency symbol and surrounding whitespace are ignored
    /// - Commas are thousands separators and are dropped
    /// - At most two fractional digits; `"0.5"` is fifty cents
    /// - A leading `-` is accepted (credits); validation rejects it later
    ///
    /// ```rust
    /// use keeper_core::money::Money;
    ///
    /// assert_eq!(Money::parse("$ 45").unwrap(), Some(Money::from_cents(4500)));
    /// assert_eq!(Money::parse("   ").unwrap(), None);
    /// assert!(Money::parse("12.345").is_err());
    /// assert!(Money::parse("abc").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Option<Money>, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let cleaned: String = rest
            .trim_start_matches(CURRENCY_SYMBOLS)
            .trim()
            .chars()
            .filter(|c| *c != ',')
            .collect();

        let invalid = || ValidationError::InvalidFormat {
            field: "purchase_cost".to_string(),
            reason: format!("'{}' is not a valid amount", raw.trim()),
        };

        let (major_str, minor_str) = match cleaned.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (cleaned.as_str(), ""),
        };

        if major_str.is_empty() && minor_str.is_empty() {
            return Err(invalid());
        }
        if !major_str.chars().all(|c| c.is_ascii_digit())
            || !minor_str.chars().all(|c| c.is_ascii_digit())
            || minor_str.len() > 2
        {
            return Err(invalid());
        }

        let major: i64 = if major_str.is_empty() {
            0
        } else {
            major_str.parse().map_err(|_| invalid())?
        };
        let minor: i64 = match minor_str.len() {
            0 => 0,
            1 => minor_str.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => minor_str.parse().map_err(|_| invalid())?,
        };

        let cents = major
            .checked_mul(100)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(invalid)?;

        Ok(Some(Money(if negative { -cents } else { cents })))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering, no currency symbol.
///
/// The currency is a site setting owned by the presentation layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_decimal() {
        assert_eq!(Money::parse("45").unwrap(), Some(Money::from_cents(4500)));
        assert_eq!(Money::parse("45.1").unwrap(), Some(Money::from_cents(4510)));
        assert_eq!(Money::parse("45.01").unwrap(), Some(Money::from_cents(4501)));
        assert_eq!(Money::parse(".75").unwrap(), Some(Money::from_cents(75)));
    }

    #[test]
    fn test_parse_strips_symbols_and_separators() {
        assert_eq!(
            Money::parse(" $1,299.99 ").unwrap(),
            Some(Money::from_cents(129_999))
        );
        assert_eq!(Money::parse("€ 10").unwrap(), Some(Money::from_cents(1000)));
        assert_eq!(Money::parse("-5.50").unwrap(), Some(Money::from_cents(-550)));
    }

    #[test]
    fn test_parse_blank_is_none() {
        assert_eq!(Money::parse("").unwrap(), None);
        assert_eq!(Money::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Money::parse("ten").is_err());
        assert!(Money::parse("1.2.3").is_err());
        assert!(Money::parse("1.999").is_err());
        assert!(Money::parse("$").is_err());
        assert!(Money::parse("99999999999999999999").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(129_999).to_string(), "1299.99");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_add() {
        let total = Money::from_cents(1000) + Money::from_cents(250);
        assert_eq!(total.cents(), 1250);
        assert!(!total.is_negative());
    }
}
