//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A cart total is Σ price × qty. Summed in floats, two kiosks can print │
//! │  different totals for the same basket.                                  │
//! │                                                                         │
//! │  OUR SOLUTION: integer minor units                                      │
//! │    The catalog publishes integer prices; we never leave integers.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use scanpay_core::money::Money;
//!
//! let price = Money::from_minor(1099);
//! let line = price.multiply_quantity(3);
//! assert_eq!(line.minor(), 3297);
//! assert_eq!(line.format("$", 2), "$32.97");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest unit the catalog prices in.
///
/// The wire format is a bare integer, so `{"price": 100}` deserializes
/// straight into `Money(100)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use scanpay_core::money::Money;
    ///
    /// let price = Money::from_minor(250);
    /// assert_eq!(price.minor(), 250);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Scan "A1" twice (price 100)
    ///      │
    ///      ▼
    /// multiply_quantity(2) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Line Total: 200
    /// ```
    ///
    /// Saturates at the `i64` bounds instead of wrapping.
    #[inline]
    pub const fn multiply_quantity(&self, qty: u32) -> Self {
        Money(self.0.saturating_mul(qty as i64))
    }

    /// Formats the value for display with a currency symbol.
    ///
    /// `decimals` is how many minor digits make up one major unit: `2`
    /// renders `1099` as `10.99`, `0` renders it as `1099`.
    ///
    /// ```rust
    /// use scanpay_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(250).format("₹", 0), "₹250");
    /// assert_eq!(Money::from_minor(-550).format("$", 2), "-$5.50");
    /// ```
    pub fn format(&self, symbol: &str, decimals: u32) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();

        if decimals == 0 {
            return format!("{}{}{}", sign, symbol, abs);
        }

        let scale = 10u64.pow(decimals);
        format!(
            "{}{}{}.{:0width$}",
            sign,
            symbol,
            abs / scale,
            abs % scale,
            width = decimals as usize
        )
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly rendering: the raw minor-unit count.
///
/// Use [`Money::format`] for anything a shopper sees.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
