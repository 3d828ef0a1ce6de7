//! Fixed-point monetary amounts backed by decimal arithmetic.
//!
//! All money in Till flows through [`Money`] so that totals are reproducible
//! bit-for-bit: no binary floating point, and a single rounding rule
//! (half away from zero, two fractional digits) applied wherever a derived
//! amount is produced.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing a monetary amount from a string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    /// The string is not a valid decimal number.
    #[error("invalid money amount: {0}")]
    Invalid(String),
}

/// A monetary amount in the currency's standard unit (e.g. dollars).
///
/// Wraps [`Decimal`] and serializes as a string to preserve precision on
/// the wire. Arithmetic is exact; use [`Money::round2`] (or the deriving
/// helpers [`Money::percent_of`]) at the points where a displayable amount
/// is produced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a money value from a raw decimal.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a money value from whole currency units.
    #[must_use]
    pub fn from_major(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// Create a money value from minor units (e.g. cents).
    #[must_use]
    pub fn from_minor(minor: i64) -> Self {
        Self(Decimal::new(minor, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiply by a unit count (line quantity).
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Compute `rate` percent of this amount, rounded to a money amount.
    ///
    /// `rate` is expressed in percent (10 means 10%).
    #[must_use]
    pub fn percent_of(self, rate: Decimal) -> Self {
        Self(self.0 * rate / Decimal::ONE_HUNDRED).round2()
    }

    /// Round to two fractional digits, half away from zero.
    #[must_use]
    pub fn round2(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }
}

impl std::ops::Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s).map_err(|_| MoneyError::Invalid(s.to_owned()))?;
        Ok(Self(amount))
    }
}
