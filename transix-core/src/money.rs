use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Fixed fractional scale for all monetary values (currency cents).
pub const MONEY_SCALE: u32 = 2;

/// Canonical exact-decimal monetary amount.
///
/// Every amount entering the system (user input, persisted rows, upstream
/// values) goes through one of the constructors below exactly once; from then
/// on the rest of the system can treat the value uniformly. Amounts are
/// non-negative and carry exactly two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn zero() -> Self {
        Money(rescaled(Decimal::ZERO))
    }

    /// Wrap an already-exact decimal, normalizing its scale.
    pub fn from_decimal(value: Decimal) -> CoreResult<Self> {
        if value.is_sign_negative() {
            return Err(CoreError::AmountInvalid(value.to_string()));
        }
        Ok(Money(rescaled(value)))
    }

    /// Parse a textual amount. Surrounding whitespace and stray single or
    /// double quotes (an artifact of values round-tripped through loosely
    /// typed stores) are stripped before parsing. Unparsable input is an
    /// error, never a silent zero.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let cleaned = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        let value = Decimal::from_str(cleaned)
            .map_err(|_| CoreError::AmountNormalization(raw.to_string()))?;
        Self::from_decimal(value)
    }

    /// Normalize a binary float by routing it through its display form, the
    /// same way a string amount would arrive. Non-finite values fail to parse.
    pub fn from_f64(value: f64) -> CoreResult<Self> {
        Self::parse(&value.to_string())
    }

    pub fn from_i64(value: i64) -> CoreResult<Self> {
        Self::from_decimal(Decimal::from(value))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn checked_mul(&self, count: u32) -> CoreResult<Self> {
        let product = self
            .0
            .checked_mul(Decimal::from(count))
            .ok_or_else(|| CoreError::AmountInvalid(format!("{} * {}", self.0, count)))?;
        Self::from_decimal(product)
    }

    pub fn checked_add(&self, other: Money) -> CoreResult<Self> {
        let sum = self
            .0
            .checked_add(other.0)
            .ok_or_else(|| CoreError::AmountInvalid(format!("{} + {}", self.0, other.0)))?;
        Self::from_decimal(sum)
    }
}

fn rescaled(mut value: Decimal) -> Decimal {
    value.rescale(MONEY_SCALE);
    value
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(rescaled(self.0 + rhs.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
