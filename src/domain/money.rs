//! Minor-unit rounding and validated amounts.
//!
//! Every amount in the ledger is a `rust_decimal::Decimal`; floating point
//! never touches money. Arithmetic on values from outside the ledger is
//! checked, so overflow surfaces as [`AmountError::Overflow`].

use crate::error::AmountError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Decimal places of the currencies the ledger handles (LKR, USD, EUR).
pub const MINOR_UNITS: u32 = 2;

/// Rounds half-up (away from zero on a tie) to the minor unit and fixes the
/// scale, so `95` and `95.0` both come out as `95.00`.
pub fn round_minor(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(MINOR_UNITS, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MINOR_UNITS);
    rounded
}

/// Sums amounts without intermediate rounding.
pub fn checked_sum<'a, I>(amounts: I) -> Result<Decimal, AmountError>
where
    I: IntoIterator<Item = &'a Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, a| checked_add(acc, *a))
}

pub fn checked_add(lhs: Decimal, rhs: Decimal) -> Result<Decimal, AmountError> {
    lhs.checked_add(rhs).ok_or(AmountError::Overflow)
}

pub fn checked_sub(lhs: Decimal, rhs: Decimal) -> Result<Decimal, AmountError> {
    lhs.checked_sub(rhs).ok_or(AmountError::Overflow)
}

pub fn checked_mul(lhs: Decimal, rhs: Decimal) -> Result<Decimal, AmountError> {
    lhs.checked_mul(rhs).ok_or(AmountError::Overflow)
}

pub fn checked_div(lhs: Decimal, rhs: Decimal) -> Result<Decimal, AmountError> {
    lhs.checked_div(rhs).ok_or(AmountError::Overflow)
}

/// A non-negative amount expressible in the currency's minor unit.
///
/// `60.00` and `60.000` are both accepted; `59.996` is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value < Decimal::ZERO {
            return Err(AmountError::Negative(value));
        }
        if value.normalize().scale() > MINOR_UNITS {
            return Err(AmountError::SubMinorUnit(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, AmountError> {
        checked_add(self.0, rhs.0).map(Self)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}
