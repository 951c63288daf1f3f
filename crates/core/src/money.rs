//! Money in minor currency units.
//!
//! Amounts are Ghanaian cedis stored as pesewas (GH₵ 1 = 100 pesewas) so order
//! totals are exact sums of `quantity * unit price`.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Non-negative amount in pesewas.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(pesewas: u64) -> Self {
        Self(pesewas)
    }

    /// Whole cedis plus pesewas, e.g. `Money::new(20, 0)` is GH₵ 20.00.
    pub fn new(cedis: u64, pesewas: u64) -> DomainResult<Self> {
        if pesewas >= 100 {
            return Err(DomainError::validation("pesewas must be below 100"));
        }
        cedis
            .checked_mul(100)
            .and_then(|v| v.checked_add(pesewas))
            .map(Self)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    pub const fn minor_units(self) -> u64 {
        self.0
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    /// Multiply a unit price by a (positive) quantity.
    pub fn checked_times(self, quantity: i64) -> DomainResult<Money> {
        let qty = u64::try_from(quantity)
            .map_err(|_| DomainError::validation("quantity must not be negative"))?;
        self.0
            .checked_mul(qty)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "GH₵{}.{:02}", self.0 / 100, self.0 % 100)
    }
}
