use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult};

/// Optimistic expectation about the stored quantity at write time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExpectedStock {
    /// Skip the check (order placement holds a row lock instead).
    #[default]
    Any,
    /// Require the stored quantity to be exactly this value.
    Exact(i64),
}

impl ExpectedStock {
    pub fn matches(self, actual: i64) -> bool {
        match self {
            ExpectedStock::Any => true,
            ExpectedStock::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: i64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "stock changed concurrently (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

impl From<Option<i64>> for ExpectedStock {
    fn from(value: Option<i64>) -> Self {
        value.map(ExpectedStock::Exact).unwrap_or_default()
    }
}

/// How an absolute set decides the availability flag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StockOverride {
    /// `in_stock = quantity > 0`.
    #[default]
    Derived,
    /// Caller-forced availability. Kept for admin compatibility; can persist
    /// `in_stock = true` with zero quantity.
    Force(bool),
}

impl From<Option<bool>> for StockOverride {
    fn from(value: Option<bool>) -> Self {
        value.map(StockOverride::Force).unwrap_or_default()
    }
}

/// Stock snapshot for one product: quantity on hand plus availability flag.
///
/// Fields are private; every value is produced by one of the transitions below,
/// so `quantity >= 0` always holds and `in_stock` is derived unless an admin
/// override was applied explicitly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    quantity: i64,
    in_stock: bool,
}

impl StockLevel {
    /// Initial stock for a new product.
    pub fn new(quantity: i64) -> DomainResult<Self> {
        ensure_non_negative(quantity)?;
        Ok(Self {
            quantity,
            in_stock: quantity > 0,
        })
    }

    /// Rebuild a level read back from storage.
    ///
    /// The flag is taken as stored (it may carry an earlier override); only the
    /// zero floor is re-checked.
    pub fn from_stored(quantity: i64, in_stock: bool) -> DomainResult<Self> {
        if quantity < 0 {
            return Err(DomainError::invariant(format!(
                "stored stock quantity is negative ({quantity})"
            )));
        }
        Ok(Self { quantity, in_stock })
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn in_stock(&self) -> bool {
        self.in_stock
    }

    /// `false` when an override left the flag disagreeing with the quantity.
    pub fn is_consistent(&self) -> bool {
        self.in_stock == (self.quantity > 0)
    }

    pub fn can_fulfil(&self, requested: i64) -> bool {
        requested <= self.quantity
    }

    /// Apply a signed delta.
    ///
    /// Checks the optimistic expectation first, then the zero floor. The flag
    /// is always re-derived, which also clears any earlier override.
    pub fn apply_delta(&self, delta: i64, expected: ExpectedStock) -> DomainResult<Self> {
        expected.check(self.quantity)?;

        let next = self
            .quantity
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation("stock delta overflows quantity"))?;

        if next < 0 {
            return Err(DomainError::InsufficientStock {
                requested: delta.saturating_neg(),
                available: self.quantity,
            });
        }

        Ok(Self {
            quantity: next,
            in_stock: next > 0,
        })
    }

    /// Administrative absolute set.
    pub fn set_absolute(quantity: i64, availability: StockOverride) -> DomainResult<Self> {
        ensure_non_negative(quantity)?;
        let in_stock = match availability {
            StockOverride::Derived => quantity > 0,
            StockOverride::Force(flag) => flag,
        };
        Ok(Self { quantity, in_stock })
    }
}

fn ensure_non_negative(quantity: i64) -> DomainResult<()> {
    if quantity < 0 {
        return Err(DomainError::validation("stock quantity cannot be negative"));
    }
    Ok(())
}
