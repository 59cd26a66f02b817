use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, ProductId};

/// One requested line: product + positive quantity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Validated, non-empty cart. Line order is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new(lines: Vec<CartLine>) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation("cart cannot be empty"));
        }
        for (idx, line) in lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "quantity must be positive (line {idx})"
                )));
            }
        }
        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Total requested quantity per product, keyed in ascending id order.
    ///
    /// Repeated products are summed so the stock check sees the full demand.
    /// The ordering doubles as the row-lock order.
    pub fn demand_by_product(&self) -> DomainResult<BTreeMap<ProductId, i64>> {
        let mut demand: BTreeMap<ProductId, i64> = BTreeMap::new();
        for line in &self.lines {
            let entry = demand.entry(line.product_id).or_insert(0);
            *entry = entry
                .checked_add(line.quantity)
                .ok_or_else(|| DomainError::validation("cart quantity overflow"))?;
        }
        Ok(demand)
    }
}
