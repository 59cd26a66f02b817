//! Admin Inventory Adjuster.
//!
//! Operator-facing stock changes outside the order flow. Everything goes
//! through the stock ledger inside one store transaction, so an adjustment and
//! an in-flight placement on the same product serialise on the product row.

use tracing::instrument;

use storefront_core::ProductId;
use storefront_inventory::{ExpectedStock, StockOverride};

use crate::error::{EngineError, EngineResult};
use crate::stock_ledger::{adjust_within, set_within, StockSnapshot};
use crate::store::{settle, Store};

#[derive(Debug, Clone)]
pub struct InventoryAdjuster<S> {
    store: S,
}

impl<S> InventoryAdjuster<S>
where
    S: Store,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Add received units. `added` must be positive.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn restock(&self, product_id: ProductId, added: i64) -> EngineResult<StockSnapshot> {
        if added <= 0 {
            return Err(EngineError::Validation(
                "restock quantity must be positive".to_string(),
            ));
        }
        let mut tx = self.store.begin().await?;
        let result = adjust_within(tx.as_mut(), product_id, added, ExpectedStock::Any).await;
        settle(tx, result).await
    }

    /// Manual reconciliation to an absolute count; availability is derived.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn correct_stock(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> EngineResult<StockSnapshot> {
        self.set_stock_with_override(product_id, quantity, None).await
    }

    /// Absolute set with an optional availability override.
    ///
    /// `Some(flag)` stores `flag` as-is even when it disagrees with the
    /// quantity; the next delta re-derives it.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn set_stock_with_override(
        &self,
        product_id: ProductId,
        quantity: i64,
        in_stock: Option<bool>,
    ) -> EngineResult<StockSnapshot> {
        let mut tx = self.store.begin().await?;
        let result = set_within(
            tx.as_mut(),
            product_id,
            quantity,
            StockOverride::from(in_stock),
        )
        .await;
        settle(tx, result).await
    }
}
