//! Stock Ledger service.
//!
//! The only code path that writes `stock_quantity` / `in_stock`. Other services
//! that need to change stock inside their own transaction call
//! [`adjust_within`] / [`set_within`] rather than `StoreTransaction::write_stock`.

use serde::Serialize;
use tracing::instrument;

use storefront_core::{DomainError, ProductId};
use storefront_inventory::{ExpectedStock, StockLevel, StockOverride};

use crate::error::{EngineError, EngineResult, StockShortfall};
use crate::store::{settle, Store, StoreTransaction};

/// Read-only view of one product's stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    pub product_id: ProductId,
    pub quantity: i64,
    pub in_stock: bool,
}

impl StockSnapshot {
    fn of(product_id: ProductId, level: StockLevel) -> Self {
        Self {
            product_id,
            quantity: level.quantity(),
            in_stock: level.in_stock(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StockLedger<S> {
    store: S,
}

impl<S> StockLedger<S>
where
    S: Store,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn get_stock(&self, product_id: ProductId) -> EngineResult<StockSnapshot> {
        let mut tx = self.store.begin().await?;
        let result = match tx.find_product(product_id).await {
            Ok(Some(product)) => Ok(StockSnapshot::of(product_id, product.stock())),
            Ok(None) => Err(EngineError::product_not_found(product_id)),
            Err(e) => Err(e.into()),
        };
        settle(tx, result).await
    }

    /// Apply a signed delta in its own transaction.
    ///
    /// With `expected = Exact(n)` the write only happens if the stored quantity
    /// is still `n` once the row is locked; otherwise `Conflict`.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn adjust_stock(
        &self,
        product_id: ProductId,
        delta: i64,
        expected: ExpectedStock,
    ) -> EngineResult<StockSnapshot> {
        let mut tx = self.store.begin().await?;
        let result = adjust_within(tx.as_mut(), product_id, delta, expected).await;
        settle(tx, result).await
    }

    /// Administrative absolute set in its own transaction.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn set_stock(
        &self,
        product_id: ProductId,
        quantity: i64,
        availability: StockOverride,
    ) -> EngineResult<StockSnapshot> {
        let mut tx = self.store.begin().await?;
        let result = set_within(tx.as_mut(), product_id, quantity, availability).await;
        settle(tx, result).await
    }
}

pub(crate) async fn adjust_within(
    tx: &mut dyn StoreTransaction,
    product_id: ProductId,
    delta: i64,
    expected: ExpectedStock,
) -> EngineResult<StockSnapshot> {
    let product = tx
        .lock_product(product_id)
        .await?
        .ok_or_else(|| EngineError::product_not_found(product_id))?;
    let before = product.stock();

    if delta == 0 {
        expected.check(before.quantity())?;
        return Ok(StockSnapshot::of(product_id, before));
    }

    let after = before
        .apply_delta(delta, expected)
        .map_err(|e| with_product(product_id, e))?;
    tx.write_stock(product_id, after).await?;

    tracing::info!(
        product_id = %product_id,
        delta,
        before = before.quantity(),
        after = after.quantity(),
        in_stock = after.in_stock(),
        "stock adjusted"
    );
    Ok(StockSnapshot::of(product_id, after))
}

pub(crate) async fn set_within(
    tx: &mut dyn StoreTransaction,
    product_id: ProductId,
    quantity: i64,
    availability: StockOverride,
) -> EngineResult<StockSnapshot> {
    let product = tx
        .lock_product(product_id)
        .await?
        .ok_or_else(|| EngineError::product_not_found(product_id))?;
    let before = product.stock();

    let after = StockLevel::set_absolute(quantity, availability)?;
    tx.write_stock(product_id, after).await?;

    if !after.is_consistent() {
        tracing::warn!(
            product_id = %product_id,
            quantity = after.quantity(),
            in_stock = after.in_stock(),
            "availability forced against stock quantity"
        );
    }
    tracing::info!(
        product_id = %product_id,
        before = before.quantity(),
        after = after.quantity(),
        in_stock = after.in_stock(),
        "stock set"
    );
    Ok(StockSnapshot::of(product_id, after))
}

fn with_product(product_id: ProductId, err: DomainError) -> EngineError {
    match err {
        DomainError::InsufficientStock {
            requested,
            available,
        } => EngineError::InsufficientStock(vec![StockShortfall {
            product_id,
            requested,
            available,
        }]),
        other => other.into(),
    }
}
