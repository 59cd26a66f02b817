//! Order Placement Coordinator.
//!
//! ## Placement algorithm
//!
//! ```text
//! begin
//!   ↓
//! 1. Lock every product in the cart (ascending id order)
//!   ↓
//! 2. Compare summed demand against the locked quantities
//!      any shortfall → rollback, InsufficientStock (all offending products)
//!   ↓
//! 3. Capture unit prices, compute total
//!   ↓
//! 4. Insert order + items
//!   ↓
//! 5. Decrement stock through the ledger, expecting the locked quantity
//!   ↓
//! commit ── Conflict → retry from `begin` (bounded)
//! ```
//!
//! Either the order, its items and every decrement are committed together or
//! nothing is. Two placements on the same product serialise on the row lock, so
//! the second one re-reads the already decremented quantity.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{instrument, Span};

use storefront_core::{CustomerId, OrderId, ProductId};
use storefront_inventory::ExpectedStock;
use storefront_products::Product;
use storefront_sales::{Cart, Order, OrderItem, OrderStatus};

use crate::error::{EngineError, EngineResult, StockShortfall};
use crate::stock_ledger::adjust_within;
use crate::store::{settle, Store, StoreTransaction};

/// Retry bound for conflicting placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Linear backoff base; attempt `n` waits `n * backoff` before retrying.
    pub backoff: Duration,
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

/// Checkout request.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceOrder {
    /// `None` for guest checkout.
    pub customer_id: Option<CustomerId>,
    pub cart: Cart,
    /// Passed through untouched.
    pub shipping: JsonValue,
    pub billing: JsonValue,
}

#[derive(Debug, Clone)]
pub struct OrderPlacementCoordinator<S> {
    store: S,
    policy: PlacementPolicy,
}

impl<S> OrderPlacementCoordinator<S>
where
    S: Store,
{
    pub fn new(store: S) -> Self {
        Self::with_policy(store, PlacementPolicy::default())
    }

    pub fn with_policy(store: S, policy: PlacementPolicy) -> Self {
        Self { store, policy }
    }

    #[instrument(
        skip(self, request),
        fields(
            lines = request.cart.lines().len(),
            customer_id = ?request.customer_id,
            order_id = tracing::field::Empty,
        ),
        err
    )]
    pub async fn place_order(&self, request: PlaceOrder) -> EngineResult<Order> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.try_place(&request).await {
                Ok(order) => {
                    Span::current().record("order_id", tracing::field::display(order.id_typed()));
                    tracing::info!(
                        order_number = order.order_number(),
                        total = order.total(),
                        attempt,
                        "order placed"
                    );
                    return Ok(order);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(attempt, max_attempts, error = %err, "order placement conflicted, retrying");
                    tokio::time::sleep(self.policy.backoff * attempt).await;
                    attempt += 1;
                }
                Err(EngineError::Conflict(msg)) => {
                    return Err(EngineError::Conflict(format!(
                        "order placement gave up after {attempt} attempt(s): {msg}"
                    )));
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_place(&self, request: &PlaceOrder) -> EngineResult<Order> {
        let mut tx = self.store.begin().await?;
        let result = place_within(tx.as_mut(), request).await;
        settle(tx, result).await
    }

    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn get_order(&self, order_id: OrderId) -> EngineResult<Order> {
        let mut tx = self.store.begin().await?;
        let result = match tx.find_order(order_id).await {
            Ok(Some(order)) => Ok(order),
            Ok(None) => Err(EngineError::not_found("order", order_id.to_string())),
            Err(e) => Err(e.into()),
        };
        settle(tx, result).await
    }

    /// Move an order along its status machine. Stock is never restored here.
    #[instrument(skip(self), fields(order_id = %order_id, next = %next), err)]
    pub async fn update_status(&self, order_id: OrderId, next: OrderStatus) -> EngineResult<Order> {
        let mut tx = self.store.begin().await?;
        let result = transition_within(tx.as_mut(), order_id, next).await;
        settle(tx, result).await
    }

    /// Administrative removal of an order and its items. Stock is not restored.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn delete_order(&self, order_id: OrderId) -> EngineResult<()> {
        let mut tx = self.store.begin().await?;
        let result = match tx.delete_order(order_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(EngineError::not_found("order", order_id.to_string())),
            Err(e) => Err(e.into()),
        };
        let result = settle(tx, result).await;
        if result.is_ok() {
            tracing::warn!(order_id = %order_id, "order deleted without restoring stock");
        }
        result
    }
}

async fn place_within(tx: &mut dyn StoreTransaction, request: &PlaceOrder) -> EngineResult<Order> {
    let demand = request.cart.demand_by_product()?;

    let mut locked: HashMap<ProductId, Product> = HashMap::with_capacity(demand.len());
    let mut shortfalls = Vec::new();

    // BTreeMap iteration gives the ascending lock order.
    for (&product_id, &requested) in &demand {
        let product = tx
            .lock_product(product_id)
            .await?
            .ok_or_else(|| EngineError::product_not_found(product_id))?;

        if !product.stock().can_fulfil(requested) {
            shortfalls.push(StockShortfall {
                product_id,
                requested,
                available: product.stock().quantity(),
            });
        }
        locked.insert(product_id, product);
    }

    if !shortfalls.is_empty() {
        return Err(EngineError::InsufficientStock(shortfalls));
    }

    let mut items = Vec::with_capacity(request.cart.lines().len());
    for line in request.cart.lines() {
        let product = locked
            .get(&line.product_id)
            .ok_or_else(|| EngineError::product_not_found(line.product_id))?;
        items.push(OrderItem::capture(product, line.quantity)?);
    }

    let order = Order::place(
        OrderId::new(),
        request.customer_id,
        items,
        request.shipping.clone(),
        request.billing.clone(),
        Utc::now(),
    )?;
    tx.insert_order(&order).await?;

    for (&product_id, &requested) in &demand {
        let seen = locked
            .get(&product_id)
            .map(|p| p.stock().quantity())
            .ok_or_else(|| EngineError::product_not_found(product_id))?;
        adjust_within(tx, product_id, -requested, ExpectedStock::Exact(seen)).await?;
    }

    Ok(order)
}

async fn transition_within(
    tx: &mut dyn StoreTransaction,
    order_id: OrderId,
    next: OrderStatus,
) -> EngineResult<Order> {
    let mut order = tx
        .lock_order(order_id)
        .await?
        .ok_or_else(|| EngineError::not_found("order", order_id.to_string()))?;

    let previous = order.status();
    order.transition_to(next)?;
    tx.write_order_status(order_id, next).await?;

    tracing::info!(order_id = %order_id, from = %previous, to = %next, "order status changed");
    Ok(order)
}
