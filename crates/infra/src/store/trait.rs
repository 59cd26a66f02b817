use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use storefront_core::{CustomerId, OrderId, ProductId};
use storefront_inventory::StockLevel;
use storefront_products::Product;
use storefront_reviews::Review;
use storefront_sales::{Order, OrderStatus};

/// Storage boundary error.
///
/// These are **infrastructure errors** (connectivity, locking, constraints) as
/// opposed to domain errors (validation, stock rules). Services translate them
/// into `EngineError` with the context of the operation that failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store cannot be reached or the handle was closed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Lock wait timed out, serialization failure or deadlock; retrying the
    /// whole transaction may succeed.
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("check constraint violated: {0}")]
    ConstraintViolation(String),

    /// A stored row could not be decoded into a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Transactional store handle.
///
/// Constructed explicitly at startup, passed to each service and closed at
/// shutdown. Every engine operation runs inside one `StoreTransaction`.
///
/// ## Isolation requirements
///
/// Implementations must give each transaction at least read-committed
/// isolation, and `lock_product` / `lock_order` must hold the row until commit
/// or rollback so read-modify-write sequences cannot lose updates. Lock waits
/// are bounded; an expired wait surfaces as `StoreError::Conflict`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Start a transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    /// Release the underlying resources; later `begin` calls fail with `Unavailable`.
    async fn close(&self);
}

#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        (**self).begin().await
    }

    async fn close(&self) {
        (**self).close().await
    }
}

/// One open transaction.
///
/// Dropping a transaction without calling `commit` rolls it back.
///
/// `write_stock` is the only way stock fields change; engine code calls it from
/// the stock ledger alone.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn find_product_by_slug(&mut self, slug: &str) -> Result<Option<Product>, StoreError>;

    /// Read a product and hold its row lock until the transaction ends.
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;

    /// Returns `false` when no such product exists.
    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError>;

    async fn product_has_order_items(&mut self, id: ProductId) -> Result<bool, StoreError>;

    /// Persist quantity and availability together.
    async fn write_stock(&mut self, id: ProductId, level: StockLevel) -> Result<(), StoreError>;

    /// Insert an order together with all of its items.
    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Read an order and hold its row lock until the transaction ends.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn write_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<(), StoreError>;

    /// Remove an order and its items. Returns `false` when no such order exists.
    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError>;

    /// Whether any order owned by `customer_id` (any status) has an item for `product_id`.
    async fn customer_has_ordered(
        &mut self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<bool, StoreError>;

    async fn find_review(
        &mut self,
        product_slug: &str,
        customer_email: &str,
    ) -> Result<Option<Review>, StoreError>;

    /// Fails with `UniqueViolation` when (product slug, email) already has a review.
    async fn insert_review(&mut self, review: &Review) -> Result<(), StoreError>;

    /// Reviews for a product, newest first.
    async fn reviews_for_product(&mut self, product_slug: &str) -> Result<Vec<Review>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
