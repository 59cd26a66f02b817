//! Test-only store wrapper that can fail commits and records committed stock
//! writes in commit order.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use storefront_core::{CustomerId, OrderId, ProductId};
use storefront_inventory::StockLevel;
use storefront_products::Product;
use storefront_reviews::Review;
use storefront_sales::{Order, OrderStatus};

use super::r#trait::{Store, StoreError, StoreTransaction};

/// One committed stock change: the level read under the lock and the level written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockWrite {
    pub product_id: ProductId,
    pub before: StockLevel,
    pub after: StockLevel,
    /// Whether the same transaction inserted an order.
    pub with_order: bool,
}

#[derive(Debug, Default)]
struct Shared {
    commit_failures_left: AtomicU32,
    commits_attempted: AtomicU32,
    log: Mutex<Vec<StockWrite>>,
}

/// Wraps a serialising store (e.g. `InMemoryStore`), so the commit log order
/// is the real commit order.
pub struct RecordingStore<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S: Store> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            shared: Arc::new(Shared::default()),
        }
    }

    /// The next `n` commits fail with `Conflict` and roll back instead.
    pub fn fail_commits(self, n: u32) -> Self {
        self.shared.commit_failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn commits_attempted(&self) -> u32 {
        self.shared.commits_attempted.load(Ordering::SeqCst)
    }

    pub fn stock_writes(&self) -> Vec<StockWrite> {
        self.shared
            .log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl<S: Store> Store for RecordingStore<S> {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(RecordingTransaction {
            inner,
            shared: self.shared.clone(),
            seen: BTreeMap::new(),
            written: BTreeMap::new(),
            with_order: false,
        }))
    }

    async fn close(&self) {
        self.inner.close().await
    }
}

struct RecordingTransaction {
    inner: Box<dyn StoreTransaction>,
    shared: Arc<Shared>,
    seen: BTreeMap<ProductId, StockLevel>,
    written: BTreeMap<ProductId, StockLevel>,
    with_order: bool,
}

#[async_trait]
impl StoreTransaction for RecordingTransaction {
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.inner.find_product(id).await
    }

    async fn find_product_by_slug(&mut self, slug: &str) -> Result<Option<Product>, StoreError> {
        self.inner.find_product_by_slug(slug).await
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let product = self.inner.lock_product(id).await?;
        if let Some(p) = &product {
            self.seen.entry(id).or_insert(p.stock());
        }
        Ok(product)
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        self.inner.insert_product(product).await
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError> {
        self.inner.delete_product(id).await
    }

    async fn product_has_order_items(&mut self, id: ProductId) -> Result<bool, StoreError> {
        self.inner.product_has_order_items(id).await
    }

    async fn write_stock(&mut self, id: ProductId, level: StockLevel) -> Result<(), StoreError> {
        self.inner.write_stock(id, level).await?;
        self.written.insert(id, level);
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        self.inner.insert_order(order).await?;
        self.with_order = true;
        Ok(())
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.inner.find_order(id).await
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.inner.lock_order(id).await
    }

    async fn write_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<(), StoreError> {
        self.inner.write_order_status(id, status).await
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError> {
        self.inner.delete_order(id).await
    }

    async fn customer_has_ordered(
        &mut self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<bool, StoreError> {
        self.inner.customer_has_ordered(customer_id, product_id).await
    }

    async fn find_review(
        &mut self,
        product_slug: &str,
        customer_email: &str,
    ) -> Result<Option<Review>, StoreError> {
        self.inner.find_review(product_slug, customer_email).await
    }

    async fn insert_review(&mut self, review: &Review) -> Result<(), StoreError> {
        self.inner.insert_review(review).await
    }

    async fn reviews_for_product(&mut self, product_slug: &str) -> Result<Vec<Review>, StoreError> {
        self.inner.reviews_for_product(product_slug).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let RecordingTransaction {
            inner,
            shared,
            seen,
            written,
            with_order,
        } = *self;
        shared.commits_attempted.fetch_add(1, Ordering::SeqCst);

        let failed = shared
            .commit_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            inner.rollback().await?;
            return Err(StoreError::Conflict("injected commit failure".to_string()));
        }

        // The inner transaction still holds the table lock here.
        if let Ok(mut log) = shared.log.lock() {
            for (product_id, after) in written {
                if let Some(&before) = seen.get(&product_id) {
                    log.push(StockWrite {
                        product_id,
                        before,
                        after,
                        with_order,
                    });
                }
            }
        }
        inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}
