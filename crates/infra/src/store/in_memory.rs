use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use storefront_core::{CustomerId, OrderId, ProductId};
use storefront_inventory::StockLevel;
use storefront_products::Product;
use storefront_reviews::Review;
use storefront_sales::{Order, OrderStatus};

use super::r#trait::{Store, StoreError, StoreTransaction};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    reviews: Vec<Review>,
}

/// In-memory transactional store.
///
/// Intended for tests/dev. Not optimized for performance.
///
/// Transactions are fully serialised: `begin` takes the single table lock
/// (waiting at most `lock_timeout`) and works on a private copy that replaces
/// the shared tables only on `commit`.
#[derive(Debug)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    lock_timeout: Duration,
    closed: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            lock_timeout,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("store is closed".to_string()));
        }

        let guard = tokio::time::timeout(self.lock_timeout, self.tables.clone().lock_owned())
            .await
            .map_err(|_| {
                StoreError::Conflict(format!(
                    "lock wait exceeded {}ms",
                    self.lock_timeout.as_millis()
                ))
            })?;

        let working = (*guard).clone();
        Ok(Box::new(InMemoryTransaction { guard, working }))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn find_product_by_slug(&mut self, slug: &str) -> Result<Option<Product>, StoreError> {
        Ok(self
            .working
            .products
            .values()
            .find(|p| p.slug() == slug)
            .cloned())
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        // The whole table set is already held exclusively.
        self.find_product(id).await
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        let products = &mut self.working.products;
        if products.contains_key(&product.id_typed()) {
            return Err(StoreError::UniqueViolation("products.id".to_string()));
        }
        if products.values().any(|p| p.slug() == product.slug()) {
            return Err(StoreError::UniqueViolation("products.slug".to_string()));
        }
        products.insert(product.id_typed(), product.clone());
        Ok(())
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError> {
        if self.product_has_order_items(id).await? {
            return Err(StoreError::ForeignKeyViolation(
                "order_items.product_id".to_string(),
            ));
        }
        let removed = self.working.products.remove(&id).is_some();
        if removed {
            self.working.reviews.retain(|r| r.product_id() != id);
        }
        Ok(removed)
    }

    async fn product_has_order_items(&mut self, id: ProductId) -> Result<bool, StoreError> {
        Ok(self
            .working
            .orders
            .values()
            .any(|o| o.contains_product(id)))
    }

    async fn write_stock(&mut self, id: ProductId, level: StockLevel) -> Result<(), StoreError> {
        let product = self
            .working
            .products
            .remove(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("stock write for missing product {id}")))?;
        let product = Product::restore(
            id,
            product.slug().to_string(),
            product.name().to_string(),
            product.price(),
            product.discount_price(),
            level,
            product.created_at(),
        );
        self.working.products.insert(id, product);
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        if self.working.orders.contains_key(&order.id_typed()) {
            return Err(StoreError::UniqueViolation("orders.id".to_string()));
        }
        for item in order.items() {
            if !self.working.products.contains_key(&item.product_id) {
                return Err(StoreError::ForeignKeyViolation(
                    "order_items.product_id".to_string(),
                ));
            }
        }
        self.working.orders.insert(order.id_typed(), order.clone());
        Ok(())
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.find_order(id).await
    }

    async fn write_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<(), StoreError> {
        let order = self
            .working
            .orders
            .get(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("status write for missing order {id}")))?;
        let updated = Order::restore(
            order.id_typed(),
            order.order_number().to_string(),
            order.customer_id(),
            status,
            order.total(),
            order.items().to_vec(),
            order.shipping().clone(),
            order.billing().clone(),
            order.created_at(),
        );
        self.working.orders.insert(id, updated);
        Ok(())
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError> {
        Ok(self.working.orders.remove(&id).is_some())
    }

    async fn customer_has_ordered(
        &mut self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .working
            .orders
            .values()
            .any(|o| o.customer_id() == Some(customer_id) && o.contains_product(product_id)))
    }

    async fn find_review(
        &mut self,
        product_slug: &str,
        customer_email: &str,
    ) -> Result<Option<Review>, StoreError> {
        Ok(self
            .working
            .reviews
            .iter()
            .find(|r| r.product_slug() == product_slug && r.customer_email() == customer_email)
            .cloned())
    }

    async fn insert_review(&mut self, review: &Review) -> Result<(), StoreError> {
        let exists = self
            .find_review(review.product_slug(), review.customer_email())
            .await?
            .is_some();
        if exists {
            return Err(StoreError::UniqueViolation(
                "reviews(product_slug, customer_email)".to_string(),
            ));
        }
        self.working.reviews.push(review.clone());
        Ok(())
    }

    async fn reviews_for_product(&mut self, product_slug: &str) -> Result<Vec<Review>, StoreError> {
        let mut reviews: Vec<Review> = self
            .working
            .reviews
            .iter()
            .filter(|r| r.product_slug() == product_slug)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(reviews)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
