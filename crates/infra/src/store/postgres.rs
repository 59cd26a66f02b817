//! Postgres-backed store implementation.
//!
//! ## Locking
//!
//! Each transaction sets a local `lock_timeout` right after `BEGIN`, and
//! `lock_product` / `lock_order` use `SELECT ... FOR UPDATE`. A second
//! checkout on the same product therefore waits for the first to commit and
//! then reads the decremented quantity, or gives up after the timeout.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (foreign key violation) | `23503` | `ForeignKeyViolation` |
//! | Database (check constraint violation) | `23514` | `ConstraintViolation` |
//! | Database (lock not available) | `55P03` | `Conflict` |
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Conflict` |
//! | Decode / ColumnDecode / ColumnNotFound / RowNotFound | N/A | `Corrupt` |
//! | Anything else (pool, IO, TLS, protocol) | N/A | `Unavailable` |
//!
//! All statements are parameterised; no input is ever formatted into SQL text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use storefront_core::{CustomerId, OrderId, ProductId, ReviewId};
use storefront_inventory::StockLevel;
use storefront_products::Product;
use storefront_reviews::{Rating, Review};
use storefront_sales::{Order, OrderItem, OrderStatus};

use super::r#trait::{Store, StoreError, StoreTransaction};
use super::schema;

/// Postgres-backed transactional store.
///
/// Uses the SQLx connection pool, which is thread-safe; the handle can be
/// cloned and shared across request handlers.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
    lock_timeout: Duration,
}

impl PostgresStore {
    /// Open a pool against `database_url`.
    #[instrument(skip(database_url), err)]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        lock_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::from_pool(pool, lock_timeout))
    }

    pub fn from_pool(pool: PgPool, lock_timeout: Duration) -> Self {
        Self {
            pool: Arc::new(pool),
            lock_timeout,
        }
    }

    /// Create tables, constraints and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        for statement in schema::STATEMENTS {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;

        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn load_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, product_slug, quantity, unit_price
            FROM order_items
            WHERE order_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_order_items", e))?;

        rows.iter().map(item_from_row).collect()
    }

    async fn order_with_items(&mut self, row: Option<PgRow>) -> Result<Option<Order>, StoreError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let id: Uuid = get(&row, "id")?;
        let items = self.load_items(id).await?;
        order_from_row(&row, items).map(Some)
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, slug, name, price, discount_price, stock_quantity, in_stock, created_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn find_product_by_slug(&mut self, slug: &str) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, slug, name, price, discount_price, stock_quantity, in_stock, created_at
            FROM products
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_product_by_slug", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, slug, name, price, discount_price, stock_quantity, in_stock, created_at
            FROM products
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        let discount = product.discount_price().map(to_i64).transpose()?;
        sqlx::query(
            r#"
            INSERT INTO products (
                id, slug, name, price, discount_price, stock_quantity, in_stock, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id_typed().as_uuid())
        .bind(product.slug())
        .bind(product.name())
        .bind(to_i64(product.price())?)
        .bind(discount)
        .bind(product.stock().quantity())
        .bind(product.stock().in_stock())
        .bind(product.created_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn product_has_order_items(&mut self, id: ProductId) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM order_items WHERE product_id = $1) AS referenced",
        )
        .bind(id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("product_has_order_items", e))?;
        get(&row, "referenced")
    }

    async fn write_stock(&mut self, id: ProductId, level: StockLevel) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = $2, in_stock = $3
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(level.quantity())
        .bind(level.in_stock())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("write_stock", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!(
                "stock write for missing product {id}"
            )));
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let order_id = *order.id_typed().as_uuid();
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, customer_id, status, total, shipping, billing, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order_id)
        .bind(order.order_number())
        .bind(order.customer_id().map(Uuid::from))
        .bind(order.status().as_str())
        .bind(to_i64(order.total())?)
        .bind(order.shipping())
        .bind(order.billing())
        .bind(order.created_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        for (idx, item) in order.items().iter().enumerate() {
            let line_no = i32::try_from(idx + 1)
                .map_err(|_| StoreError::ConstraintViolation("too many order items".to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, line_no, product_id, product_slug, quantity, unit_price
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order_id)
            .bind(line_no)
            .bind(item.product_id.as_uuid())
            .bind(&item.product_slug)
            .bind(item.quantity)
            .bind(to_i64(item.unit_price)?)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_item", e))?;
        }
        Ok(())
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, order_number, customer_id, status, total, shipping, billing, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_order", e))?;

        self.order_with_items(row).await
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, order_number, customer_id, status, total, shipping, billing, created_at
            FROM orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_order", e))?;

        self.order_with_items(row).await
    }

    async fn write_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("write_order_status", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!(
                "status write for missing order {id}"
            )));
        }
        Ok(())
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn customer_has_ordered(
        &mut self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM order_items oi
                JOIN orders o ON o.id = oi.order_id
                WHERE o.customer_id = $1 AND oi.product_id = $2
            ) AS purchased
            "#,
        )
        .bind(customer_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("customer_has_ordered", e))?;
        get(&row, "purchased")
    }

    async fn find_review(
        &mut self,
        product_slug: &str,
        customer_email: &str,
    ) -> Result<Option<Review>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, product_slug, customer_email, customer_id,
                   rating, comment, verified_purchase, created_at
            FROM reviews
            WHERE product_slug = $1 AND customer_email = $2
            "#,
        )
        .bind(product_slug)
        .bind(customer_email)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_review", e))?;

        row.as_ref().map(review_from_row).transpose()
    }

    async fn insert_review(&mut self, review: &Review) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO reviews (
                id, product_id, product_slug, customer_email, customer_id,
                rating, comment, verified_purchase, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(review.id_typed().as_uuid())
        .bind(review.product_id().as_uuid())
        .bind(review.product_slug())
        .bind(review.customer_email())
        .bind(review.customer_id().map(Uuid::from))
        .bind(i16::from(review.rating().value()))
        .bind(review.comment())
        .bind(review.verified_purchase())
        .bind(review.created_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_review", e))?;
        Ok(())
    }

    async fn reviews_for_product(&mut self, product_slug: &str) -> Result<Vec<Review>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, product_slug, customer_email, customer_id,
                   rating, comment, verified_purchase, created_at
            FROM reviews
            WHERE product_slug = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(product_slug)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("reviews_for_product", e))?;

        rows.iter().map(review_from_row).collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

// Row decoding

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("failed to read {column}: {e}")))
}

fn to_i64(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::ConstraintViolation(format!("amount {value} out of range")))
}

fn to_u64(column: &str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("negative value in {column}: {value}")))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let quantity: i64 = get(row, "stock_quantity")?;
    let in_stock: bool = get(row, "in_stock")?;
    let stock = StockLevel::from_stored(quantity, in_stock)
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let discount: Option<i64> = get(row, "discount_price")?;
    let created_at: DateTime<Utc> = get(row, "created_at")?;

    Ok(Product::restore(
        ProductId::from_uuid(get(row, "id")?),
        get(row, "slug")?,
        get(row, "name")?,
        to_u64("price", get(row, "price")?)?,
        discount.map(|d| to_u64("discount_price", d)).transpose()?,
        stock,
        created_at,
    ))
}

fn item_from_row(row: &PgRow) -> Result<OrderItem, StoreError> {
    Ok(OrderItem {
        product_id: ProductId::from_uuid(get(row, "product_id")?),
        product_slug: get(row, "product_slug")?,
        quantity: get(row, "quantity")?,
        unit_price: to_u64("unit_price", get(row, "unit_price")?)?,
    })
}

fn order_from_row(row: &PgRow, items: Vec<OrderItem>) -> Result<Order, StoreError> {
    let status: String = get(row, "status")?;
    let status: OrderStatus = status
        .parse()
        .map_err(|e: storefront_core::DomainError| StoreError::Corrupt(e.to_string()))?;
    let customer_id: Option<Uuid> = get(row, "customer_id")?;
    let shipping: JsonValue = get(row, "shipping")?;
    let billing: JsonValue = get(row, "billing")?;

    Ok(Order::restore(
        OrderId::from_uuid(get(row, "id")?),
        get(row, "order_number")?,
        customer_id.map(CustomerId::from_uuid),
        status,
        to_u64("total", get(row, "total")?)?,
        items,
        shipping,
        billing,
        get(row, "created_at")?,
    ))
}

fn review_from_row(row: &PgRow) -> Result<Review, StoreError> {
    let rating: i16 = get(row, "rating")?;
    let rating = Rating::new(i64::from(rating)).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let customer_id: Option<Uuid> = get(row, "customer_id")?;

    Ok(Review::restore(
        ReviewId::from_uuid(get(row, "id")?),
        ProductId::from_uuid(get(row, "product_id")?),
        get(row, "product_slug")?,
        get(row, "customer_email")?,
        customer_id.map(CustomerId::from_uuid),
        rating,
        get(row, "comment")?,
        get(row, "verified_purchase")?,
        get(row, "created_at")?,
    ))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                Some("23503") => StoreError::ForeignKeyViolation(msg),
                Some("23514") => StoreError::ConstraintViolation(msg),
                // lock_not_available, serialization_failure, deadlock_detected
                Some("55P03") | Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::RowNotFound
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("row decoding failed in {}: {}", operation, err))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}
