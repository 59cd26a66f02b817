//! Product catalog administration (create, look up, delete).

use chrono::Utc;
use tracing::instrument;

use storefront_core::ProductId;
use storefront_products::{NewProduct, Product};

use crate::error::{EngineError, EngineResult};
use crate::store::{settle, Store, StoreError, StoreTransaction};

#[derive(Debug, Clone)]
pub struct CatalogService<S> {
    store: S,
}

impl<S> CatalogService<S>
where
    S: Store,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self, input), fields(slug = %input.slug), err)]
    pub async fn create_product(&self, input: NewProduct) -> EngineResult<Product> {
        let product = input.into_product(ProductId::new(), Utc::now())?;

        let mut tx = self.store.begin().await?;
        let result = match tx.insert_product(&product).await {
            Ok(()) => Ok(product),
            Err(StoreError::UniqueViolation(_)) => Err(EngineError::Validation(format!(
                "slug {} is already taken",
                product.slug()
            ))),
            Err(e) => Err(e.into()),
        };
        settle(tx, result).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_product(&self, product_id: ProductId) -> EngineResult<Product> {
        let mut tx = self.store.begin().await?;
        let result = match tx.find_product(product_id).await {
            Ok(Some(product)) => Ok(product),
            Ok(None) => Err(EngineError::product_not_found(product_id)),
            Err(e) => Err(e.into()),
        };
        settle(tx, result).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_product_by_slug(&self, slug: &str) -> EngineResult<Product> {
        let mut tx = self.store.begin().await?;
        let result = match tx.find_product_by_slug(slug.trim()).await {
            Ok(Some(product)) => Ok(product),
            Ok(None) => Err(EngineError::not_found("product", slug.trim())),
            Err(e) => Err(e.into()),
        };
        settle(tx, result).await
    }

    /// Hard delete; refused while any order item references the product.
    #[instrument(skip(self), err)]
    pub async fn delete_product(&self, product_id: ProductId) -> EngineResult<()> {
        let mut tx = self.store.begin().await?;
        let result = delete_within(tx.as_mut(), product_id).await;
        settle(tx, result).await
    }
}

async fn delete_within(tx: &mut dyn StoreTransaction, product_id: ProductId) -> EngineResult<()> {
    if tx.lock_product(product_id).await?.is_none() {
        return Err(EngineError::product_not_found(product_id));
    }
    if tx.product_has_order_items(product_id).await? {
        return Err(EngineError::ProductInUse(product_id));
    }
    match tx.delete_product(product_id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(EngineError::product_not_found(product_id)),
        Err(StoreError::ForeignKeyViolation(_)) => Err(EngineError::ProductInUse(product_id)),
        Err(e) => Err(e.into()),
    }
}
