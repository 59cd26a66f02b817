use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, Entity, ProductId};
use storefront_inventory::StockLevel;

/// Longest slug accepted in URLs.
const MAX_SLUG_LEN: usize = 120;

/// Catalog product.
///
/// Prices are in the smallest currency unit (e.g. cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    slug: String,
    name: String,
    price: u64,
    discount_price: Option<u64>,
    stock: StockLevel,
    created_at: DateTime<Utc>,
}

impl Product {
    /// Rebuild a product from persisted columns.
    pub fn restore(
        id: ProductId,
        slug: String,
        name: String,
        price: u64,
        discount_price: Option<u64>,
        stock: StockLevel,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            slug,
            name,
            price,
            discount_price,
            stock,
            created_at,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn discount_price(&self) -> Option<u64> {
        self.discount_price
    }

    pub fn stock(&self) -> StockLevel {
        self.stock
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Unit price a customer pays right now; captured onto order items.
    pub fn effective_price(&self) -> u64 {
        self.discount_price.unwrap_or(self.price)
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub slug: String,
    pub name: String,
    pub price: u64,
    pub discount_price: Option<u64>,
    pub initial_stock: i64,
}

impl NewProduct {
    /// Validate and build the product with a fresh id.
    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> DomainResult<Product> {
        let slug = self.slug.trim().to_string();
        validate_slug(&slug)?;

        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        if let Some(discount) = self.discount_price {
            if discount > self.price {
                return Err(DomainError::validation(
                    "discount price cannot exceed the regular price",
                ));
            }
        }

        let stock = StockLevel::new(self.initial_stock)?;

        Ok(Product {
            id,
            slug,
            name,
            price: self.price,
            discount_price: self.discount_price,
            stock,
            created_at: now,
        })
    }
}

/// Slugs are lowercase ASCII letters, digits and single hyphens (e.g. `esp32-cam`).
pub fn validate_slug(slug: &str) -> DomainResult<()> {
    if slug.is_empty() {
        return Err(DomainError::validation("slug cannot be empty"));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(DomainError::validation(format!(
            "slug cannot exceed {MAX_SLUG_LEN} characters"
        )));
    }
    if slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err(DomainError::validation(
            "slug cannot start/end with '-' or contain '--'",
        ));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(DomainError::validation(
            "slug may only contain lowercase letters, digits and '-'",
        ));
    }
    Ok(())
}
