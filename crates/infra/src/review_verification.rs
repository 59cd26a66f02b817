//! Review Verification Service.
//!
//! Reads order history to tag reviews as verified purchases. The flag is
//! computed once, at submission, and stored with the review; later changes to
//! the customer's orders (cancellation, deletion) do not touch it. Any order
//! status counts, cancelled included.

use chrono::Utc;
use tracing::instrument;

use storefront_core::{CustomerId, ProductId, ReviewId};
use storefront_reviews::{NewReview, Review};

use crate::error::{EngineError, EngineResult};
use crate::store::{settle, Store, StoreError, StoreTransaction};

#[derive(Debug, Clone)]
pub struct ReviewVerificationService<S> {
    store: S,
}

impl<S> ReviewVerificationService<S>
where
    S: Store,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self), err)]
    pub async fn is_verified_purchase(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> EngineResult<bool> {
        let mut tx = self.store.begin().await?;
        let result = tx
            .customer_has_ordered(customer_id, product_id)
            .await
            .map_err(EngineError::from);
        settle(tx, result).await
    }

    /// Persist a review; at most one per (product slug, normalised email).
    #[instrument(
        skip(self, input),
        fields(product_slug = %input.product_slug, customer_id = ?input.customer_id),
        err
    )]
    pub async fn submit_review(&self, input: NewReview) -> EngineResult<Review> {
        let mut tx = self.store.begin().await?;
        let result = submit_within(tx.as_mut(), input).await;
        let review = settle(tx, result).await?;

        tracing::info!(
            review_id = %review.id_typed(),
            verified_purchase = review.verified_purchase(),
            "review submitted"
        );
        Ok(review)
    }

    /// Reviews for a product, newest first.
    #[instrument(skip(self), err)]
    pub async fn list_reviews(&self, product_slug: &str) -> EngineResult<Vec<Review>> {
        let mut tx = self.store.begin().await?;
        let result = list_within(tx.as_mut(), product_slug.trim()).await;
        settle(tx, result).await
    }
}

async fn submit_within(
    tx: &mut dyn StoreTransaction,
    mut input: NewReview,
) -> EngineResult<Review> {
    let slug = input.product_slug.trim().to_string();
    let product = tx
        .find_product_by_slug(&slug)
        .await?
        .ok_or_else(|| EngineError::not_found("product", slug.clone()))?;

    let verified = match input.customer_id {
        Some(customer_id) => {
            tx.customer_has_ordered(customer_id, product.id_typed())
                .await?
        }
        None => false,
    };

    input.product_slug = product.slug().to_string();
    let review = Review::create(ReviewId::new(), product.id_typed(), input, verified, Utc::now())?;
    let email = review.customer_email().to_string();

    if tx.find_review(product.slug(), &email).await?.is_some() {
        return Err(duplicate(product.slug(), &email));
    }

    // A concurrent submission can pass the lookup above; the unique key decides.
    match tx.insert_review(&review).await {
        Ok(()) => Ok(review),
        Err(StoreError::UniqueViolation(_)) => Err(duplicate(product.slug(), &email)),
        Err(e) => Err(e.into()),
    }
}

async fn list_within(tx: &mut dyn StoreTransaction, slug: &str) -> EngineResult<Vec<Review>> {
    if tx.find_product_by_slug(slug).await?.is_none() {
        return Err(EngineError::not_found("product", slug));
    }
    Ok(tx.reviews_for_product(slug).await?)
}

fn duplicate(product_slug: &str, email: &str) -> EngineError {
    EngineError::DuplicateReview {
        product_slug: product_slug.to_string(),
        email: email.to_string(),
    }
}
