use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{CustomerId, DomainError, DomainResult, Entity, ProductId, ReviewId};

pub const MAX_COMMENT_CHARS: usize = 2000;

/// Star rating in `[1, 5]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> DomainResult<Self> {
        if !(i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            return Err(DomainError::validation(format!(
                "rating must be between {} and {} (got {value})",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Rating::new(value)
    }
}

impl From<Rating> for i64 {
    fn from(value: Rating) -> Self {
        i64::from(value.0)
    }
}

/// Review submission as received from the route layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    pub product_slug: String,
    pub customer_email: String,
    pub rating: i64,
    pub comment: String,
    pub customer_id: Option<CustomerId>,
}

impl NewReview {
    /// Normalised email used for the uniqueness key.
    pub fn normalized_email(&self) -> DomainResult<String> {
        normalize_email(&self.customer_email)
    }
}

/// Persisted review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    id: ReviewId,
    product_id: ProductId,
    product_slug: String,
    customer_email: String,
    customer_id: Option<CustomerId>,
    rating: Rating,
    comment: String,
    verified_purchase: bool,
    created_at: DateTime<Utc>,
}

impl Review {
    /// Validate a submission and fix its verified-purchase flag.
    pub fn create(
        id: ReviewId,
        product_id: ProductId,
        input: NewReview,
        verified_purchase: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let customer_email = input.normalized_email()?;
        let rating = Rating::new(input.rating)?;

        let comment = input.comment.trim().to_string();
        if comment.chars().count() > MAX_COMMENT_CHARS {
            return Err(DomainError::validation(format!(
                "comment cannot exceed {MAX_COMMENT_CHARS} characters"
            )));
        }

        Ok(Self {
            id,
            product_id,
            product_slug: input.product_slug.trim().to_string(),
            customer_email,
            customer_id: input.customer_id,
            rating,
            comment,
            verified_purchase,
            created_at: now,
        })
    }

    /// Rebuild a review from persisted columns.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ReviewId,
        product_id: ProductId,
        product_slug: String,
        customer_email: String,
        customer_id: Option<CustomerId>,
        rating: Rating,
        comment: String,
        verified_purchase: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id,
            product_slug,
            customer_email,
            customer_id,
            rating,
            comment,
            verified_purchase,
            created_at,
        }
    }

    pub fn id_typed(&self) -> ReviewId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn product_slug(&self) -> &str {
        &self.product_slug
    }

    pub fn customer_email(&self) -> &str {
        &self.customer_email
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn rating(&self) -> Rating {
        self.rating
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn verified_purchase(&self) -> bool {
        self.verified_purchase
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Review {
    type Id = ReviewId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Trim + lowercase, with a minimal `local@domain` shape check.
pub fn normalize_email(raw: &str) -> DomainResult<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email)
        }
        _ => Err(DomainError::validation("customer email is malformed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(rating: i64) -> NewReview {
        NewReview {
            product_slug: "esp32-cam".to_string(),
            customer_email: "  Ada@Example.COM ".to_string(),
            rating,
            comment: "  works great  ".to_string(),
            customer_id: None,
        }
    }

    #[test]
    fn create_normalises_email_and_comment() {
        let review =
            Review::create(ReviewId::new(), ProductId::new(), submission(5), true, Utc::now())
                .unwrap();
        assert_eq!(review.customer_email(), "ada@example.com");
        assert_eq!(review.comment(), "works great");
        assert_eq!(review.rating().value(), 5);
        assert!(review.verified_purchase());
    }

    #[test]
    fn rating_bounds_are_enforced() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert!(Rating::new(1).is_ok());
        assert!(Rating::new(5).is_ok());
    }

    #[test]
    fn overlong_comment_is_rejected() {
        let mut input = submission(4);
        input.comment = "x".repeat(MAX_COMMENT_CHARS + 1);
        assert!(Review::create(ReviewId::new(), ProductId::new(), input, false, Utc::now()).is_err());
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for raw in ["", "no-at-sign", "@example.com", "ada@", "a@b@c"] {
            assert!(normalize_email(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn only_one_to_five_are_ratings(value in -100i64..100) {
                prop_assert_eq!(Rating::new(value).is_ok(), (1..=5).contains(&value));
            }
        }
    }
}
