//! Engine-level error taxonomy.
//!
//! `EngineError` is what every service returns and what the route layer
//! serialises. Domain rule failures (`DomainError`) and storage failures
//! (`StoreError`) are folded into it here; services that know more context
//! (which product ran short, which review key collided) build the specific
//! variant themselves instead of relying on the blanket conversions.

use serde::Serialize;
use thiserror::Error;

use storefront_core::{DomainError, ProductId};

use crate::store::StoreError;

/// One cart line that could not be covered by the locked stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockShortfall {
    pub product_id: ProductId,
    pub requested: i64,
    pub available: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Requested quantities exceed current stock; nothing was written.
    #[error("insufficient stock for {} product(s)", .0.len())]
    InsufficientStock(Vec<StockShortfall>),

    /// Concurrent-write contention; the caller may retry the whole operation.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("customer {email} already reviewed {product_slug}")]
    DuplicateReview { product_slug: String, email: String },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Hard deletion refused because order items still reference the product.
    #[error("product {0} is referenced by existing orders")]
    ProductInUse(ProductId),

    /// Backing store unreachable or returned unreadable data.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl EngineError {
    pub fn product_not_found(id: ProductId) -> Self {
        Self::NotFound {
            entity: "product",
            key: id.to_string(),
        }
    }

    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InsufficientStock(_) => "insufficient_stock",
            EngineError::Conflict(_) => "conflict",
            EngineError::DuplicateReview { .. } => "duplicate_review",
            EngineError::NotFound { .. } => "not_found",
            EngineError::Validation(_) => "validation_error",
            EngineError::InvalidTransition(_) => "invalid_transition",
            EngineError::ProductInUse(_) => "product_in_use",
            EngineError::StorageUnavailable(_) => "storage_unavailable",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }

    /// The offending product, when the error concerns exactly one.
    pub fn product_id(&self) -> Option<ProductId> {
        match self {
            EngineError::InsufficientStock(shortfalls) if shortfalls.len() == 1 => {
                Some(shortfalls[0].product_id)
            }
            EngineError::ProductInUse(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => EngineError::Validation(msg),
            DomainError::InvalidId(msg) => EngineError::Validation(msg),
            DomainError::Conflict(msg) => EngineError::Conflict(msg),
            DomainError::InvalidTransition(msg) => EngineError::InvalidTransition(msg),
            DomainError::NotFound => EngineError::not_found("entity", "unknown"),
            // Only raised when persisted state breaks a rule it was written under.
            DomainError::InvariantViolation(msg) => EngineError::StorageUnavailable(msg),
            // Without a product there is nothing to attach; callers that know
            // the product convert through `StockShortfall` instead.
            DomainError::InsufficientStock {
                requested,
                available,
            } => EngineError::Validation(format!(
                "requested {requested} exceeds available {available}"
            )),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => EngineError::Conflict(msg),
            StoreError::UniqueViolation(msg) => EngineError::Conflict(msg),
            StoreError::ForeignKeyViolation(msg) => EngineError::Validation(msg),
            StoreError::ConstraintViolation(msg) => EngineError::Validation(msg),
            StoreError::Unavailable(msg) | StoreError::Corrupt(msg) => {
                EngineError::StorageUnavailable(msg)
            }
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(EngineError::Conflict("lock timeout".into()).is_retryable());
        assert!(!EngineError::StorageUnavailable("down".into()).is_retryable());
        assert!(!EngineError::InsufficientStock(vec![]).is_retryable());
    }

    #[test]
    fn store_errors_never_leak_as_domain_kinds() {
        let err: EngineError = StoreError::Unavailable("pool closed".into()).into();
        assert_eq!(err.kind(), "storage_unavailable");

        let err: EngineError = StoreError::Corrupt("bad status".into()).into();
        assert_eq!(err.kind(), "storage_unavailable");

        let err: EngineError = StoreError::Conflict("55P03".into()).into();
        assert_eq!(err.kind(), "conflict");
    }

    #[test]
    fn single_shortfall_exposes_product_id() {
        let id = ProductId::new();
        let err = EngineError::InsufficientStock(vec![StockShortfall {
            product_id: id,
            requested: 2,
            available: 1,
        }]);
        assert_eq!(err.product_id(), Some(id));
        assert_eq!(err.kind(), "insufficient_stock");
    }

    #[test]
    fn domain_transition_errors_keep_their_kind() {
        let err: EngineError = DomainError::invalid_transition("delivered -> pending").into();
        assert_eq!(err.kind(), "invalid_transition");
    }
}
