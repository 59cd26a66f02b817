//! Product reviews.
//!
//! At most one review per (product, customer email). The verified-purchase
//! flag is decided once, when the review is created, and never recomputed.

pub mod review;

pub use review::{normalize_email, NewReview, Rating, Review, MAX_COMMENT_CHARS};
