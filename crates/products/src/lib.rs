//! Product catalog records.
//!
//! Products are created once (seed or admin), identified by an immutable id and
//! a stable URL slug, and carry the stock level owned by the stock ledger.

pub mod product;

pub use product::{validate_slug, NewProduct, Product};
