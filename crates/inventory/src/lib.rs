//! Stock ledger rules.
//!
//! This crate contains the business rules for per-product stock, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage). The
//! storage layer persists `StockLevel` values but can only obtain them through
//! the transitions defined here, which keeps the zero floor and the derived
//! availability flag in one place.

pub mod stock;

pub use stock::{ExpectedStock, StockLevel, StockOverride};
