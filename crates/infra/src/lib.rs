//! Inventory/order consistency engine.
//!
//! - `store`: transactional storage boundary with in-memory and Postgres backends
//! - `stock_ledger`: sole writer of per-product stock
//! - `order_placement`: all-or-nothing checkout with bounded conflict retries
//! - `inventory_adjuster`: operator restock / correction
//! - `review_verification`: verified-purchase tagging and review uniqueness
//! - `catalog`: product creation, lookup and guarded deletion
//!
//! Services are generic over [`store::Store`]; [`Engine`] wires them to one
//! shared handle.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod inventory_adjuster;
pub mod order_placement;
pub mod review_verification;
pub mod stock_ledger;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use catalog::CatalogService;
pub use config::{ConfigError, EngineConfig};
pub use engine::{Engine, StoreHandle};
pub use error::{EngineError, EngineResult, StockShortfall};
pub use inventory_adjuster::InventoryAdjuster;
pub use order_placement::{OrderPlacementCoordinator, PlaceOrder, PlacementPolicy};
pub use review_verification::ReviewVerificationService;
pub use stock_ledger::{StockLedger, StockSnapshot};
