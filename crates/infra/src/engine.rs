//! Explicitly constructed engine: one store handle shared by every service.

use std::sync::Arc;

use crate::catalog::CatalogService;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::inventory_adjuster::InventoryAdjuster;
use crate::order_placement::{OrderPlacementCoordinator, PlacementPolicy};
use crate::review_verification::ReviewVerificationService;
use crate::stock_ledger::StockLedger;
use crate::store::{InMemoryStore, PostgresStore, Store};

/// Shared, type-erased store handle.
pub type StoreHandle = Arc<dyn Store>;

#[derive(Clone)]
pub struct Engine {
    store: StoreHandle,
    pub catalog: CatalogService<StoreHandle>,
    pub ledger: StockLedger<StoreHandle>,
    pub orders: OrderPlacementCoordinator<StoreHandle>,
    pub inventory: InventoryAdjuster<StoreHandle>,
    pub reviews: ReviewVerificationService<StoreHandle>,
}

impl Engine {
    pub fn new(store: StoreHandle, policy: PlacementPolicy) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            ledger: StockLedger::new(store.clone()),
            orders: OrderPlacementCoordinator::with_policy(store.clone(), policy),
            inventory: InventoryAdjuster::new(store.clone()),
            reviews: ReviewVerificationService::new(store.clone()),
            store,
        }
    }

    /// Engine over a fresh in-memory store with default policy.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()), PlacementPolicy::default())
    }

    /// Open the store selected by `config`: Postgres when `database_url` is
    /// set (schema bootstrapped), in-memory otherwise.
    pub async fn open(config: &EngineConfig) -> EngineResult<Self> {
        let store: StoreHandle = match &config.database_url {
            Some(url) => {
                let store = PostgresStore::connect(
                    url,
                    config.database_max_connections,
                    config.lock_timeout,
                )
                .await?;
                store.ensure_schema().await?;
                tracing::info!(max_connections = config.database_max_connections, "using postgres store");
                Arc::new(store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store");
                Arc::new(InMemoryStore::with_lock_timeout(config.lock_timeout))
            }
        };
        Ok(Self::new(store, config.placement_policy()))
    }

    /// Release the store; later operations fail with `StorageUnavailable`.
    pub async fn close(&self) {
        self.store.close().await;
        tracing::info!("store closed");
    }
}
