//! Service wiring: picks the store backend at startup and builds the
//! marketplace services over it.

use std::sync::Arc;

use anyhow::Context;
use serde_json::Value as JsonValue;

use kudimall_core::{Clock, SystemClock};
use kudimall_events::{EventBus, EventEnvelope, InMemoryEventBus};
use kudimall_infra::{
    InMemoryCartStore, InMemoryStore, InventoryLedger, MarketBus, MarketplaceConfig,
    MarketplaceStore, OrderService, PostgresStore, PromotionService, TracingNotifier,
};

/// Which store the services run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::InMemory => "in_memory",
            StoreBackend::Postgres => "postgres",
        }
    }
}

pub struct AppServices {
    pub backend: StoreBackend,
    pub store: Arc<dyn MarketplaceStore>,
    pub bus: MarketBus,
    pub clock: Arc<dyn Clock>,
    pub ledger: Arc<InventoryLedger<MarketBus>>,
    pub orders: OrderService<MarketBus>,
    pub promotions: PromotionService<MarketBus>,
}

impl AppServices {
    /// Wire the services over an already-constructed store.
    pub fn new(
        backend: StoreBackend,
        store: Arc<dyn MarketplaceStore>,
        clock: Arc<dyn Clock>,
        config: &MarketplaceConfig,
    ) -> Self {
        let bus: MarketBus = Arc::new(InMemoryEventBus::new());
        let ledger = Arc::new(InventoryLedger::new(
            store.clone(),
            bus.clone(),
            clock.clone(),
            &config.inventory,
        ));
        let orders = OrderService::new(
            store.clone(),
            ledger.clone(),
            Arc::new(InMemoryCartStore::new()),
            Arc::new(TracingNotifier),
            bus.clone(),
            clock.clone(),
        );
        let promotions = PromotionService::new(store.clone(), bus.clone(), clock.clone());

        Self {
            backend,
            store,
            bus,
            clock,
            ledger,
            orders,
            promotions,
        }
    }

    /// In-memory services for tests and local runs.
    pub fn in_memory(store: Arc<InMemoryStore>, config: &MarketplaceConfig) -> Self {
        Self::new(StoreBackend::InMemory, store, Arc::new(SystemClock), config)
    }
}

/// Build services from configuration.
///
/// Backend selection (matches `database_url`):
/// - unset: in-memory store (dev/test)
/// - set: Postgres, schema applied on startup
pub async fn build_services(config: &MarketplaceConfig) -> anyhow::Result<AppServices> {
    let (backend, store): (StoreBackend, Arc<dyn MarketplaceStore>) = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url)
                .await
                .context("failed to connect to Postgres")?;
            store
                .apply_schema()
                .await
                .context("failed to apply marketplace schema")?;
            let store: Arc<dyn MarketplaceStore> = Arc::new(store);
            (StoreBackend::Postgres, store)
        }
        None => {
            tracing::warn!("database_url not set; using in-memory store");
            let store: Arc<dyn MarketplaceStore> = Arc::new(InMemoryStore::new());
            (StoreBackend::InMemory, store)
        }
    };

    if let Some(limit) = config.promotion.max_boosted_products {
        store
            .set_max_boosted_products(Some(limit))
            .await
            .context("failed to seed max_boosted_products")?;
    }

    let services = AppServices::new(backend, store, Arc::new(SystemClock), config);
    spawn_low_stock_alerts(&services.bus);
    tracing::info!(backend = services.backend.as_str(), "marketplace services ready");
    Ok(services)
}

/// Log a vendor-facing alert for every decrement that lands at or below the
/// low-stock threshold.
fn spawn_low_stock_alerts(bus: &MarketBus) {
    let sub = bus.subscribe();
    tokio::task::spawn_blocking(move || {
        while let Ok(envelope) = sub.recv() {
            if is_low_stock(&envelope) {
                tracing::warn!(
                    product_id = %envelope.aggregate_id(),
                    stock = %envelope.payload()["StockDecremented"]["new_stock"],
                    "low stock alert"
                );
            }
        }
    });
}

fn is_low_stock(envelope: &EventEnvelope<JsonValue>) -> bool {
    envelope.event_type() == "inventory.stock_decremented"
        && envelope.payload()["StockDecremented"]["low_stock"] == true
}
