use std::sync::Arc;

use kudimall_events::EventBus;

use super::*;
use crate::error::ServiceError;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_decrements_within_stock_are_exact() {
    let h = Harness::new();
    let product = h.seed_product(VendorId::new(), 1_000, 100).await;

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let ledger = Arc::clone(&h.ledger);
        let id = product.id();
        tasks.push(tokio::spawn(async move {
            ledger.decrement_stock(id, 3, None).await
        }));
    }
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome.clamped, 0);
    }

    assert_eq!(h.stock(product.id()).await, 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_demand_beyond_stock_ends_at_zero() {
    let h = Harness::new();
    let product = h.seed_product(VendorId::new(), 1_000, 10).await;

    let mut tasks = Vec::new();
    for _ in 0..15 {
        let ledger = Arc::clone(&h.ledger);
        let id = product.id();
        tasks.push(tokio::spawn(async move {
            ledger.decrement_stock(id, 1, None).await
        }));
    }
    let mut clamped = 0;
    for task in tasks {
        clamped += task.await.unwrap().unwrap().clamped;
    }

    assert_eq!(h.stock(product.id()).await, 0);
    assert_eq!(clamped, 5);
}

#[tokio::test]
async fn decrement_publishes_low_stock_event() {
    let h = Harness::new();
    let product = h.seed_product(VendorId::new(), 1_000, 10).await;
    let sub = h.bus.subscribe();

    let outcome = h.ledger.decrement_stock(product.id(), 6, None).await.unwrap();
    assert_eq!((outcome.previous, outcome.new_stock), (10, 4));
    assert!(outcome.low_stock);
    assert_eq!(outcome.attempts, 1);

    let events = sub.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type(), "inventory.stock_decremented");
    assert_eq!(events[0].aggregate_id(), *product.id().as_uuid());
    assert_eq!(events[0].payload()["StockDecremented"]["low_stock"], true);
    assert_eq!(events[0].payload()["StockDecremented"]["new_stock"], 4);
}

#[tokio::test]
async fn oversell_is_clamped_and_reported() {
    let h = Harness::new();
    let product = h.seed_product(VendorId::new(), 1_000, 2).await;

    let outcome = h.ledger.decrement_stock(product.id(), 5, None).await.unwrap();
    assert_eq!(outcome.new_stock, 0);
    assert_eq!(outcome.clamped, 3);
}

#[tokio::test]
async fn invalid_decrements_are_rejected() {
    let h = Harness::new();
    let product = h.seed_product(VendorId::new(), 1_000, 2).await;

    assert!(matches!(
        h.ledger.decrement_stock(product.id(), 0, None).await,
        Err(ServiceError::Validation(_))
    ));
    assert!(matches!(
        h.ledger.decrement_stock(ProductId::new(), 1, None).await,
        Err(ServiceError::NotFound(_))
    ));
    assert_eq!(h.stock(product.id()).await, 2);
}

#[tokio::test]
async fn lost_races_are_retried_up_to_the_bound() {
    let store = Arc::new(FlakyStore::new(StoreError::Concurrency("raced".to_string())));
    let config = InventoryConfig {
        max_stock_retries: 3,
        ..InventoryConfig::default()
    };
    let h = Harness::with_store(store.clone(), &config);
    let product = h.seed_product(VendorId::new(), 1_000, 10).await;
    store.break_stock_of(product.id());

    let err = h.ledger.decrement_stock(product.id(), 1, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::Concurrency(_)));
    assert_eq!(store.cas_calls(), 3);
    assert_eq!(h.stock(product.id()).await, 10);
}

#[tokio::test]
async fn only_the_owning_vendor_or_an_admin_sets_stock() {
    let h = Harness::new();
    let owner = vendor();
    let product = h.seed_product(owner_vendor_id(&owner), 1_000, 10).await;

    let change = h.ledger.set_stock(&owner, product.id(), 25).await.unwrap();
    assert_eq!((change.previous, change.new_stock), (10, 25));

    assert!(matches!(
        h.ledger.set_stock(&vendor(), product.id(), 1).await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        h.ledger.set_stock(&customer(), product.id(), 1).await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        h.ledger.set_stock(&owner, product.id(), -1).await,
        Err(ServiceError::Validation(_))
    ));

    h.ledger.set_stock(&admin(), product.id(), 7).await.unwrap();
    assert_eq!(h.stock(product.id()).await, 7);
}
