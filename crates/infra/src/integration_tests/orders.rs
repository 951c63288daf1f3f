use std::sync::Arc;

use kudimall_events::EventBus;
use kudimall_sales::DEFAULT_CUSTOMER_NAME;

use super::*;
use crate::error::ServiceError;
use crate::services::AdjustmentOutcome;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_orders_of_six_and_five_on_ten_leave_zero() {
    let h = Arc::new(Harness::new());
    let product = h.seed_product(VendorId::new(), 2_000, 10).await;
    let (alice, bob) = (customer(), customer());

    let a = {
        let h = Arc::clone(&h);
        let cmd = checkout(alice.user_id, vec![line(&product, 6)], OrderStatus::Processing);
        tokio::spawn(async move { h.orders.place_order(&alice, cmd).await })
    };
    let b = {
        let h = Arc::clone(&h);
        let cmd = checkout(bob.user_id, vec![line(&product, 5)], OrderStatus::Processing);
        tokio::spawn(async move { h.orders.place_order(&bob, cmd).await })
    };
    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_eq!(h.stock(product.id()).await, 0);
    assert_eq!(a.order.inventory_status, InventoryStatus::Adjusted);
    assert_eq!(b.order.inventory_status, InventoryStatus::Adjusted);

    let clamped: i64 = a
        .adjustments
        .iter()
        .chain(&b.adjustments)
        .map(|adj| match &adj.outcome {
            AdjustmentOutcome::Decremented(outcome) => outcome.clamped,
            AdjustmentOutcome::Failed { error } => panic!("decrement failed: {error}"),
        })
        .sum();
    assert_eq!(clamped, 1);
}

#[tokio::test]
async fn item_price_is_a_snapshot() {
    let h = Harness::new();
    let product = h.seed_product(VendorId::new(), 2_000, 10).await;
    let buyer = customer();

    let receipt = h
        .orders
        .place_order(
            &buyer,
            checkout(buyer.user_id, vec![line(&product, 3)], OrderStatus::Processing),
        )
        .await
        .unwrap();
    assert_eq!(receipt.order.total_amount, Money::from_minor(6_000));

    h.store
        .update_price(product.id(), Money::from_minor(2_500))
        .await
        .unwrap();

    let stored = h.orders.get_order(&buyer, receipt.order.id).await.unwrap();
    assert_eq!(stored.items.len(), 1);
    assert_eq!(stored.items[0].price_at_purchase, Money::from_minor(2_000));
    assert_eq!(stored.items[0].product_name, "Kente stole");
    assert_eq!(stored.total_amount, Money::from_minor(6_000));
    assert_eq!(h.stock(product.id()).await, 7);
}

#[tokio::test]
async fn successful_order_clears_cart_and_confirms() {
    let h = Harness::new();
    let product = h.seed_product(VendorId::new(), 1_500, 10).await;
    let buyer = customer();
    h.carts
        .put_lines(buyer.user_id, vec![line(&product, 2)])
        .unwrap();
    let sub = h.bus.subscribe();

    let receipt = h
        .orders
        .place_order(
            &buyer,
            checkout(buyer.user_id, vec![line(&product, 2)], OrderStatus::Pending),
        )
        .await
        .unwrap();

    assert!(h.carts.lines(buyer.user_id).unwrap().is_empty());

    let sent = h.notifier.wait_for(1).await;
    assert_eq!(sent[0].order_id, receipt.order.id);
    assert_eq!(sent[0].customer_name, DEFAULT_CUSTOMER_NAME);
    assert_eq!(sent[0].customer_phone.as_str(), "+233241234567");
    assert_eq!(sent[0].total_amount, Money::from_minor(3_000));

    let placed: Vec<_> = sub
        .drain()
        .into_iter()
        .filter(|e| e.event_type() == "sales.order.placed")
        .collect();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].aggregate_id(), *receipt.order.id.as_uuid());
}

#[tokio::test]
async fn failed_payment_touches_no_stock_and_sends_nothing() {
    let h = Harness::new();
    let product = h.seed_product(VendorId::new(), 1_500, 10).await;
    let buyer = customer();
    h.carts
        .put_lines(buyer.user_id, vec![line(&product, 4)])
        .unwrap();

    for status in [OrderStatus::PaymentFailed, OrderStatus::Cancelled] {
        let receipt = h
            .orders
            .place_order(&buyer, checkout(buyer.user_id, vec![line(&product, 4)], status))
            .await
            .unwrap();
        assert_eq!(receipt.order.status, status);
        assert_eq!(receipt.order.inventory_status, InventoryStatus::NotApplicable);
        assert!(receipt.adjustments.is_empty());
    }

    tokio::time::sleep(StdDuration::from_millis(20)).await;
    assert_eq!(h.stock(product.id()).await, 10);
    assert!(h.notifier.sent().is_empty());
    assert_eq!(h.carts.lines(buyer.user_id).unwrap().len(), 1);
    assert_eq!(h.orders.orders_for_user(&buyer, buyer.user_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn rejected_checkouts_leave_no_trace() {
    let h = Harness::new();
    let product = h.seed_product(VendorId::new(), 1_500, 10).await;
    let buyer = customer();

    let shipped = checkout(buyer.user_id, vec![line(&product, 1)], OrderStatus::Shipped);
    let empty = checkout(buyer.user_id, Vec::new(), OrderStatus::Processing);
    let mut zero_qty = checkout(buyer.user_id, vec![line(&product, 1)], OrderStatus::Processing);
    zero_qty.items[0].quantity = 0;

    for cmd in [shipped, empty, zero_qty] {
        let err = h.orders.place_order(&buyer, cmd).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");
    }

    let mut unknown = checkout(buyer.user_id, vec![line(&product, 1)], OrderStatus::Processing);
    unknown.items.push(CartLine {
        product_id: ProductId::new(),
        quantity: 1,
        price_snapshot: Money::from_minor(100),
    });
    assert!(matches!(
        h.orders.place_order(&buyer, unknown).await,
        Err(ServiceError::NotFound(_))
    ));

    assert!(h.orders.orders_for_user(&buyer, buyer.user_id).await.unwrap().is_empty());
    assert_eq!(h.stock(product.id()).await, 10);
}

#[tokio::test]
async fn unusable_phone_places_order_without_confirmation() {
    let h = Harness::new();
    let product = h.seed_product(VendorId::new(), 1_500, 10).await;
    let buyer = customer();
    h.carts
        .put_lines(buyer.user_id, vec![line(&product, 2)])
        .unwrap();

    let mut cmd = checkout(buyer.user_id, vec![line(&product, 2)], OrderStatus::Processing);
    cmd.customer_phone = "233241234567".to_string();
    let receipt = h.orders.place_order(&buyer, cmd).await.unwrap();

    assert_eq!(receipt.order.inventory_status, InventoryStatus::Adjusted);
    assert_eq!(h.stock(product.id()).await, 8);
    assert!(h.carts.lines(buyer.user_id).unwrap().is_empty());
    assert_eq!(h.orders.orders_for_user(&buyer, buyer.user_id).await.unwrap().len(), 1);

    tokio::time::sleep(StdDuration::from_millis(20)).await;
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn failed_decrement_flags_order_for_reconciliation() {
    let store = Arc::new(FlakyStore::new(StoreError::Backend("connection reset".to_string())));
    let h = Harness::with_store(store.clone(), &InventoryConfig::default());
    let vendor_id = VendorId::new();
    let healthy = h.seed_product(vendor_id, 1_000, 10).await;
    let broken = h.seed_product(vendor_id, 1_000, 10).await;
    store.break_stock_of(broken.id());
    let buyer = customer();

    let receipt = h
        .orders
        .place_order(
            &buyer,
            checkout(
                buyer.user_id,
                vec![line(&healthy, 2), line(&broken, 3)],
                OrderStatus::Processing,
            ),
        )
        .await
        .unwrap();

    assert_eq!(receipt.order.inventory_status, InventoryStatus::NeedsReconciliation);
    assert!(receipt.adjustments[0].succeeded());
    assert!(!receipt.adjustments[1].succeeded());
    assert_eq!(h.stock(healthy.id()).await, 8);
    assert_eq!(h.stock(broken.id()).await, 10);

    let stored = h.orders.get_order(&buyer, receipt.order.id).await.unwrap();
    assert_eq!(stored.items.len(), 2);
    assert_eq!(stored.inventory_status, InventoryStatus::NeedsReconciliation);
}

#[tokio::test]
async fn customers_order_only_for_themselves() {
    let h = Harness::new();
    let product = h.seed_product(VendorId::new(), 1_000, 10).await;
    let (buyer, other) = (customer(), customer());

    let err = h
        .orders
        .place_order(
            &other,
            checkout(buyer.user_id, vec![line(&product, 1)], OrderStatus::Processing),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = h
        .orders
        .place_order(
            &vendor(),
            checkout(buyer.user_id, vec![line(&product, 1)], OrderStatus::Processing),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    assert_eq!(h.stock(product.id()).await, 10);
}

#[tokio::test]
async fn order_visibility() {
    let h = Harness::new();
    let seller = vendor();
    let product = h.seed_product(owner_vendor_id(&seller), 1_000, 10).await;
    let buyer = customer();
    let receipt = h
        .orders
        .place_order(
            &buyer,
            checkout(buyer.user_id, vec![line(&product, 1)], OrderStatus::Processing),
        )
        .await
        .unwrap();
    let id = receipt.order.id;

    assert!(h.orders.get_order(&buyer, id).await.is_ok());
    assert!(h.orders.get_order(&admin(), id).await.is_ok());
    assert!(h.orders.get_order(&seller, id).await.is_ok());
    assert!(matches!(
        h.orders.get_order(&customer(), id).await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        h.orders.get_order(&vendor(), id).await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        h.orders.orders_for_user(&customer(), buyer.user_id).await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        h.orders.get_order(&buyer, OrderId::new()).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn fulfillment_only_moves_forward() {
    let h = Harness::new();
    let seller = vendor();
    let product = h.seed_product(owner_vendor_id(&seller), 1_000, 10).await;
    let buyer = customer();
    let id = h
        .orders
        .place_order(
            &buyer,
            checkout(buyer.user_id, vec![line(&product, 1)], OrderStatus::Pending),
        )
        .await
        .unwrap()
        .order
        .id;

    let order = h.orders.update_status(&seller, id, OrderStatus::Processing).await.unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    h.orders.update_status(&seller, id, OrderStatus::Shipped).await.unwrap();

    assert!(matches!(
        h.orders.update_status(&seller, id, OrderStatus::Pending).await,
        Err(ServiceError::Conflict(_))
    ));
    assert!(matches!(
        h.orders.update_status(&vendor(), id, OrderStatus::Delivered).await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        h.orders.update_status(&buyer, id, OrderStatus::Delivered).await,
        Err(ServiceError::Forbidden(_))
    ));

    let delivered = h.orders.update_status(&admin(), id, OrderStatus::Delivered).await.unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert!(matches!(
        h.orders.update_status(&admin(), id, OrderStatus::Cancelled).await,
        Err(ServiceError::Conflict(_))
    ));
    assert_eq!(h.orders.get_order(&buyer, id).await.unwrap().status, OrderStatus::Delivered);
}
