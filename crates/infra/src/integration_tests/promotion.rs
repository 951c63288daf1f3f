use std::sync::Arc;

use chrono::Duration;
use kudimall_catalog::{BoostPlanChanges, BoostStatus};
use kudimall_events::EventBus;

use super::*;
use crate::error::ServiceError;

#[tokio::test]
async fn second_request_while_pending_conflicts_and_changes_nothing() {
    let h = Harness::new();
    let seller = vendor();
    let product = h.seed_product(owner_vendor_id(&seller), 5_000, 3).await;
    let plan = h.seed_plan(7).await;

    let first = h
        .promotions
        .request_boost(&seller, product.id(), plan.id)
        .await
        .unwrap();
    assert_eq!(h.promotions.boost_status(product.id()).await.unwrap(), BoostStatus::Requested);
    let before = h.product(product.id()).await;

    let err = h
        .promotions
        .request_boost(&seller, product.id(), plan.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    assert_eq!(h.product(product.id()).await, before);
    let pending = h
        .promotions
        .list_boost_requests(&admin(), Some(BoostRequestStatus::Pending), Pagination::default())
        .await
        .unwrap();
    assert_eq!(pending.total, 1);
    assert_eq!(pending.requests[0].id, first.id);
}

#[tokio::test]
async fn seven_day_boost_expires_without_a_sweep() {
    let h = Harness::new();
    let seller = vendor();
    let product = h.seed_product(owner_vendor_id(&seller), 5_000, 3).await;
    let plan = h.seed_plan(7).await;
    let sub = h.bus.subscribe();

    let request = h
        .promotions
        .request_boost(&seller, product.id(), plan.id)
        .await
        .unwrap();
    let decision = h.promotions.approve_boost(&admin(), request.id).await.unwrap();

    assert_eq!(decision.request.status, BoostRequestStatus::Approved);
    assert_eq!(decision.product.boosted_until(), Some(t0() + Duration::days(7)));
    assert!(decision.product.is_boosted());
    assert!(h.promotions.is_effectively_boosted(product.id()).await.unwrap());
    assert_eq!(h.promotions.boost_status(product.id()).await.unwrap(), BoostStatus::Active);
    assert_eq!(h.promotions.featured_products(None).await.unwrap().len(), 1);

    h.clock.advance(Duration::days(8));
    assert!(!h.promotions.is_effectively_boosted(product.id()).await.unwrap());
    assert_eq!(h.promotions.boost_status(product.id()).await.unwrap(), BoostStatus::Expired);
    assert!(h.promotions.featured_products(None).await.unwrap().is_empty());

    let types: Vec<String> = sub.drain().iter().map(|e| e.event_type().to_string()).collect();
    assert_eq!(types, ["catalog.boost.requested", "catalog.boost.approved"]);
}

#[tokio::test]
async fn rejection_clears_the_request() {
    let h = Harness::new();
    let seller = vendor();
    let product = h.seed_product(owner_vendor_id(&seller), 5_000, 3).await;
    let plan = h.seed_plan(14).await;

    let request = h
        .promotions
        .request_boost(&seller, product.id(), plan.id)
        .await
        .unwrap();
    let decision = h.promotions.reject_boost(&admin(), request.id).await.unwrap();
    assert_eq!(decision.request.status, BoostRequestStatus::Rejected);
    assert_eq!(h.promotions.boost_status(product.id()).await.unwrap(), BoostStatus::None);

    assert!(matches!(
        h.promotions.approve_boost(&admin(), request.id).await,
        Err(ServiceError::Conflict(_))
    ));
    // A fresh request is allowed once the previous one is decided.
    h.promotions
        .request_boost(&seller, product.id(), plan.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn approval_is_refused_once_the_cap_is_full() {
    let h = Harness::new();
    let seller = vendor();
    let vendor_id = owner_vendor_id(&seller);
    let a = h.seed_product(vendor_id, 5_000, 3).await;
    let b = h.seed_product(vendor_id, 5_000, 3).await;
    let plan = h.seed_plan(7).await;
    h.promotions
        .set_max_boosted_products(&admin(), Some(1))
        .await
        .unwrap();
    assert_eq!(h.promotions.max_boosted_products().await.unwrap(), Some(1));

    let ra = h.promotions.request_boost(&seller, a.id(), plan.id).await.unwrap();
    let rb = h.promotions.request_boost(&seller, b.id(), plan.id).await.unwrap();
    h.promotions.approve_boost(&admin(), ra.id).await.unwrap();

    let before = h.product(b.id()).await;
    assert!(matches!(
        h.promotions.approve_boost(&admin(), rb.id).await,
        Err(ServiceError::Conflict(_))
    ));
    assert_eq!(h.product(b.id()).await, before);
    assert_eq!(h.promotions.boost_status(b.id()).await.unwrap(), BoostStatus::Requested);

    h.clock.advance(Duration::days(8));
    h.promotions.approve_boost(&admin(), rb.id).await.unwrap();
    assert_eq!(h.promotions.featured_products(None).await.unwrap()[0].id(), b.id());

    // Lifting the cap makes every approval succeed.
    h.promotions.set_max_boosted_products(&admin(), None).await.unwrap();
    assert_eq!(h.promotions.max_boosted_products().await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stock_edit_and_approval_on_one_product_both_survive() {
    let h = Arc::new(Harness::new());
    let seller = vendor();
    let product_id = h.seed_product(owner_vendor_id(&seller), 5_000, 10).await.id();
    let plan = h.seed_plan(7).await;
    let request_id = h
        .promotions
        .request_boost(&seller, product_id, plan.id)
        .await
        .unwrap()
        .id;

    let edit = {
        let h = Arc::clone(&h);
        let seller = seller.clone();
        tokio::spawn(async move { h.ledger.set_stock(&seller, product_id, 42).await })
    };
    let approve = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.promotions.approve_boost(&admin(), request_id).await })
    };
    let sale = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.ledger.decrement_stock(product_id, 2, None).await })
    };
    edit.await.unwrap().unwrap();
    approve.await.unwrap().unwrap();
    let sale = sale.await.unwrap().unwrap();

    let stored = h.product(product_id).await;
    assert_eq!(stored.boosted_until(), Some(t0() + Duration::days(7)));
    assert!(stored.promotion().pending_request().is_none());
    // Either the sale saw the edit, or the edit overwrote the sale.
    assert!(stored.stock() == 40 || stored.stock() == 42, "stock {}", stored.stock());
    assert!(sale.previous == 10 || sale.previous == 42);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_for_one_product_leave_one_pending() {
    let h = Arc::new(Harness::new());
    let seller = vendor();
    let product_id = h.seed_product(owner_vendor_id(&seller), 5_000, 3).await.id();
    let plan_id = h.seed_plan(7).await.id;

    let attempts: Vec<_> = (0..16)
        .map(|_| {
            let h = Arc::clone(&h);
            let seller = seller.clone();
            tokio::spawn(async move { h.promotions.request_boost(&seller, product_id, plan_id).await })
        })
        .collect();

    let mut accepted = Vec::new();
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(request) => accepted.push(request),
            Err(ServiceError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(accepted.len(), 1);

    let pending = h
        .promotions
        .list_boost_requests(&admin(), Some(BoostRequestStatus::Pending), Pagination::default())
        .await
        .unwrap();
    assert_eq!(pending.total, 1);
    assert_eq!(pending.requests[0].id, accepted[0].id);
    assert_eq!(
        h.product(product_id).await.promotion().pending_request(),
        Some(accepted[0].id)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_respect_a_cap_of_one() {
    let h = Arc::new(Harness::new());
    let seller = vendor();
    let vendor_id = owner_vendor_id(&seller);
    let plan_id = h.seed_plan(7).await.id;
    h.promotions
        .set_max_boosted_products(&admin(), Some(1))
        .await
        .unwrap();

    let mut request_ids = Vec::new();
    for _ in 0..2 {
        let product_id = h.seed_product(vendor_id, 5_000, 3).await.id();
        let request = h
            .promotions
            .request_boost(&seller, product_id, plan_id)
            .await
            .unwrap();
        request_ids.push(request.id);
    }

    let approvals: Vec<_> = request_ids
        .into_iter()
        .map(|request_id| {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.promotions.approve_boost(&admin(), request_id).await })
        })
        .collect();

    let mut approved = 0;
    let mut refused = 0;
    for approval in approvals {
        match approval.await.unwrap() {
            Ok(_) => approved += 1,
            Err(ServiceError::Conflict(_)) => refused += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!((approved, refused), (1, 1));
    assert_eq!(h.promotions.featured_products(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn only_the_owning_vendor_requests_boosts() {
    let h = Harness::new();
    let seller = vendor();
    let product = h.seed_product(owner_vendor_id(&seller), 5_000, 3).await;
    let plan = h.seed_plan(7).await;

    for caller in [vendor(), admin(), customer()] {
        assert!(matches!(
            h.promotions.request_boost(&caller, product.id(), plan.id).await,
            Err(ServiceError::Forbidden(_))
        ));
    }
    assert!(matches!(
        h.promotions.request_boost(&seller, product.id(), BoostPlanId::new()).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        h.promotions.request_boost(&seller, ProductId::new(), plan.id).await,
        Err(ServiceError::NotFound(_))
    ));

    let retired = BoostPlan::new(BoostPlanId::new(), "Old plan", None, 3, Money::from_minor(100))
        .unwrap()
        .deactivated();
    h.store.insert_plan(&retired).await.unwrap();
    assert!(matches!(
        h.promotions.request_boost(&seller, product.id(), retired.id).await,
        Err(ServiceError::Validation(_))
    ));
    assert_eq!(h.promotions.boost_status(product.id()).await.unwrap(), BoostStatus::None);

    let request = h
        .promotions
        .request_boost(&seller, product.id(), plan.id)
        .await
        .unwrap();
    assert!(matches!(
        h.promotions.approve_boost(&seller, request.id).await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        h.promotions
            .list_boost_requests(&seller, None, Pagination::default())
            .await,
        Err(ServiceError::Forbidden(_))
    ));
}

#[tokio::test]
async fn featured_lists_longest_window_first() {
    let h = Harness::new();
    let seller = vendor();
    let vendor_id = owner_vendor_id(&seller);
    let short = h.seed_product(vendor_id, 5_000, 3).await;
    let long = h.seed_product(vendor_id, 5_000, 3).await;
    h.seed_product(vendor_id, 5_000, 3).await;
    let week = h.seed_plan(7).await;
    let month = h.seed_plan(30).await;

    let r1 = h.promotions.request_boost(&seller, short.id(), week.id).await.unwrap();
    let r2 = h.promotions.request_boost(&seller, long.id(), month.id).await.unwrap();
    h.promotions.approve_boost(&admin(), r1.id).await.unwrap();
    h.promotions.approve_boost(&admin(), r2.id).await.unwrap();

    let featured = h.promotions.featured_products(None).await.unwrap();
    let ids: Vec<ProductId> = featured.iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec![long.id(), short.id()]);
    assert_eq!(h.promotions.featured_products(Some(1)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn admins_manage_plans() {
    let h = Harness::new();
    let plan = h
        .promotions
        .create_plan(&admin(), "Weekend spotlight", Some("Fri-Sun".to_string()), 3, Money::from_minor(1_000))
        .await
        .unwrap();
    h.store
        .insert_plan(
            &BoostPlan::new(BoostPlanId::new(), "Legacy", None, 5, Money::from_minor(10))
                .unwrap()
                .deactivated(),
        )
        .await
        .unwrap();

    let active = h.promotions.active_plans().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, plan.id);

    assert!(matches!(
        h.promotions
            .create_plan(&vendor(), "Sneaky", None, 3, Money::ZERO)
            .await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        h.promotions
            .create_plan(&admin(), "ok", None, 3, Money::ZERO)
            .await,
        Err(ServiceError::Validation(_))
    ));
}

#[tokio::test]
async fn retired_plans_refuse_new_requests() {
    let h = Harness::new();
    let seller = vendor();
    let product = h.seed_product(owner_vendor_id(&seller), 5_000, 3).await;
    let plan = h.seed_plan(7).await;

    let retired = h.promotions.deactivate_plan(&admin(), plan.id).await.unwrap();
    assert!(!retired.is_active);
    assert!(h.promotions.active_plans().await.unwrap().is_empty());
    assert_eq!(h.promotions.all_plans(&admin()).await.unwrap().len(), 1);

    let before = h.product(product.id()).await;
    assert!(matches!(
        h.promotions.request_boost(&seller, product.id(), plan.id).await,
        Err(ServiceError::Validation(_))
    ));
    assert_eq!(h.product(product.id()).await, before);
    assert_eq!(h.promotions.boost_status(product.id()).await.unwrap(), BoostStatus::None);
}

#[tokio::test]
async fn plan_edits_apply_to_later_requests_only() {
    let h = Harness::new();
    let seller = vendor();
    let vendor_id = owner_vendor_id(&seller);
    let early = h.seed_product(vendor_id, 5_000, 3).await;
    let late = h.seed_product(vendor_id, 5_000, 3).await;
    let plan = h.seed_plan(7).await;

    let first = h.promotions.request_boost(&seller, early.id(), plan.id).await.unwrap();
    let edited = h
        .promotions
        .update_plan(
            &admin(),
            plan.id,
            BoostPlanChanges {
                duration_days: Some(14),
                price: Some(Money::from_minor(4_000)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.duration_days, 14);
    assert_eq!(edited.name, plan.name);

    let second = h.promotions.request_boost(&seller, late.id(), plan.id).await.unwrap();
    assert_eq!(second.plan_duration_days, 14);

    h.promotions.approve_boost(&admin(), first.id).await.unwrap();
    assert_eq!(h.product(early.id()).await.boosted_until(), Some(t0() + Duration::days(7)));

    assert!(matches!(
        h.promotions
            .update_plan(&vendor(), plan.id, BoostPlanChanges::default())
            .await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        h.promotions
            .update_plan(
                &admin(),
                plan.id,
                BoostPlanChanges {
                    duration_days: Some(0),
                    ..Default::default()
                },
            )
            .await,
        Err(ServiceError::Validation(_))
    ));
    assert!(matches!(
        h.promotions.deactivate_plan(&admin(), BoostPlanId::new()).await,
        Err(ServiceError::NotFound(_))
    ));
}
