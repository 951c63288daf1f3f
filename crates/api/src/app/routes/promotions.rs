use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};

use kudimall_auth::Principal;
use kudimall_core::{BoostPlanId, BoostRequestId, Money};
use kudimall_infra::{BoostDecision, Pagination};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn requests_router() -> Router {
    Router::new()
        .route("/", get(list_boost_requests))
        .route("/:id/approve", post(approve_boost))
        .route("/:id/reject", post(reject_boost))
}

pub fn plans_router() -> Router {
    Router::new()
        .route("/", get(list_plans).post(create_plan))
        .route("/:id", patch(update_plan).delete(deactivate_plan))
}

pub fn settings_router() -> Router {
    Router::new().route(
        "/max-boosted-products",
        get(get_max_boosted_products).put(set_max_boosted_products),
    )
}

pub async fn list_boost_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<dto::BoostRequestsQuery>,
) -> axum::response::Response {
    let status = match dto::parse_request_status(query.status.as_deref()) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let pagination = Pagination::new(query.limit, query.offset);
    match services
        .promotions
        .list_boost_requests(&principal, status, pagination)
        .await
    {
        Ok(page) => Json(page).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

fn decision_response(services: &AppServices, decision: BoostDecision) -> axum::response::Response {
    let now = services.clock.now();
    Json(serde_json::json!({
        "request": decision.request,
        "product": dto::ProductView::at(&decision.product, now),
    }))
    .into_response()
}

pub async fn approve_boost(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let request_id: BoostRequestId = match errors::parse_id(&id, "boost request") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.promotions.approve_boost(&principal, request_id).await {
        Ok(decision) => decision_response(&services, decision),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn reject_boost(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let request_id: BoostRequestId = match errors::parse_id(&id, "boost request") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.promotions.reject_boost(&principal, request_id).await {
        Ok(decision) => decision_response(&services, decision),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_plans(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<dto::BoostPlansQuery>,
) -> axum::response::Response {
    let plans = if query.all {
        services.promotions.all_plans(&principal).await
    } else {
        services.promotions.active_plans().await
    };
    match plans {
        Ok(plans) => Json(plans).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_plan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::CreateBoostPlanRequest>,
) -> axum::response::Response {
    match services
        .promotions
        .create_plan(
            &principal,
            &body.name,
            body.description,
            body.duration_days,
            Money::from_minor(body.price_pesewas),
        )
        .await
    {
        Ok(plan) => (StatusCode::CREATED, Json(plan)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_plan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateBoostPlanRequest>,
) -> axum::response::Response {
    let plan_id: BoostPlanId = match errors::parse_id(&id, "boost plan") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .promotions
        .update_plan(&principal, plan_id, body.into())
        .await
    {
        Ok(plan) => Json(plan).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Plans are retired rather than removed; past requests still name them.
pub async fn deactivate_plan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let plan_id: BoostPlanId = match errors::parse_id(&id, "boost plan") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.promotions.deactivate_plan(&principal, plan_id).await {
        Ok(plan) => Json(plan).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_max_boosted_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.promotions.max_boosted_products().await {
        Ok(limit) => Json(serde_json::json!({ "limit": limit })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn set_max_boosted_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::SetMaxBoostedProductsRequest>,
) -> axum::response::Response {
    match services
        .promotions
        .set_max_boosted_products(&principal, body.limit)
        .await
    {
        Ok(()) => Json(serde_json::json!({ "limit": body.limit })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
