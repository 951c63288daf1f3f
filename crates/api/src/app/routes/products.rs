use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use kudimall_auth::Principal;
use kudimall_core::{BoostPlanId, ProductId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/featured", get(featured_products))
        .route("/:id", get(get_product))
        .route("/:id/stock", get(get_stock).put(set_stock))
        .route("/:id/boost-requests", post(request_boost))
        .route("/:id/boost-status", get(boost_status))
}

pub async fn featured_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::FeaturedQuery>,
) -> axum::response::Response {
    match services.promotions.featured_products(query.limit).await {
        Ok(products) => {
            let now = services.clock.now();
            let views: Vec<dto::ProductView> = products
                .iter()
                .map(|p| dto::ProductView::at(p, now))
                .collect();
            Json(views).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.store.get_product(product_id).await {
        Ok(Some(product)) => Json(dto::ProductView::at(&product, services.clock.now())).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
        Err(e) => errors::service_error_to_response(e.into()),
    }
}

pub async fn get_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.stock_of(product_id).await {
        Ok(stock) => Json(serde_json::json!({
            "product_id": product_id,
            "stock": stock,
            "low_stock": services.ledger.low_stock_policy().is_low(stock),
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn set_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetStockRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.set_stock(&principal, product_id, body.stock).await {
        Ok(change) => Json(change).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn request_boost(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<dto::RequestBoostRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let plan_id: BoostPlanId = match errors::parse_id(&body.plan_id, "boost plan") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .promotions
        .request_boost(&principal, product_id, plan_id)
        .await
    {
        Ok(request) => (StatusCode::CREATED, Json(request)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn boost_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.promotions.boost_status(product_id).await {
        Ok(status) => Json(serde_json::json!({
            "product_id": product_id,
            "boost_status": status,
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
