use axum::{Router, routing::get};

pub mod orders;
pub mod products;
pub mod promotions;
pub mod system;

/// Router for all endpoints that need a caller identity.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/orders", orders::router())
        .route("/users/:id/orders", get(orders::list_user_orders))
        .nest("/products", products::router())
        .nest("/boost-requests", promotions::requests_router())
        .nest("/boost-plans", promotions::plans_router())
        .nest("/settings", promotions::settings_router())
}
