use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kudimall_catalog::{BoostPlanChanges, BoostRequestStatus, BoostStatus, Product};
use kudimall_core::{Money, ProductId, UserId, VendorId};
use kudimall_sales::{CartLine, OrderStatus, PaymentMethod, PlaceOrder, ShippingAddress};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CartLineRequest {
    pub product_id: String,
    pub quantity: i64,
    /// Unit price shown at checkout, in pesewas.
    pub price_snapshot: u64,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    /// Admins may place an order on a customer's behalf; defaults to the caller.
    pub user_id: Option<String>,
    pub items: Vec<CartLineRequest>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    /// Outcome reported by the payment step, e.g. "Processing" or "Payment Failed".
    pub status: String,
    pub customer_name: Option<String>,
    pub customer_phone: String,
}

impl PlaceOrderRequest {
    pub fn into_command(self, caller: UserId) -> Result<PlaceOrder, axum::response::Response> {
        let user_id = match &self.user_id {
            Some(raw) => errors::parse_id::<UserId>(raw, "user")?,
            None => caller,
        };
        let payment_method = PaymentMethod::parse(&self.payment_method).ok_or_else(|| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_payment_method",
                format!("unknown payment method '{}'", self.payment_method),
            )
        })?;
        let initial_status = parse_status(&self.status)?;

        let items = self
            .items
            .iter()
            .map(|line| {
                Ok(CartLine {
                    product_id: errors::parse_id::<ProductId>(&line.product_id, "product")?,
                    quantity: line.quantity,
                    price_snapshot: Money::from_minor(line.price_snapshot),
                })
            })
            .collect::<Result<Vec<_>, axum::response::Response>>()?;

        Ok(PlaceOrder {
            user_id,
            items,
            shipping_address: self.shipping_address,
            payment_method,
            transaction_id: self.transaction_id,
            initial_status,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub stock: i64,
}

#[derive(Debug, Deserialize)]
pub struct RequestBoostRequest {
    pub plan_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBoostPlanRequest {
    pub name: String,
    pub description: Option<String>,
    pub duration_days: u32,
    pub price_pesewas: u64,
}

#[derive(Debug, Deserialize)]
pub struct SetMaxBoostedProductsRequest {
    /// `null` removes the cap.
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct BoostRequestsQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBoostPlanRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration_days: Option<u32>,
    pub price_pesewas: Option<u64>,
    pub is_active: Option<bool>,
}

impl From<UpdateBoostPlanRequest> for BoostPlanChanges {
    fn from(body: UpdateBoostPlanRequest) -> Self {
        Self {
            name: body.name,
            description: body.description,
            duration_days: body.duration_days,
            price: body.price_pesewas.map(Money::from_minor),
            is_active: body.is_active,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BoostPlansQuery {
    /// Include retired plans; admin only.
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Deserialize)]
pub struct FeaturedQuery {
    pub limit: Option<usize>,
}

pub fn parse_status(raw: &str) -> Result<OrderStatus, axum::response::Response> {
    raw.parse::<OrderStatus>()
        .map_err(|msg| errors::json_error(StatusCode::BAD_REQUEST, "invalid_status", msg))
}

pub fn parse_request_status(
    raw: Option<&str>,
) -> Result<Option<BoostRequestStatus>, axum::response::Response> {
    raw.map(|s| {
        BoostRequestStatus::parse(s).ok_or_else(|| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_status",
                "status must be one of: pending, approved, rejected",
            )
        })
    })
    .transpose()
}

// -------------------------
// Response DTOs
// -------------------------

/// Storefront view of a product; promotion flags are evaluated at `now`.
#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub vendor_id: VendorId,
    pub name: String,
    pub price_pesewas: u64,
    pub stock: i64,
    pub is_boosted: bool,
    pub boosted_until: Option<DateTime<Utc>>,
    pub boost_status: BoostStatus,
}

impl ProductView {
    pub fn at(product: &Product, now: DateTime<Utc>) -> Self {
        Self {
            id: product.id(),
            vendor_id: product.vendor_id(),
            name: product.name().to_string(),
            price_pesewas: product.price().minor_units(),
            stock: product.stock(),
            is_boosted: product.effective_boosted(now),
            boosted_until: product.boosted_until(),
            boost_status: product.boost_status(now),
        }
    }
}
