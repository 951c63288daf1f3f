//! Postgres-backed marketplace store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate id, or a second pending boost request |
//! | Database (foreign key violation) | `23503` | `NotFound` | Order item or request references a missing product |
//! | Database (check constraint violation) | `23514` | `Domain(Validation)` | Negative stock, bad status text |
//! | RowNotFound | N/A | `NotFound` | Unexpected missing row |
//! | Other | N/A | `Backend` | Pool closed, network errors, etc. |
//!
//! ## Concurrency
//!
//! Stock writes are a single `UPDATE ... WHERE stock = $expected`; a zero row
//! count on an existing product is a lost race. Promotion writes lock the
//! product row (`FOR UPDATE`) and bump `promotion_version`, never touching
//! `stock`. Approvals additionally lock the `max_boosted_products` settings row
//! so two approvals cannot both take the last promotion slot.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use kudimall_catalog::{
    BoostCap, BoostPlan, BoostRequest, BoostRequestStatus, Product, Promotion,
};
use kudimall_core::{
    BoostPlanId, BoostRequestId, DomainError, ExpectedVersion, Money, OrderId, ProductId, UserId,
    VendorId,
};
use kudimall_inventory::validate_stock_level;
use kudimall_sales::{
    InventoryStatus, Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress,
};

use super::{
    BoostRequestPage, MarketplaceStore, Pagination, StoreError, StoreResult, decide_approval,
    decide_rejection,
};

const SCHEMA: &str = include_str!("../../migrations/0001_marketplace.sql");
const MAX_BOOSTED_PRODUCTS_KEY: &str = "max_boosted_products";

const PRODUCT_COLUMNS: &str = "id, vendor_id, name, price_pesewas, stock, \
     boosted_until, pending_boost_request, promotion_version";
const ORDER_COLUMNS: &str = "id, user_id, total_pesewas, status, order_date, shipping_address, \
     payment_method, transaction_id, inventory_status, version";
const REQUEST_COLUMNS: &str = "id, product_id, vendor_id, user_id, plan_duration_days, plan_price, \
     status, created_at, decided_at";

/// Postgres-backed marketplace store.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; multi-row writes run
/// in explicit transactions.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the schema if it is missing.
    #[instrument(skip(self), err)]
    pub async fn apply_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("apply_schema", e))?;
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }

    async fn load_items(&self, order_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<OrderItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, product_name, quantity, price_at_purchase
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_items", e))?;

        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let item = OrderItemRow::from_row(&row).map_err(|e| map_sqlx_error("decode_item", e))?;
            let order_id = item.order_id;
            items.entry(order_id).or_default().push(item.try_into()?);
        }
        Ok(items)
    }
}

async fn lock_product(
    tx: &mut Transaction<'static, Postgres>,
    id: ProductId,
) -> StoreResult<Product> {
    let row = sqlx::query(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_product", e))?
    .ok_or_else(|| StoreError::NotFound(format!("product {id}")))?;

    ProductRow::from_row(&row)
        .map_err(|e| map_sqlx_error("decode_product", e))?
        .try_into()
}

async fn lock_boost_request(
    tx: &mut Transaction<'static, Postgres>,
    id: BoostRequestId,
) -> StoreResult<BoostRequest> {
    let row = sqlx::query(&format!(
        "SELECT {REQUEST_COLUMNS} FROM boost_requests WHERE id = $1 FOR UPDATE"
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_boost_request", e))?
    .ok_or_else(|| StoreError::NotFound(format!("boost request {id}")))?;

    BoostRequestRow::from_row(&row)
        .map_err(|e| map_sqlx_error("decode_boost_request", e))?
        .try_into()
}

/// Write the promotion region, guarded by its version.
async fn write_promotion(
    tx: &mut Transaction<'static, Postgres>,
    product_id: ProductId,
    previous_version: u64,
    promotion: &Promotion,
) -> StoreResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET boosted_until = $2, pending_boost_request = $3, promotion_version = $4
        WHERE id = $1 AND promotion_version = $5
        "#,
    )
    .bind(product_id.as_uuid())
    .bind(promotion.boosted_until())
    .bind(promotion.pending_request().map(|r| *r.as_uuid()))
    .bind(promotion.version() as i64)
    .bind(previous_version as i64)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("write_promotion", e))?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Concurrency(format!(
            "promotion of product {product_id} changed (expected version {previous_version})"
        )));
    }
    Ok(())
}

async fn write_request_decision(
    tx: &mut Transaction<'static, Postgres>,
    request: &BoostRequest,
) -> StoreResult<()> {
    sqlx::query("UPDATE boost_requests SET status = $2, decided_at = $3 WHERE id = $1")
        .bind(request.id.as_uuid())
        .bind(request.status.as_str())
        .bind(request.decided_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("write_request_decision", e))?;
    Ok(())
}

fn limit_from_json(value: &serde_json::Value) -> StoreResult<Option<u32>> {
    match value.get("limit") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| StoreError::Backend(format!("invalid {MAX_BOOSTED_PRODUCTS_KEY} value: {v}"))),
    }
}

#[async_trait]
impl MarketplaceStore for PostgresStore {
    #[instrument(skip(self, product), fields(product_id = %product.id()), err)]
    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        let promotion = product.promotion();
        sqlx::query(
            r#"
            INSERT INTO products (
                id, vendor_id, name, price_pesewas, stock,
                boosted_until, pending_boost_request, promotion_version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id().as_uuid())
        .bind(product.vendor_id().as_uuid())
        .bind(product.name())
        .bind(money_to_i64(product.price())?)
        .bind(product.stock())
        .bind(promotion.boosted_until())
        .bind(promotion.pending_request().map(|r| *r.as_uuid()))
        .bind(promotion.version() as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;

        row.map(|row| {
            ProductRow::from_row(&row)
                .map_err(|e| map_sqlx_error("decode_product", e))?
                .try_into()
        })
        .transpose()
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter()
            .map(|row| {
                ProductRow::from_row(row)
                    .map_err(|e| map_sqlx_error("decode_product", e))?
                    .try_into()
            })
            .collect()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn compare_and_set_stock(
        &self,
        id: ProductId,
        expected_stock: i64,
        new_stock: i64,
    ) -> StoreResult<()> {
        validate_stock_level(new_stock)?;

        let result = sqlx::query("UPDATE products SET stock = $3 WHERE id = $1 AND stock = $2")
            .bind(id.as_uuid())
            .bind(expected_stock)
            .bind(new_stock)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("compare_and_set_stock", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("compare_and_set_stock", e))?;
        if exists {
            Err(StoreError::Concurrency(format!(
                "stock of product {id} changed (expected {expected_stock})"
            )))
        } else {
            Err(StoreError::NotFound(format!("product {id}")))
        }
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn set_stock(&self, id: ProductId, stock: i64) -> StoreResult<i64> {
        validate_stock_level(stock)?;

        let mut tx = self.begin().await?;
        let previous: i64 = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_stock", e))?
            .ok_or_else(|| StoreError::NotFound(format!("product {id}")))?;

        sqlx::query("UPDATE products SET stock = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(stock)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_stock", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(previous)
    }

    async fn update_price(&self, id: ProductId, price: Money) -> StoreResult<()> {
        let result = sqlx::query("UPDATE products SET price_pesewas = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(money_to_i64(price)?)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_price", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("product {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, order), fields(order_id = %order.id, item_count = order.items.len()), err)]
    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        if order.items.is_empty() {
            return Err(DomainError::invariant("an order must have at least one item").into());
        }
        let address = serde_json::to_value(&order.shipping_address)
            .map_err(|e| StoreError::Backend(format!("failed to encode shipping address: {e}")))?;

        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, total_pesewas, status, order_date, shipping_address,
                payment_method, transaction_id, inventory_status, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(money_to_i64(order.total_amount)?)
        .bind(order.status.as_str())
        .bind(order.order_date)
        .bind(&address)
        .bind(order.payment_method.as_str())
        .bind(order.transaction_id.as_deref())
        .bind(order.inventory_status.as_str())
        .bind(order.version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        for (idx, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, line_no, product_id, product_name, quantity, price_at_purchase
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind((idx + 1) as i32)
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(money_to_i64(item.price_at_purchase)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_item", e))?;
        }

        // Dropping `tx` on any error above rolls back the order row too.
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order_row = OrderRow::from_row(&row).map_err(|e| map_sqlx_error("decode_order", e))?;
        let mut items = self.load_items(&[order_row.id]).await?;
        let order_items = items.remove(&order_row.id).unwrap_or_default();
        Ok(Some(order_row.into_order(order_items)?))
    }

    async fn orders_for_user(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY order_date DESC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("orders_for_user", e))?;

        let order_rows = rows
            .iter()
            .map(|row| OrderRow::from_row(row).map_err(|e| map_sqlx_error("decode_order", e)))
            .collect::<StoreResult<Vec<_>>>()?;
        let ids: Vec<Uuid> = order_rows.iter().map(|o| o.id).collect();
        let mut items = self.load_items(&ids).await?;

        order_rows
            .into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect()
    }

    #[instrument(skip(self, order), fields(order_id = %order.id, status = %order.status), err)]
    async fn update_order_status(
        &self,
        order: &Order,
        expected: ExpectedVersion,
    ) -> StoreResult<()> {
        let result = match expected {
            ExpectedVersion::Exact(version) => {
                sqlx::query("UPDATE orders SET status = $2, version = $3 WHERE id = $1 AND version = $4")
                    .bind(order.id.as_uuid())
                    .bind(order.status.as_str())
                    .bind(order.version as i64)
                    .bind(version as i64)
                    .execute(&*self.pool)
                    .await
            }
            ExpectedVersion::Any => {
                sqlx::query("UPDATE orders SET status = $2, version = $3 WHERE id = $1")
                    .bind(order.id.as_uuid())
                    .bind(order.status.as_str())
                    .bind(order.version as i64)
                    .execute(&*self.pool)
                    .await
            }
        }
        .map_err(|e| map_sqlx_error("update_order_status", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        match self.get_order(order.id).await? {
            Some(current) => Err(StoreError::Concurrency(format!(
                "order {} is at version {}, expected {expected:?}",
                order.id, current.version
            ))),
            None => Err(StoreError::NotFound(format!("order {}", order.id))),
        }
    }

    async fn set_inventory_status(&self, id: OrderId, status: InventoryStatus) -> StoreResult<()> {
        let result = sqlx::query("UPDATE orders SET inventory_status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_inventory_status", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("order {id}")));
        }
        Ok(())
    }

    async fn insert_plan(&self, plan: &BoostPlan) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO boost_plans (id, name, description, duration_days, price_pesewas, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(plan.id.as_uuid())
        .bind(&plan.name)
        .bind(plan.description.as_deref())
        .bind(plan.duration_days as i32)
        .bind(money_to_i64(plan.price)?)
        .bind(plan.is_active)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_plan", e))?;
        Ok(())
    }

    async fn get_plan(&self, id: BoostPlanId) -> StoreResult<Option<BoostPlan>> {
        let row = sqlx::query(
            "SELECT id, name, description, duration_days, price_pesewas, is_active \
             FROM boost_plans WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_plan", e))?;

        row.map(|row| {
            BoostPlanRow::from_row(&row)
                .map_err(|e| map_sqlx_error("decode_plan", e))?
                .try_into()
        })
        .transpose()
    }

    async fn list_plans(&self) -> StoreResult<Vec<BoostPlan>> {
        let rows = sqlx::query(
            "SELECT id, name, description, duration_days, price_pesewas, is_active \
             FROM boost_plans ORDER BY duration_days, name",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_plans", e))?;

        rows.iter()
            .map(|row| {
                BoostPlanRow::from_row(row)
                    .map_err(|e| map_sqlx_error("decode_plan", e))?
                    .try_into()
            })
            .collect()
    }

    async fn update_plan(&self, plan: &BoostPlan) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE boost_plans
            SET name = $2, description = $3, duration_days = $4, price_pesewas = $5, is_active = $6
            WHERE id = $1
            "#,
        )
        .bind(plan.id.as_uuid())
        .bind(&plan.name)
        .bind(plan.description.as_deref())
        .bind(plan.duration_days as i32)
        .bind(money_to_i64(plan.price)?)
        .bind(plan.is_active)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_plan", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("boost plan {}", plan.id)));
        }
        Ok(())
    }

    #[instrument(skip(self, request), fields(request_id = %request.id, product_id = %request.product_id), err)]
    async fn create_boost_request(&self, request: &BoostRequest) -> StoreResult<Product> {
        let mut tx = self.begin().await?;

        let product = lock_product(&mut tx, request.product_id).await?;
        let promotion = product.promotion().request(request.id)?;
        write_promotion(&mut tx, product.id(), product.promotion().version(), &promotion).await?;

        sqlx::query(
            r#"
            INSERT INTO boost_requests (
                id, product_id, vendor_id, user_id, plan_duration_days, plan_price,
                status, created_at, decided_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(request.id.as_uuid())
        .bind(request.product_id.as_uuid())
        .bind(request.vendor_id.as_uuid())
        .bind(request.user_id.as_uuid())
        .bind(request.plan_duration_days as i32)
        .bind(money_to_i64(request.plan_price)?)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.decided_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Domain(DomainError::conflict(format!(
                    "a boost request is already pending for product {}",
                    request.product_id
                )))
            } else {
                map_sqlx_error("insert_boost_request", e)
            }
        })?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(product.with_promotion(promotion))
    }

    async fn get_boost_request(&self, id: BoostRequestId) -> StoreResult<Option<BoostRequest>> {
        let row = sqlx::query(&format!("SELECT {REQUEST_COLUMNS} FROM boost_requests WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_boost_request", e))?;

        row.map(|row| {
            BoostRequestRow::from_row(&row)
                .map_err(|e| map_sqlx_error("decode_boost_request", e))?
                .try_into()
        })
        .transpose()
    }

    async fn list_boost_requests(
        &self,
        status: Option<BoostRequestStatus>,
        pagination: Pagination,
    ) -> StoreResult<BoostRequestPage> {
        let status = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM boost_requests WHERE ($1::TEXT IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_boost_requests", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM boost_requests \
             WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_boost_requests", e))?;

        let requests = rows
            .iter()
            .map(|row| {
                BoostRequestRow::from_row(row)
                    .map_err(|e| map_sqlx_error("decode_boost_request", e))?
                    .try_into()
            })
            .collect::<StoreResult<Vec<BoostRequest>>>()?;

        let total = u64::try_from(total).map_err(|_| corrupt("boost_requests.count", &total.to_string()))?;
        Ok(BoostRequestPage::new(requests, total, pagination))
    }

    #[instrument(skip(self), fields(request_id = %id), err)]
    async fn approve_boost(
        &self,
        id: BoostRequestId,
        approved_at: DateTime<Utc>,
    ) -> StoreResult<(BoostRequest, Product)> {
        let mut tx = self.begin().await?;

        // Serializes approvals against each other while a cap is configured.
        let setting: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT value FROM app_settings WHERE key = $1 FOR UPDATE")
                .bind(MAX_BOOSTED_PRODUCTS_KEY)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("lock_settings", e))?;
        let cap = BoostCap::new(match setting {
            Some(value) => limit_from_json(&value)?,
            None => None,
        });

        let request = lock_boost_request(&mut tx, id).await?;
        let product = lock_product(&mut tx, request.product_id).await?;

        let already_boosted: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE id <> $1 AND boosted_until > $2",
        )
        .bind(product.id().as_uuid())
        .bind(approved_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("count_boosted", e))?;

        let (decided, updated) = decide_approval(
            &request,
            &product,
            usize::try_from(already_boosted).unwrap_or(usize::MAX),
            cap,
            approved_at,
        )?;

        write_request_decision(&mut tx, &decided).await?;
        write_promotion(&mut tx, product.id(), product.promotion().version(), updated.promotion())
            .await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok((decided, updated))
    }

    #[instrument(skip(self), fields(request_id = %id), err)]
    async fn reject_boost(
        &self,
        id: BoostRequestId,
        rejected_at: DateTime<Utc>,
    ) -> StoreResult<(BoostRequest, Product)> {
        let mut tx = self.begin().await?;

        let request = lock_boost_request(&mut tx, id).await?;
        let product = lock_product(&mut tx, request.product_id).await?;
        let (decided, updated) = decide_rejection(&request, &product, rejected_at)?;

        write_request_decision(&mut tx, &decided).await?;
        write_promotion(&mut tx, product.id(), product.promotion().version(), updated.promotion())
            .await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok((decided, updated))
    }

    async fn max_boosted_products(&self) -> StoreResult<Option<u32>> {
        let value: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT value FROM app_settings WHERE key = $1")
                .bind(MAX_BOOSTED_PRODUCTS_KEY)
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("max_boosted_products", e))?;
        match value {
            Some(value) => limit_from_json(&value),
            None => Ok(None),
        }
    }

    async fn set_max_boosted_products(&self, limit: Option<u32>) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO app_settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(MAX_BOOSTED_PRODUCTS_KEY)
        .bind(serde_json::json!({ "limit": limit }))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_max_boosted_products", e))?;
        Ok(())
    }
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::NotFound(msg),
                Some("23514") => StoreError::Domain(DomainError::validation(msg)),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("row not found in {operation}")),
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}

fn money_to_i64(money: Money) -> StoreResult<i64> {
    i64::try_from(money.minor_units())
        .map_err(|_| StoreError::Domain(DomainError::validation("amount out of range")))
}

fn money_from_i64(column: &str, value: i64) -> StoreResult<Money> {
    u64::try_from(value)
        .map(Money::from_minor)
        .map_err(|_| StoreError::Backend(format!("negative amount in column {column}")))
}

fn corrupt(column: &str, value: &str) -> StoreError {
    StoreError::Backend(format!("unexpected value '{value}' in column {column}"))
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: Uuid,
    vendor_id: Uuid,
    name: String,
    price_pesewas: i64,
    stock: i64,
    boosted_until: Option<DateTime<Utc>>,
    pending_boost_request: Option<Uuid>,
    promotion_version: i64,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            vendor_id: row.try_get("vendor_id")?,
            name: row.try_get("name")?,
            price_pesewas: row.try_get("price_pesewas")?,
            stock: row.try_get("stock")?,
            boosted_until: row.try_get("boosted_until")?,
            pending_boost_request: row.try_get("pending_boost_request")?,
            promotion_version: row.try_get("promotion_version")?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let promotion = Promotion::restore(
            row.boosted_until,
            row.pending_boost_request.map(BoostRequestId::from_uuid),
            row.promotion_version as u64,
        );
        Ok(Product::restore(
            ProductId::from_uuid(row.id),
            VendorId::from_uuid(row.vendor_id),
            row.name,
            money_from_i64("price_pesewas", row.price_pesewas)?,
            row.stock,
            promotion,
        ))
    }
}

#[derive(Debug)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    total_pesewas: i64,
    status: String,
    order_date: DateTime<Utc>,
    shipping_address: serde_json::Value,
    payment_method: String,
    transaction_id: Option<String>,
    inventory_status: String,
    version: i64,
}

impl<'r> FromRow<'r, PgRow> for OrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            total_pesewas: row.try_get("total_pesewas")?,
            status: row.try_get("status")?,
            order_date: row.try_get("order_date")?,
            shipping_address: row.try_get("shipping_address")?,
            payment_method: row.try_get("payment_method")?,
            transaction_id: row.try_get("transaction_id")?,
            inventory_status: row.try_get("inventory_status")?,
            version: row.try_get("version")?,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> StoreResult<Order> {
        let status: OrderStatus = self
            .status
            .parse()
            .map_err(|_| corrupt("orders.status", &self.status))?;
        let payment_method = PaymentMethod::parse(&self.payment_method)
            .ok_or_else(|| corrupt("orders.payment_method", &self.payment_method))?;
        let inventory_status = InventoryStatus::parse(&self.inventory_status)
            .ok_or_else(|| corrupt("orders.inventory_status", &self.inventory_status))?;
        let shipping_address: ShippingAddress = serde_json::from_value(self.shipping_address)
            .map_err(|e| StoreError::Backend(format!("invalid shipping address: {e}")))?;

        Ok(Order {
            id: OrderId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            total_amount: money_from_i64("total_pesewas", self.total_pesewas)?,
            status,
            order_date: self.order_date,
            shipping_address,
            payment_method,
            transaction_id: self.transaction_id,
            inventory_status,
            items,
            version: self.version as u64,
        })
    }
}

#[derive(Debug)]
struct OrderItemRow {
    order_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i64,
    price_at_purchase: i64,
}

impl<'r> FromRow<'r, PgRow> for OrderItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderItemRow {
            order_id: row.try_get("order_id")?,
            product_id: row.try_get("product_id")?,
            product_name: row.try_get("product_name")?,
            quantity: row.try_get("quantity")?,
            price_at_purchase: row.try_get("price_at_purchase")?,
        })
    }
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = StoreError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(OrderItem {
            order_id: OrderId::from_uuid(row.order_id),
            product_id: ProductId::from_uuid(row.product_id),
            product_name: row.product_name,
            quantity: row.quantity,
            price_at_purchase: money_from_i64("price_at_purchase", row.price_at_purchase)?,
        })
    }
}

#[derive(Debug)]
struct BoostPlanRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    duration_days: i32,
    price_pesewas: i64,
    is_active: bool,
}

impl<'r> FromRow<'r, PgRow> for BoostPlanRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(BoostPlanRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            duration_days: row.try_get("duration_days")?,
            price_pesewas: row.try_get("price_pesewas")?,
            is_active: row.try_get("is_active")?,
        })
    }
}

impl TryFrom<BoostPlanRow> for BoostPlan {
    type Error = StoreError;

    fn try_from(row: BoostPlanRow) -> Result<Self, Self::Error> {
        Ok(BoostPlan {
            id: BoostPlanId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            duration_days: u32::try_from(row.duration_days)
                .map_err(|_| corrupt("boost_plans.duration_days", &row.duration_days.to_string()))?,
            price: money_from_i64("price_pesewas", row.price_pesewas)?,
            is_active: row.is_active,
        })
    }
}

#[derive(Debug)]
struct BoostRequestRow {
    id: Uuid,
    product_id: Uuid,
    vendor_id: Uuid,
    user_id: Uuid,
    plan_duration_days: i32,
    plan_price: i64,
    status: String,
    created_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for BoostRequestRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(BoostRequestRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            vendor_id: row.try_get("vendor_id")?,
            user_id: row.try_get("user_id")?,
            plan_duration_days: row.try_get("plan_duration_days")?,
            plan_price: row.try_get("plan_price")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            decided_at: row.try_get("decided_at")?,
        })
    }
}

impl TryFrom<BoostRequestRow> for BoostRequest {
    type Error = StoreError;

    fn try_from(row: BoostRequestRow) -> Result<Self, Self::Error> {
        let status = BoostRequestStatus::parse(&row.status)
            .ok_or_else(|| corrupt("boost_requests.status", &row.status))?;
        Ok(BoostRequest {
            id: BoostRequestId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            vendor_id: VendorId::from_uuid(row.vendor_id),
            user_id: UserId::from_uuid(row.user_id),
            plan_duration_days: u32::try_from(row.plan_duration_days).map_err(|_| {
                corrupt("boost_requests.plan_duration_days", &row.plan_duration_days.to_string())
            })?,
            plan_price: money_from_i64("plan_price", row.plan_price)?,
            status,
            created_at: row.created_at,
            decided_at: row.decided_at,
        })
    }
}
