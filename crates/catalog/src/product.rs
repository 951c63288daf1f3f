use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kudimall_core::{DomainError, DomainResult, Money, ProductId, VendorId};
use kudimall_inventory::validate_stock_level;

use crate::promotion::{BoostStatus, Promotion};

/// Product row shared by inventory, orders and promotions.
///
/// Each component writes only its own region: `stock` through the inventory
/// ledger, `promotion` through the promotion workflow. Catalog fields (name,
/// price) are owned by vendor listing management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    vendor_id: VendorId,
    name: String,
    price: Money,
    stock: i64,
    promotion: Promotion,
}

impl Product {
    pub fn new(
        id: ProductId,
        vendor_id: VendorId,
        name: impl Into<String>,
        price: Money,
        stock: i64,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        validate_stock_level(stock)?;

        Ok(Self {
            id,
            vendor_id,
            name: name.trim().to_string(),
            price,
            stock,
            promotion: Promotion::default(),
        })
    }

    /// Rehydrate a stored row.
    pub fn restore(
        id: ProductId,
        vendor_id: VendorId,
        name: String,
        price: Money,
        stock: i64,
        promotion: Promotion,
    ) -> Self {
        Self {
            id,
            vendor_id,
            name,
            price,
            stock,
            promotion,
        }
    }

    pub fn with_promotion(mut self, promotion: Promotion) -> Self {
        self.promotion = promotion;
        self
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = stock;
        self
    }

    pub fn with_price(mut self, price: Money) -> Self {
        self.price = price;
        self
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn vendor_id(&self) -> VendorId {
        self.vendor_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn promotion(&self) -> &Promotion {
        &self.promotion
    }

    pub fn is_boosted(&self) -> bool {
        self.promotion.is_boosted()
    }

    pub fn boosted_until(&self) -> Option<DateTime<Utc>> {
        self.promotion.boosted_until()
    }

    pub fn effective_boosted(&self, now: DateTime<Utc>) -> bool {
        self.promotion.effective_boosted(now)
    }

    pub fn boost_status(&self, now: DateTime<Utc>) -> BoostStatus {
        self.promotion.status(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_product_starts_unpromoted() {
        let p = Product::new(
            ProductId::new(),
            VendorId::new(),
            "  Kente scarf ",
            Money::from_minor(4_500),
            12,
        )
        .unwrap();

        assert_eq!(p.name(), "Kente scarf");
        assert_eq!(p.stock(), 12);
        assert!(!p.is_boosted());
        assert_eq!(p.boost_status(Utc::now()), BoostStatus::None);
    }

    #[test]
    fn rejects_negative_stock_and_blank_name() {
        let vendor = VendorId::new();
        assert!(Product::new(ProductId::new(), vendor, "Shea butter", Money::ZERO, -1).is_err());
        assert!(Product::new(ProductId::new(), vendor, "   ", Money::ZERO, 1).is_err());
    }
}
