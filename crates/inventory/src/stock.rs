use serde::{Deserialize, Serialize};

use kudimall_core::{DomainError, DomainResult, ProductId};

/// Vendor dashboards flag products at or below this many units.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Reject stock levels that would break the `stock >= 0` invariant.
pub fn validate_stock_level(stock: i64) -> DomainResult<()> {
    if stock < 0 {
        return Err(DomainError::validation(format!(
            "stock cannot be negative (got {stock})"
        )));
    }
    Ok(())
}

/// Outcome of subtracting a sold quantity from an observed stock level.
///
/// Over-decrements are clamped at zero instead of rejected; `shortfall()`
/// reports how many units were sold without stock to back them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDecrement {
    pub product_id: ProductId,
    pub previous: i64,
    pub requested: i64,
    pub new_stock: i64,
}

impl StockDecrement {
    pub fn compute(product_id: ProductId, previous: i64, requested: i64) -> DomainResult<Self> {
        if requested <= 0 {
            return Err(DomainError::validation(format!(
                "decrement quantity must be positive (got {requested})"
            )));
        }
        if previous < 0 {
            return Err(DomainError::invariant(format!(
                "product {product_id} has negative stock {previous}"
            )));
        }

        let new_stock = previous.saturating_sub(requested).max(0);
        Ok(Self {
            product_id,
            previous,
            requested,
            new_stock,
        })
    }

    pub fn shortfall(&self) -> i64 {
        self.requested - (self.previous - self.new_stock)
    }

    pub fn is_clamped(&self) -> bool {
        self.shortfall() > 0
    }
}

/// Low-stock alerting rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowStockPolicy {
    threshold: i64,
}

impl LowStockPolicy {
    pub fn new(threshold: i64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    pub fn is_low(&self, stock: i64) -> bool {
        stock <= self.threshold
    }
}

impl Default for LowStockPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_STOCK_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid() -> ProductId {
        ProductId::new()
    }

    #[test]
    fn exact_decrement_within_stock() {
        let d = StockDecrement::compute(pid(), 10, 6).unwrap();
        assert_eq!(d.new_stock, 4);
        assert!(!d.is_clamped());
    }

    #[test]
    fn oversell_clamps_to_zero() {
        let d = StockDecrement::compute(pid(), 4, 5).unwrap();
        assert_eq!(d.new_stock, 0);
        assert_eq!(d.shortfall(), 1);
        assert!(d.is_clamped());
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        for qty in [0, -3] {
            match StockDecrement::compute(pid(), 10, qty) {
                Err(DomainError::Validation(_)) => {}
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn low_stock_threshold_is_inclusive() {
        let policy = LowStockPolicy::default();
        assert!(policy.is_low(5));
        assert!(!policy.is_low(6));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: stock never goes negative, whatever the demand.
            #[test]
            fn never_negative(previous in 0i64..10_000, requested in 1i64..20_000) {
                let d = StockDecrement::compute(ProductId::new(), previous, requested).unwrap();
                prop_assert!(d.new_stock >= 0);
                prop_assert!(d.new_stock <= previous);
            }

            /// Property: a sequence of decrements totalling at most the stock is exact.
            #[test]
            fn sequential_decrements_are_exact(
                previous in 0i64..1_000,
                quantities in proptest::collection::vec(1i64..50, 0..20)
            ) {
                let total: i64 = quantities.iter().sum();
                let mut stock = previous;
                for q in &quantities {
                    stock = StockDecrement::compute(ProductId::new(), stock, *q).unwrap().new_stock;
                }
                if total <= previous {
                    prop_assert_eq!(stock, previous - total);
                } else {
                    prop_assert_eq!(stock, 0);
                }
            }
        }
    }
}
