//! Storefront selection of promoted products.

use chrono::{DateTime, Utc};

use kudimall_core::{DomainError, DomainResult, ProductId};

use crate::product::Product;

/// Products currently promoted, the longest remaining window first.
///
/// Filtering uses `effective_boosted(now)`, never the stored flag.
pub fn featured_products<I>(products: I, now: DateTime<Utc>, limit: Option<usize>) -> Vec<Product>
where
    I: IntoIterator<Item = Product>,
{
    let mut featured: Vec<Product> = products
        .into_iter()
        .filter(|p| p.effective_boosted(now))
        .collect();
    featured.sort_by(|a, b| {
        b.boosted_until()
            .cmp(&a.boosted_until())
            .then_with(|| a.id().as_uuid().cmp(&b.id().as_uuid()))
    });
    if let Some(limit) = limit {
        featured.truncate(limit);
    }
    featured
}

/// Effectively boosted products, excluding `except` when given.
pub fn count_effectively_boosted<'a, I>(
    products: I,
    now: DateTime<Utc>,
    except: Option<ProductId>,
) -> usize
where
    I: IntoIterator<Item = &'a Product>,
{
    products
        .into_iter()
        .filter(|p| Some(p.id()) != except && p.effective_boosted(now))
        .count()
}

/// Platform-wide ceiling on simultaneously promoted products.
///
/// `None` means no cap is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoostCap {
    limit: Option<u32>,
}

impl BoostCap {
    pub fn new(limit: Option<u32>) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// `already_boosted` must not include the product being approved.
    pub fn check(&self, already_boosted: usize) -> DomainResult<()> {
        match self.limit {
            Some(limit) if already_boosted >= limit as usize => Err(DomainError::conflict(format!(
                "boost limit reached: {already_boosted} of {limit} promotion slots in use"
            ))),
            _ => Ok(()),
        }
    }
}
