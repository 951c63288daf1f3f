//! Shopping cart collaborator. The order service only needs to clear a cart
//! once its order is placed.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use kudimall_core::UserId;
use kudimall_sales::CartLine;

use crate::store::{StoreError, StoreResult};

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn clear(&self, user_id: UserId) -> StoreResult<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryCartStore {
    carts: RwLock<HashMap<UserId, Vec<CartLine>>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_lines(&self, user_id: UserId, lines: Vec<CartLine>) -> StoreResult<()> {
        let mut carts = self
            .carts
            .write()
            .map_err(|_| StoreError::Backend("cart lock poisoned".to_string()))?;
        carts.insert(user_id, lines);
        Ok(())
    }

    pub fn lines(&self, user_id: UserId) -> StoreResult<Vec<CartLine>> {
        let carts = self
            .carts
            .read()
            .map_err(|_| StoreError::Backend("cart lock poisoned".to_string()))?;
        Ok(carts.get(&user_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn clear(&self, user_id: UserId) -> StoreResult<()> {
        let mut carts = self
            .carts
            .write()
            .map_err(|_| StoreError::Backend("cart lock poisoned".to_string()))?;
        carts.remove(&user_id);
        Ok(())
    }
}
