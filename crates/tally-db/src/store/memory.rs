//! In-memory [`InventoryStore`] for tests and local development.
//!
//! A single `tokio::sync::RwLock` guards products and stock cards together,
//! so a commit is atomic with respect to every reader.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tally_core::{ProductStock, StockCardEntry, TimeRange};
use tokio::sync::RwLock;
use tracing::debug;

use super::{InventoryStore, MovementCommit, VersionedProduct};
use crate::error::{DbError, DbResult};

#[derive(Debug, Default)]
struct State {
    products: HashMap<String, VersionedProduct>,
    /// All products' rows, in commit order.
    cards: Vec<StockCardEntry>,
}

/// In-memory store. Not persistent.
#[derive(Debug, Default)]
pub struct MemoryInventoryStore {
    state: RwLock<State>,
    unavailable: AtomicBool,
}

impl MemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`DbError::Unavailable`].
    ///
    /// Used to exercise storage-failure paths.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> DbResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn read_product(&self, product_id: &str) -> DbResult<Option<VersionedProduct>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state.products.get(product_id).cloned())
    }

    async fn insert_product(&self, product: &ProductStock) -> DbResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if state.products.contains_key(&product.id) {
            return Err(DbError::duplicate("products.id", &product.id));
        }
        if state.products.values().any(|p| p.product.code == product.code) {
            return Err(DbError::duplicate("products.code", &product.code));
        }

        debug!(id = %product.id, code = %product.code, "Inserting product");
        state.products.insert(
            product.id.clone(),
            VersionedProduct {
                product: product.clone(),
                version: 0,
            },
        );
        Ok(())
    }

    async fn commit_movements(&self, commit: &MovementCommit) -> DbResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        // Check every version before writing anything.
        for balance in &commit.balances {
            match state.products.get(&balance.product_id) {
                Some(current) if current.version == balance.expected_version => {}
                Some(_) => return Err(DbError::conflict("Product", &balance.product_id)),
                None => return Err(DbError::not_found("Product", &balance.product_id)),
            }
        }

        for balance in &commit.balances {
            if let Some(current) = state.products.get_mut(&balance.product_id) {
                current.product.stock = balance.stock;
                current.product.cost_price = balance.cost_price;
                current.version += 1;
            }
        }
        state.cards.extend(commit.entries.iter().cloned());

        debug!(
            balances = commit.balances.len(),
            entries = commit.entries.len(),
            "Committed movements"
        );
        Ok(())
    }

    async fn stock_card(
        &self,
        product_id: &str,
        range: TimeRange,
    ) -> DbResult<Vec<StockCardEntry>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .cards
            .iter()
            .filter(|e| e.product_id == product_id && range.contains(e.created_at))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BalanceUpdate;
    use tally_core::Money;

    fn balance(product_id: &str, expected_version: i64, stock: i64) -> BalanceUpdate {
        BalanceUpdate {
            product_id: product_id.to_string(),
            expected_version,
            stock,
            cost_price: Money::zero(),
        }
    }

    #[tokio::test]
    async fn test_commit_bumps_version() {
        let store = MemoryInventoryStore::new();
        store
            .insert_product(&ProductStock::new("p-1", "A", "Apple"))
            .await
            .unwrap();

        let commit = MovementCommit {
            balances: vec![balance("p-1", 0, 7)],
            entries: vec![],
        };
        store.commit_movements(&commit).await.unwrap();

        let read = store.read_product("p-1").await.unwrap().unwrap();
        assert_eq!(read.version, 1);
        assert_eq!(read.product.stock, 7);

        // Same expected version again is now stale.
        let err = store.commit_movements(&commit).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_conflict_writes_nothing() {
        let store = MemoryInventoryStore::new();
        store.insert_product(&ProductStock::new("a", "A", "A")).await.unwrap();
        store.insert_product(&ProductStock::new("b", "B", "B")).await.unwrap();

        let commit = MovementCommit {
            balances: vec![balance("a", 0, 5), balance("b", 3, 5)],
            entries: vec![],
        };
        assert!(store.commit_movements(&commit).await.unwrap_err().is_conflict());
        assert_eq!(store.read_product("a").await.unwrap().unwrap().product.stock, 0);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let store = MemoryInventoryStore::new();
        store.insert_product(&ProductStock::new("a", "A", "A")).await.unwrap();
        let err = store
            .insert_product(&ProductStock::new("b", "A", "Other"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_unavailable_switch() {
        let store = MemoryInventoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.read_product("a").await,
            Err(DbError::Unavailable(_))
        ));
    }
}
