//! # Inventory Store Contract
//!
//! The storage seam under [`crate::InventoryLedger`].
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A batch must update product balances AND append stock card rows in   │
//! │  one atomic step. Both therefore live behind one store:                │
//! │                                                                         │
//! │  InventoryStore                                                        │
//! │  ├── read_product(id)          → product + version                     │
//! │  ├── insert_product(product)   → catalog stand-in                      │
//! │  ├── commit_movements(commit)  → CAS every version, append every row   │
//! │  │                               all-or-nothing                        │
//! │  └── stock_card(id, range)     → rows in insertion order               │
//! │                                                                         │
//! │  Adapters: SqliteInventoryStore (sqlx)  MemoryInventoryStore (tests)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Optimistic Concurrency
//! Every product row carries a `version`. `commit_movements` succeeds only
//! if every touched product still has the version the batch read; otherwise
//! it changes nothing and returns [`DbError::Conflict`].

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use tally_core::{Money, ProductStock, StockCardEntry, TimeRange};

use crate::error::DbResult;

pub use memory::MemoryInventoryStore;
pub use sqlite::SqliteInventoryStore;

/// A product as read from the store, with its concurrency token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedProduct {
    pub product: ProductStock,
    pub version: i64,
}

/// New balance for one product, guarded by the version it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub product_id: String,
    pub expected_version: i64,
    pub stock: i64,
    pub cost_price: Money,
}

/// Everything one ledger batch writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementCommit {
    pub balances: Vec<BalanceUpdate>,
    /// In caller order.
    pub entries: Vec<StockCardEntry>,
}

/// Persistence for product balances and their stock cards.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Reads a product and its version. `Ok(None)` if it does not exist.
    async fn read_product(&self, product_id: &str) -> DbResult<Option<VersionedProduct>>;

    /// Inserts a new product at version 0.
    ///
    /// Fails with [`crate::DbError::UniqueViolation`] on a duplicate id or code.
    async fn insert_product(&self, product: &ProductStock) -> DbResult<()>;

    /// Applies every balance update and appends every entry, or nothing.
    ///
    /// ## Returns
    /// * `Ok(())` - all changes visible, each touched version incremented
    /// * `Err(DbError::Conflict)` - a version moved since it was read
    /// * `Err(_)` - storage failure; nothing was written
    async fn commit_movements(&self, commit: &MovementCommit) -> DbResult<()>;

    /// Stock card rows of a product in insertion order, filtered by `range`.
    async fn stock_card(&self, product_id: &str, range: TimeRange)
        -> DbResult<Vec<StockCardEntry>>;
}
