//! # tally-db: Inventory Ledger and Storage
//!
//! Everything in Tally that holds state: the inventory ledger service, the
//! store contract it runs on, and the SQLite / in-memory stores.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Data Flow                                │
//! │                                                                         │
//! │  Order workflow (outside this workspace)                               │
//! │       │  1. price the order       tally_core::PricingCalculator        │
//! │       │  2. on completion, one movement per line                       │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   LedgerRequest ──► InventoryLedger ──► InventoryStore (trait)  │   │
//! │  │   (request.rs)       (ledger.rs)         │                      │   │
//! │  │                      retry on Conflict   ├── SqliteInventoryStore│  │
//! │  │                                          └── MemoryInventoryStore│  │
//! │  │                                                                 │   │
//! │  │   Database / DbConfig (pool.rs)    Migrations (embedded)        │   │
//! │  │   TallyConfig (config.rs)                                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite: products (balances + version), stock_cards (append-only)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`ledger`] - Inventory ledger service and retry policy
//! - [`store`] - Store contract and its adapters
//! - [`request`] - Typed request/response payloads
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Storage, ledger and config error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, TallyConfig};
//!
//! let config = TallyConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//! let ledger = db.ledger().with_retry_policy(config.retry_policy());
//!
//! let results = ledger.apply_movements(&movements).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod request;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::TallyConfig;
pub use error::{ConfigError, DbError, DbResult, ErrorCode, LedgerError, LedgerResult};
pub use ledger::{InventoryLedger, RetryPolicy};
pub use pool::{Database, DbConfig};
pub use request::{ErrorResponse, LedgerRequest, LedgerResponse};

// Store re-exports for convenience
pub use store::{
    BalanceUpdate, InventoryStore, MemoryInventoryStore, MovementCommit, SqliteInventoryStore,
    VersionedProduct,
};
