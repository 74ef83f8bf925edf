//! # Inventory Ledger
//!
//! The only component that changes stock. Every change is a movement, and
//! every movement leaves exactly one stock card row behind.
//!
//! ## Applying a Batch
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_movements([m1, m2, ...])                                         │
//! │       │                                                                 │
//! │       ▼  validate ALL movements (nothing read yet)                     │
//! │       │                                                                 │
//! │  ┌────┴──────────────────── attempt ─────────────────────────────┐     │
//! │  │  for each movement, in caller order:                          │     │
//! │  │    product seen earlier in batch? use in-flight balance       │     │
//! │  │                              else? read product + version     │     │
//! │  │    tally_core::stock::apply_movement → outcome or rejection   │     │
//! │  │    stage balance + stock card row                             │     │
//! │  │  store.commit_movements(all balances, all rows)               │     │
//! │  └────┬──────────────────────────────────────────────────────────┘     │
//! │       │                                                                 │
//! │       ├── Ok                 → Vec<MovementResult>                      │
//! │       ├── Conflict           → backoff, fresh attempt                  │
//! │       ├── Conflict (budget)  → Contention                              │
//! │       └── anything else      → error, store untouched                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! No lock is held while talking to the store. Two batches touching the
//! same product race to commit; the loser's compare-and-swap fails and it
//! re-runs from a fresh read. Batches on different products never conflict.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use chrono::Utc;
use tally_core::stock::{self, AuditReport};
use tally_core::validation::{validate_movement, validate_product};
use tally_core::{
    Availability, MovementResult, ProductStock, StockCardEntry, StockLevel, StockMovement,
    TimeRange,
};
use tracing::{debug, info, warn};

use crate::error::{DbError, LedgerError, LedgerResult};
use crate::request::{LedgerRequest, LedgerResponse};
use crate::store::{BalanceUpdate, InventoryStore, MovementCommit, VersionedProduct};

// =============================================================================
// Retry Policy
// =============================================================================

/// How long a batch keeps retrying after version conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// First wait after a conflict.
    pub initial_interval: Duration,
    /// Upper bound for a single wait.
    pub max_interval: Duration,
    /// Total time budget before giving up with `Contention`.
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(250),
            max_elapsed: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Jittered exponential backoff bounded by `max_elapsed`.
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build()
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// Stock queries and atomic movement batches over an [`InventoryStore`].
///
/// ## Usage
/// ```rust,ignore
/// let ledger = InventoryLedger::new(Arc::new(MemoryInventoryStore::new()));
///
/// ledger.register_product(ProductStock::new("p-1", "KOPI-250", "Kopi")).await?;
/// let results = ledger
///     .apply_movements(&[StockMovement::inbound("p-1", 10, Some(cost), "PO-1")])
///     .await?;
/// ```
#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn InventoryStore>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for InventoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryLedger")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl InventoryLedger {
    /// Creates a ledger with the default retry policy.
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn InventoryStore> {
        &self.store
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current stock and cost basis of a product.
    pub async fn get_stock(&self, product_id: &str) -> LedgerResult<StockLevel> {
        Ok(self.require_product(product_id).await?.product.into())
    }

    /// Whether `quantity` units can be taken right now.
    ///
    /// Advisory only: nothing is reserved, and a later batch may still fail
    /// with `InsufficientStock`.
    pub async fn check_availability(
        &self,
        product_id: &str,
        quantity: i64,
    ) -> LedgerResult<Availability> {
        if quantity < 0 {
            return Err(LedgerError::InvalidArgument(
                "quantity must not be negative".to_string(),
            ));
        }

        let current = self.require_product(product_id).await?.product;
        Ok(Availability {
            product_id: current.id,
            requested: quantity,
            available: current.stock >= quantity,
            current_stock: current.stock,
        })
    }

    /// Stock card rows for a product in insertion order, within `range`.
    pub async fn stock_card(
        &self,
        product_id: &str,
        range: TimeRange,
    ) -> LedgerResult<Vec<StockCardEntry>> {
        if let (Some(from), Some(to)) = (range.from, range.to) {
            if from > to {
                return Err(LedgerError::InvalidArgument(
                    "range start is after range end".to_string(),
                ));
            }
        }

        self.require_product(product_id).await?;
        Ok(self.store.stock_card(product_id, range).await?)
    }

    /// Replays a product's stock card and compares it with the stored balance.
    pub async fn audit(&self, product_id: &str) -> LedgerResult<AuditReport> {
        // Re-read until no commit slipped in between the balance and the card.
        let mut attempts = 0;
        loop {
            attempts += 1;
            let before = self.require_product(product_id).await?;
            let entries = self.store.stock_card(product_id, TimeRange::all()).await?;
            let after = self.require_product(product_id).await?;

            if before.version == after.version || attempts >= 5 {
                let report = stock::audit(&after.product, &entries);
                if !report.consistent {
                    warn!(
                        product_id = %product_id,
                        problem = ?report.problem,
                        "Stock card audit failed"
                    );
                }
                return Ok(report);
            }
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds a product to the store with zero stock.
    ///
    /// Opening stock must arrive as an inbound movement so that the stock
    /// card accounts for it.
    pub async fn register_product(&self, product: ProductStock) -> LedgerResult<StockLevel> {
        validate_product(&product).map_err(|e| LedgerError::InvalidArgument(e.to_string()))?;
        if product.stock != 0 {
            return Err(LedgerError::InvalidArgument(
                "opening stock must be recorded with an inbound movement".to_string(),
            ));
        }

        self.store
            .insert_product(&product)
            .await
            .map_err(|err| match err {
                DbError::UniqueViolation { field, value } => {
                    LedgerError::AlreadyExists { field, value }
                }
                other => LedgerError::Storage(other),
            })?;
        info!(id = %product.id, code = %product.code, "Registered product");
        Ok(product.into())
    }

    /// Applies a batch of movements atomically, in the given order.
    ///
    /// ## Returns
    /// * `Ok(results)` - one [`MovementResult`] per movement; every balance
    ///   and stock card row is committed
    /// * `Err(_)` - nothing is committed; positions in the error are 1-based
    pub async fn apply_movements(
        &self,
        movements: &[StockMovement],
    ) -> LedgerResult<Vec<MovementResult>> {
        if movements.is_empty() {
            return Ok(Vec::new());
        }

        for (index, movement) in movements.iter().enumerate() {
            validate_movement(movement).map_err(|source| LedgerError::InvalidMovement {
                position: index + 1,
                source,
            })?;
        }

        let this = self;
        let outcome = backoff::future::retry_notify(
            self.retry.backoff(),
            move || async move {
                this.try_apply(movements).await.map_err(|err| match err {
                    LedgerError::Storage(db) if db.is_conflict() => {
                        backoff::Error::transient(LedgerError::Storage(db))
                    }
                    other => backoff::Error::permanent(other),
                })
            },
            |err: LedgerError, wait: Duration| {
                warn!(error = %err, ?wait, "Version conflict, retrying batch");
            },
        )
        .await;

        match outcome {
            Ok(results) => {
                info!(movements = results.len(), "Applied stock movements");
                Ok(results)
            }
            Err(LedgerError::Storage(db)) if db.is_conflict() => {
                warn!(error = %db, "Retry budget exhausted");
                Err(LedgerError::Contention(db.to_string()))
            }
            Err(err) => {
                warn!(error = %err, position = ?err.position(), "Batch rejected");
                Err(err)
            }
        }
    }

    /// One attempt: read, compute, commit.
    async fn try_apply(&self, movements: &[StockMovement]) -> LedgerResult<Vec<MovementResult>> {
        let now = Utc::now();
        let mut in_flight: HashMap<String, VersionedProduct> = HashMap::new();
        let mut results = Vec::with_capacity(movements.len());
        let mut entries = Vec::with_capacity(movements.len());

        for (index, movement) in movements.iter().enumerate() {
            let position = index + 1;

            let current = match in_flight.entry(movement.product_id.clone()) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => {
                    let read = self
                        .store
                        .read_product(&movement.product_id)
                        .await?
                        .ok_or_else(|| LedgerError::NotFound {
                            product_id: movement.product_id.clone(),
                            position: Some(position),
                        })?;
                    slot.insert(read)
                }
            };

            let outcome = stock::apply_movement(&current.product, movement)
                .map_err(|err| LedgerError::at(position, err))?;
            outcome.apply_to(&mut current.product);

            entries.push(StockCardEntry::record(movement, &outcome, now));
            results.push(outcome.to_result(&current.product, movement));
        }

        // `version` is still the one read, which is what the CAS checks.
        let mut balances: Vec<BalanceUpdate> = in_flight
            .into_values()
            .map(|staged| BalanceUpdate {
                product_id: staged.product.id,
                expected_version: staged.version,
                stock: staged.product.stock,
                cost_price: staged.product.cost_price,
            })
            .collect();
        balances.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        debug!(
            movements = movements.len(),
            products = balances.len(),
            "Committing batch"
        );
        self.store
            .commit_movements(&MovementCommit { balances, entries })
            .await?;

        Ok(results)
    }

    // =========================================================================
    // Request Dispatch
    // =========================================================================

    /// Runs a typed request.
    pub async fn handle(&self, request: LedgerRequest) -> LedgerResult<LedgerResponse> {
        match request {
            LedgerRequest::GetStock { product_id } => {
                self.get_stock(&product_id).await.map(LedgerResponse::Stock)
            }
            LedgerRequest::ValidateAvailability {
                product_id,
                quantity,
            } => self
                .check_availability(&product_id, quantity)
                .await
                .map(LedgerResponse::Availability),
            LedgerRequest::ApplyMovements { movements } => self
                .apply_movements(&movements)
                .await
                .map(LedgerResponse::Movements),
            LedgerRequest::StockCard { product_id, range } => self
                .stock_card(&product_id, range)
                .await
                .map(LedgerResponse::StockCard),
            LedgerRequest::Audit { product_id } => {
                self.audit(&product_id).await.map(LedgerResponse::Audit)
            }
        }
    }

    async fn require_product(&self, product_id: &str) -> LedgerResult<VersionedProduct> {
        if product_id.trim().is_empty() {
            return Err(LedgerError::InvalidArgument(
                "product_id is required".to_string(),
            ));
        }

        self.store
            .read_product(product_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound {
                product_id: product_id.to_string(),
                position: None,
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::store::MemoryInventoryStore;
    use rust_decimal_macros::dec;
    use tally_core::{Money, MovementDirection};

    async fn ledger_with(products: &[(&str, &str)]) -> (InventoryLedger, Arc<MemoryInventoryStore>) {
        let store = Arc::new(MemoryInventoryStore::new());
        let ledger = InventoryLedger::new(store.clone());
        for (id, code) in products {
            ledger
                .register_product(ProductStock::new(*id, *code, format!("Product {code}")))
                .await
                .unwrap();
        }
        (ledger, store)
    }

    fn cost(amount: rust_decimal::Decimal) -> Option<Money> {
        Some(Money::new(amount))
    }

    #[tokio::test]
    async fn test_weighted_average_through_ledger() {
        let (ledger, _) = ledger_with(&[("p-1", "KOPI-250")]).await;

        let results = ledger
            .apply_movements(&[
                StockMovement::inbound("p-1", 10, cost(dec!(100)), "PO-1"),
                StockMovement::inbound("p-1", 10, cost(dec!(200)), "PO-2"),
            ])
            .await
            .unwrap();

        assert_eq!(results[0].stock_after, 10);
        assert_eq!(results[1].stock_before, 10);
        assert_eq!(results[1].stock_after, 20);
        assert_eq!(results[1].cost_after, Money::new(dec!(150)));

        let level = ledger.get_stock("p-1").await.unwrap();
        assert_eq!(level.stock, 20);
        assert_eq!(level.cost_price, Money::new(dec!(150)));
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let (ledger, _) = ledger_with(&[("p-1", "KOPI-250")]).await;
        ledger
            .apply_movements(&[StockMovement::inbound("p-1", 5, cost(dec!(10)), "PO-1")])
            .await
            .unwrap();

        let err = ledger
            .apply_movements(&[StockMovement::outbound("p-1", 10, "SO-1")])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::InsufficientStock { position: 1, stock_before: 5, requested: 10, .. }
        ));
        assert_eq!(ledger.get_stock("p-1").await.unwrap().stock, 5);
        assert_eq!(
            ledger.stock_card("p-1", TimeRange::all()).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_repeated_product_threads_in_flight_state() {
        let (ledger, _) = ledger_with(&[("p-1", "A")]).await;

        let results = ledger
            .apply_movements(&[
                StockMovement::inbound("p-1", 3, cost(dec!(1)), "PO-1"),
                StockMovement::outbound("p-1", 2, "SO-1"),
                StockMovement::outbound("p-1", 1, "SO-2"),
            ])
            .await
            .unwrap();

        let chain: Vec<(i64, i64)> = results.iter().map(|r| (r.stock_before, r.stock_after)).collect();
        assert_eq!(chain, vec![(0, 3), (3, 1), (1, 0)]);
        assert_eq!(results[2].direction, MovementDirection::Out);
        assert!(ledger.audit("p-1").await.unwrap().consistent);
    }

    #[tokio::test]
    async fn test_later_failure_rolls_back_whole_batch() {
        let (ledger, _) = ledger_with(&[("a", "A"), ("b", "B")]).await;

        let err = ledger
            .apply_movements(&[
                StockMovement::inbound("a", 4, cost(dec!(2)), "PO-1"),
                StockMovement::outbound("b", 1, "SO-1"),
            ])
            .await
            .unwrap_err();

        assert_eq!(err.position(), Some(2));
        assert_eq!(ledger.get_stock("a").await.unwrap().stock, 0);
        assert!(ledger.stock_card("a", TimeRange::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_read() {
        let (ledger, store) = ledger_with(&[("a", "A")]).await;
        store.set_unavailable(true);

        // A store error would surface if anything were read first.
        let err = ledger
            .apply_movements(&[
                StockMovement::inbound("a", 1, None, "PO-1"),
                StockMovement::outbound("a", 0, "SO-1"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidMovement { position: 2, .. }));
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let (ledger, _) = ledger_with(&[("a", "A")]).await;
        let err = ledger
            .apply_movements(&[
                StockMovement::inbound("a", 1, None, "PO-1"),
                StockMovement::inbound("ghost", 1, None, "PO-1"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::NotFound { ref product_id, position: Some(2) } if product_id == "ghost"
        ));
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(matches!(
            ledger.get_stock("ghost").await,
            Err(LedgerError::NotFound { position: None, .. })
        ));
        assert!(matches!(
            ledger.check_availability("ghost", 1).await,
            Err(LedgerError::NotFound { ref product_id, position: None }) if product_id == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_negative_outbound_cost_rejected() {
        let (ledger, _) = ledger_with(&[("p", "P")]).await;
        ledger
            .apply_movements(&[StockMovement::inbound("p", 5, cost(dec!(10)), "PO-1")])
            .await
            .unwrap();

        let mut outbound = StockMovement::outbound("p", 1, "SO-1");
        outbound.unit_cost = cost(dec!(-5));

        let err = ledger
            .apply_movements(&[StockMovement::outbound("p", 1, "SO-1"), outbound])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidMovement { position: 2, .. }));
        assert_eq!(err.code(), ErrorCode::ValidationError);

        assert_eq!(ledger.get_stock("p").await.unwrap().stock, 5);
        assert_eq!(ledger.stock_card("p", TimeRange::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_not_retryable() {
        let (ledger, _) = ledger_with(&[("p", "P")]).await;

        let err = ledger
            .register_product(ProductStock::new("p", "P2", "Other"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::AlreadyExists { ref value, .. } if value == "p"
        ));
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(!err.is_retryable());

        let err = ledger
            .register_product(ProductStock::new("q", "P", "Same code"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::AlreadyExists { ref value, .. } if value == "P"
        ));

        let response = crate::ErrorResponse::from(err);
        assert_eq!(response.code, ErrorCode::ValidationError);
        assert!(!response.retryable);
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let (ledger, store) = ledger_with(&[]).await;
        store.set_unavailable(true);
        assert!(ledger.apply_movements(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_is_retryable() {
        let (ledger, store) = ledger_with(&[("a", "A")]).await;
        store.set_unavailable(true);

        let err = ledger
            .apply_movements(&[StockMovement::inbound("a", 1, None, "PO-1")])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));
        assert!(err.is_retryable());
        assert_eq!(err.code(), ErrorCode::StorageFailure);
    }

    #[tokio::test]
    async fn test_check_availability() {
        let (ledger, _) = ledger_with(&[("a", "A")]).await;
        ledger
            .apply_movements(&[StockMovement::inbound("a", 5, None, "PO-1")])
            .await
            .unwrap();

        let fits = ledger.check_availability("a", 5).await.unwrap();
        assert!(fits.available);
        let short = ledger.check_availability("a", 6).await.unwrap();
        assert!(!short.available);
        assert_eq!(short.current_stock, 5);

        assert!(matches!(
            ledger.check_availability("a", -1).await,
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_opening_stock() {
        let (ledger, _) = ledger_with(&[]).await;
        let product = ProductStock {
            stock: 10,
            ..ProductStock::new("a", "A", "Apple")
        };
        assert!(matches!(
            ledger.register_product(product).await,
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_stock_card_range_validation() {
        let (ledger, _) = ledger_with(&[("a", "A")]).await;
        let now = Utc::now();
        let backwards = TimeRange {
            from: Some(now),
            to: Some(now - chrono::Duration::seconds(1)),
        };
        assert!(matches!(
            ledger.stock_card("a", backwards).await,
            Err(LedgerError::InvalidArgument(_))
        ));
    }
}
