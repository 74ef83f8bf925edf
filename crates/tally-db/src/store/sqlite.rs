//! # SQLite Inventory Store
//!
//! [`InventoryStore`] over a sqlx `SqlitePool`.
//!
//! ## Commit Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    for each balance:                                                    │
//! │      UPDATE products SET stock, cost_price, version = version + 1      │
//! │       WHERE id = ? AND version = ?      ── 0 rows? → ROLLBACK, Conflict│
//! │    for each entry:                                                      │
//! │      INSERT INTO stock_cards (...)      ── any error? → ROLLBACK       │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decimals are stored as TEXT and timestamps as fixed-precision RFC 3339
//! UTC strings, which sort the same way as the instants they encode.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tally_core::{Money, MovementDirection, ProductStock, RefType, StockCardEntry, TimeRange};
use tracing::{debug, warn};

use super::{InventoryStore, MovementCommit, VersionedProduct};
use crate::error::{DbError, DbResult};

/// SQLite-backed store. Cheap to clone (shares the pool).
#[derive(Debug, Clone)]
pub struct SqliteInventoryStore {
    pool: SqlitePool,
}

impl SqliteInventoryStore {
    /// Creates a store over an already-migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InventoryStore for SqliteInventoryStore {
    async fn read_product(&self, product_id: &str) -> DbResult<Option<VersionedProduct>> {
        debug!(product_id = %product_id, "Reading product");

        let row = sqlx::query(
            r#"
            SELECT id, code, name, stock, cost_price, version
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_product).transpose()
    }

    async fn insert_product(&self, product: &ProductStock) -> DbResult<()> {
        debug!(id = %product.id, code = %product.code, "Inserting product");

        let now = encode_timestamp(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO products (id, code, name, stock, cost_price, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
            "#,
        )
        .bind(&product.id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(product.stock)
        .bind(product.cost_price.amount().to_string())
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                let value = if field.ends_with(".code") {
                    &product.code
                } else {
                    &product.id
                };
                DbError::duplicate(field, value)
            }
            other => other,
        })?;

        Ok(())
    }

    async fn commit_movements(&self, commit: &MovementCommit) -> DbResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        match write_commit(&mut tx, commit).await {
            Ok(()) => {
                tx.commit()
                    .await
                    .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
                debug!(
                    balances = commit.balances.len(),
                    entries = commit.entries.len(),
                    "Committed movements"
                );
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn stock_card(
        &self,
        product_id: &str,
        range: TimeRange,
    ) -> DbResult<Vec<StockCardEntry>> {
        debug!(product_id = %product_id, ?range, "Reading stock card");

        let rows = sqlx::query(
            r#"
            SELECT id, product_id, ref_code, ref_type, direction, signed_quantity,
                   unit_cost, stock_before, stock_after, note, actor, created_at
            FROM stock_cards
            WHERE product_id = ?1
              AND (?2 IS NULL OR created_at >= ?2)
              AND (?3 IS NULL OR created_at < ?3)
            ORDER BY seq
            "#,
        )
        .bind(product_id)
        .bind(range.from.map(encode_timestamp))
        .bind(range.to.map(encode_timestamp))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_entry).collect()
    }
}

async fn write_commit(tx: &mut Transaction<'_, Sqlite>, commit: &MovementCommit) -> DbResult<()> {
    let now = encode_timestamp(Utc::now());

    for balance in &commit.balances {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = ?1, cost_price = ?2, version = version + 1, updated_at = ?3
            WHERE id = ?4 AND version = ?5
            "#,
        )
        .bind(balance.stock)
        .bind(balance.cost_price.amount().to_string())
        .bind(&now)
        .bind(&balance.product_id)
        .bind(balance.expected_version)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("Product", &balance.product_id));
        }
    }

    for entry in &commit.entries {
        sqlx::query(
            r#"
            INSERT INTO stock_cards (
                id, product_id, ref_code, ref_type, direction, signed_quantity,
                unit_cost, stock_before, stock_after, note, actor, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.product_id)
        .bind(&entry.ref_code)
        .bind(entry.ref_type.as_str())
        .bind(entry.direction.as_str())
        .bind(entry.signed_quantity)
        .bind(entry.unit_cost.amount().to_string())
        .bind(entry.stock_before)
        .bind(entry.stock_after)
        .bind(&entry.note)
        .bind(&entry.actor)
        .bind(encode_timestamp(entry.created_at))
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

// =============================================================================
// Row Decoding
// =============================================================================

fn decode_product(row: &SqliteRow) -> DbResult<VersionedProduct> {
    Ok(VersionedProduct {
        product: ProductStock {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            stock: row.try_get("stock")?,
            cost_price: decode_money(row.try_get("cost_price")?)?,
        },
        version: row.try_get("version")?,
    })
}

fn decode_entry(row: &SqliteRow) -> DbResult<StockCardEntry> {
    let ref_type: String = row.try_get("ref_type")?;
    let direction: String = row.try_get("direction")?;

    Ok(StockCardEntry {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        ref_code: row.try_get("ref_code")?,
        ref_type: RefType::from_str(&ref_type).map_err(DbError::InvalidData)?,
        direction: MovementDirection::from_str(&direction).map_err(DbError::InvalidData)?,
        signed_quantity: row.try_get("signed_quantity")?,
        unit_cost: decode_money(row.try_get("unit_cost")?)?,
        stock_before: row.try_get("stock_before")?,
        stock_after: row.try_get("stock_after")?,
        note: row.try_get("note")?,
        actor: row.try_get("actor")?,
        created_at: decode_timestamp(row.try_get("created_at")?)?,
    })
}

fn decode_money(text: String) -> DbResult<Money> {
    Decimal::from_str(&text)
        .map(Money::new)
        .map_err(|e| DbError::InvalidData(format!("decimal '{text}': {e}")))
}

fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_timestamp(text: String) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&text)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| DbError::InvalidData(format!("timestamp '{text}': {e}")))
}
