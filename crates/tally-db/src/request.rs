//! # Ledger Requests & Responses
//!
//! Closed, typed payloads for callers that talk to the ledger over JSON.
//!
//! ## Wire Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Request                                                                │
//! │  { "op": "apply_movements", "movements": [ {...}, {...} ] }            │
//! │       │                                                                 │
//! │       ▼  LedgerRequest::from_json  (unknown op / direction → rejected)  │
//! │  InventoryLedger::handle                                               │
//! │       │                                                                 │
//! │       ├── Ok  → { "op": "movements", "data": [ {...} ] }               │
//! │       └── Err → { "code": "INSUFFICIENT_STOCK",                        │
//! │                   "message": "movement 2: ...",                        │
//! │                   "retryable": false, "position": 2 }                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use tally_core::stock::AuditReport;
use tally_core::{Availability, MovementResult, StockCardEntry, StockLevel, StockMovement, TimeRange};

use crate::error::{DbError, ErrorCode, LedgerError, LedgerResult};

// =============================================================================
// Request
// =============================================================================

/// One ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LedgerRequest {
    GetStock {
        product_id: String,
    },
    ValidateAvailability {
        product_id: String,
        quantity: i64,
    },
    ApplyMovements {
        movements: Vec<StockMovement>,
    },
    StockCard {
        product_id: String,
        #[serde(default)]
        range: TimeRange,
    },
    Audit {
        product_id: String,
    },
}

impl LedgerRequest {
    /// Parses a request payload.
    ///
    /// ## Returns
    /// * `Ok(request)` - well-formed payload
    /// * `Err(LedgerError::InvalidArgument)` - unknown `op`, missing field,
    ///   wrong type, or an unknown enum value such as a direction
    pub fn from_json(payload: &str) -> LedgerResult<Self> {
        serde_json::from_str(payload).map_err(|e| LedgerError::InvalidArgument(e.to_string()))
    }
}

// =============================================================================
// Response
// =============================================================================

/// Successful result of a [`LedgerRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data", rename_all = "snake_case")]
pub enum LedgerResponse {
    Stock(StockLevel),
    Availability(Availability),
    Movements(Vec<MovementResult>),
    StockCard(Vec<StockCardEntry>),
    Audit(AuditReport),
}

/// Error payload returned to callers.
///
/// ```json
/// {
///   "code": "STORAGE_FAILURE",
///   "message": "Storage temporarily unavailable",
///   "retryable": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable category
    pub code: ErrorCode,

    /// Human-readable message
    pub message: String,

    /// True when the same request may succeed later
    pub retryable: bool,

    /// 1-based movement position, when the error concerns one movement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl From<&LedgerError> for ErrorResponse {
    fn from(err: &LedgerError) -> Self {
        let message = match err {
            LedgerError::Storage(db) => storage_message(db),
            LedgerError::Contention(detail) => {
                tracing::warn!(detail = %detail, "Returning contention to caller");
                "Too many concurrent updates, try again".to_string()
            }
            other => other.to_string(),
        };

        ErrorResponse {
            code: err.code(),
            message,
            retryable: err.is_retryable(),
            position: err.position(),
        }
    }
}

impl From<LedgerError> for ErrorResponse {
    fn from(err: LedgerError) -> Self {
        ErrorResponse::from(&err)
    }
}

/// Logs the storage detail and returns a generic message.
fn storage_message(err: &DbError) -> String {
    match err {
        DbError::Unavailable(_) | DbError::ConnectionFailed(_) | DbError::PoolExhausted => {
            tracing::error!("Store unavailable: {}", err);
            "Storage temporarily unavailable".to_string()
        }
        DbError::TransactionFailed(_) => {
            tracing::error!("Transaction failed: {}", err);
            "Storage transaction failed".to_string()
        }
        _ => {
            tracing::error!("Storage operation failed: {}", err);
            "Storage operation failed".to_string()
        }
    }
}
