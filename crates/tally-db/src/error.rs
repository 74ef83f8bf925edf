//! # Ledger & Database Error Types
//!
//! Error types for storage and ledger operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          CoreError (tally-core)            │
//! │       │                                   │                             │
//! │       ▼                                   │                             │
//! │  DbError ← context + categorization       │                             │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  LedgerError ← adds the 1-based movement position                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ErrorResponse { code, message, retryable } ← serialized for callers   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rejected vs. Try Again
//! Business failures (validation, duplicates, not found, insufficient stock)
//! are final. Exhausted conflict retries and transient storage failures
//! (unreachable store, closed or exhausted pool, aborted transaction) are
//! `retryable`. Constraint violations and undecodable rows are not. The
//! store is unchanged in every case.

use serde::{Deserialize, Serialize};
use tally_core::{CoreError, ValidationError};
use thiserror::Error;

// =============================================================================
// Database Error
// =============================================================================

/// Storage operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and caller feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Registering a product id or code twice
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - A stock card row referencing a product that does not exist
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Optimistic concurrency check failed.
    ///
    /// ## When This Occurs
    /// Another batch committed a change to the same product between this
    /// batch's read and its commit. The ledger retries these.
    #[error("Version conflict on {entity} {id}")]
    Conflict { entity: String, id: String },

    /// Stored data could not be decoded (e.g. a malformed decimal).
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed (including constraint and trigger aborts).
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// The store is not reachable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a version Conflict error.
    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::Conflict {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns true for version conflicts, the only error the ledger retries.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict { .. })
    }

    /// Returns true when the same call may succeed later without any change
    /// to its input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Conflict { .. }
                | DbError::ConnectionFailed(_)
                | DbError::TransactionFailed(_)
                | DbError::PoolExhausted
                | DbError::Unavailable(_)
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
///                               (busy / locked → DbError::Unavailable)
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::Io             → DbError::Unavailable
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("database is locked") || msg.contains("database is busy") {
                    DbError::Unavailable(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::Io(io) => DbError::Unavailable(io.to_string()),

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DbError::InvalidData(err.to_string())
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Ledger Error
// =============================================================================

/// Errors returned by [`crate::InventoryLedger`].
///
/// `position` is the 1-based index of the offending movement in the batch.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A movement failed validation before anything was read or written.
    #[error("movement {position}: {source}")]
    InvalidMovement {
        position: usize,
        #[source]
        source: ValidationError,
    },

    /// A query argument or request payload is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A product with this id or code is already registered.
    #[error("duplicate {field}: '{value}' is already registered")]
    AlreadyExists { field: String, value: String },

    /// The product does not exist.
    #[error("product not found: {product_id}")]
    NotFound {
        product_id: String,
        position: Option<usize>,
    },

    /// An outbound movement would drive stock below zero.
    #[error("movement {position}: insufficient stock for {product_code}: available {stock_before}, requested {requested}")]
    InsufficientStock {
        position: usize,
        product_id: String,
        product_code: String,
        stock_before: i64,
        requested: i64,
    },

    /// Version conflicts persisted past the retry budget.
    #[error("too much contention: {0}")]
    Contention(String),

    /// The store failed; nothing was committed.
    #[error("storage failure: {0}")]
    Storage(#[from] DbError),
}

impl LedgerError {
    /// Attaches a batch position to a rule violation from tally-core.
    pub(crate) fn at(position: usize, err: CoreError) -> Self {
        match err {
            CoreError::Validation(source) => LedgerError::InvalidMovement { position, source },
            CoreError::ProductNotFound(product_id) => LedgerError::NotFound {
                product_id,
                position: Some(position),
            },
            CoreError::InsufficientStock {
                product_id,
                product_code,
                stock_before,
                requested,
            } => LedgerError::InsufficientStock {
                position,
                product_id,
                product_code,
                stock_before,
                requested,
            },
        }
    }

    /// Machine-readable category for callers.
    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::InvalidMovement { .. }
            | LedgerError::InvalidArgument(_)
            | LedgerError::AlreadyExists { .. } => ErrorCode::ValidationError,
            LedgerError::NotFound { .. } => ErrorCode::NotFound,
            LedgerError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            LedgerError::Contention(_) | LedgerError::Storage(_) => ErrorCode::StorageFailure,
        }
    }

    /// True when the same call may succeed if tried again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Contention(_) => true,
            LedgerError::Storage(db) => db.is_transient(),
            _ => false,
        }
    }

    /// The 1-based batch position this error refers to, if any.
    pub fn position(&self) -> Option<usize> {
        match self {
            LedgerError::InvalidMovement { position, .. }
            | LedgerError::InsufficientStock { position, .. } => Some(*position),
            LedgerError::NotFound { position, .. } => *position,
            _ => None,
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Error Codes
// =============================================================================

/// Error codes for ledger responses.
///
/// ## Usage by Callers
/// ```typescript
/// switch (e.code) {
///   case 'INSUFFICIENT_STOCK': showShortage(e.message); break;
///   case 'STORAGE_FAILURE':    if (e.retryable) retryLater(); break;
///   default:                   showError(e.message);
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed.
    ValidationError,
    /// Product does not exist.
    NotFound,
    /// Outbound movement exceeds available stock.
    InsufficientStock,
    /// Store failure or contention; nothing was changed.
    StorageFailure,
}

// =============================================================================
// Configuration Error
// =============================================================================

/// Errors from loading or validating [`crate::TallyConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_gain_position() {
        let err = LedgerError::at(
            3,
            CoreError::InsufficientStock {
                product_id: "p-1".into(),
                product_code: "KOPI-250".into(),
                stock_before: 5,
                requested: 10,
            },
        );
        assert_eq!(err.position(), Some(3));
        assert_eq!(err.code(), ErrorCode::InsufficientStock);
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "movement 3: insufficient stock for KOPI-250: available 5, requested 10"
        );
    }

    #[test]
    fn test_transient_storage_errors_are_retryable() {
        let transient = [
            DbError::Unavailable("disk gone".into()),
            DbError::ConnectionFailed("Pool is closed".into()),
            DbError::TransactionFailed("commit aborted".into()),
            DbError::PoolExhausted,
        ];
        for db in transient {
            let err = LedgerError::from(db);
            assert_eq!(err.code(), ErrorCode::StorageFailure);
            assert!(err.is_retryable(), "{err}");
        }
        assert!(LedgerError::Contention("p-1".into()).is_retryable());
    }

    #[test]
    fn test_permanent_storage_errors_are_not_retryable() {
        let permanent = [
            DbError::duplicate("products.id", "p-1"),
            DbError::ForeignKeyViolation {
                message: "FOREIGN KEY constraint failed".into(),
            },
            DbError::InvalidData("bad decimal".into()),
            DbError::MigrationFailed("checksum mismatch".into()),
            DbError::not_found("Product", "p-1"),
            DbError::QueryFailed("injected failure".into()),
            DbError::Internal("unexpected".into()),
        ];
        for db in permanent {
            let err = LedgerError::from(db);
            assert_eq!(err.code(), ErrorCode::StorageFailure);
            assert!(!err.is_retryable(), "{err}");
        }
    }

    #[test]
    fn test_duplicate_is_a_validation_error() {
        let err = LedgerError::AlreadyExists {
            field: "products.id".into(),
            value: "p-1".into(),
        };
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(!err.is_retryable());
        assert_eq!(err.position(), None);
    }

    #[test]
    fn test_error_code_wire_format() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::InsufficientStock).unwrap(),
            "\"INSUFFICIENT_STOCK\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::ValidationError).unwrap(),
            "\"VALIDATION_ERROR\""
        );
    }

    #[test]
    fn test_only_conflicts_are_conflicts() {
        assert!(DbError::conflict("Product", "p-1").is_conflict());
        assert!(!DbError::not_found("Product", "p-1").is_conflict());
    }
}
