use thiserror::Error;
use uuid::Uuid;

use crate::validation::NameError;

/// Errors that can arise in the economy core and its storage layer.
///
/// Business refusals (insufficient funds, cooldowns, rank gates) are NOT
/// errors; they travel as [`crate::economy::DeclineReason`] inside an
/// [`crate::economy::Outcome`]. This enum covers programming errors,
/// configuration problems, storage faults, and integrity violations.
#[derive(Debug, Error)]
pub enum EconomyError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, backup archives, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around JSON errors (backup metadata, exports).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// A caller passed an amount outside the documented domain (non-positive
    /// where positive is required, negative where non-negative is required).
    /// Always a programming error at the call site, never a user outcome.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Configuration rejected at load time (bad thresholds, zero durations).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A display name failed validation.
    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    /// The transaction log for an account does not replay to its stored
    /// balance. Indicates corruption or an out-of-band write; treated as
    /// fatal by callers, never silently repaired.
    #[error("ledger mismatch for {account}: replayed {replayed}, stored {stored}")]
    LedgerMismatch {
        account: Uuid,
        replayed: f64,
        stored: f64,
    },

    /// Internal error (poisoned locks, unexpected conditions).
    #[error("internal error: {0}")]
    Internal(String),
}
