//! Error types for access-control operations.

use thiserror::Error;

/// Result type alias for access-control operations.
pub type Result<T> = std::result::Result<T, AccessError>;

/// Main error type for access-control operations.
///
/// Denial of access is never an error: decisions report `Forbidden` as a
/// normal value. Errors are reserved for invalid policy input, storage
/// failures, and data-integrity violations.
#[derive(Error, Debug)]
pub enum AccessError {
    /// An unknown role, object kind, or permission was supplied to a
    /// permission-matrix mutation. Rejected before any state change.
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// A call site required an already-persisted record and forbade the
    /// implicit-default behavior.
    #[error("Access record not available: {0}")]
    RecordNotAvailable(String),

    /// Underlying persistence failure. The whole write batch is rolled
    /// back; no partial writes are visible.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The category tree violated its invariants (cycle or runaway depth
    /// detected during a walk). Fatal; never silently worked around.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// I/O errors from underlying database handles.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors in the storage layer.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AccessError {
    /// Creates a new invalid-policy error.
    pub fn invalid_policy<T: ToString>(msg: T) -> Self {
        Self::InvalidPolicy(msg.to_string())
    }

    /// Creates a new record-not-available error.
    pub fn record_not_available<T: ToString>(msg: T) -> Self {
        Self::RecordNotAvailable(msg.to_string())
    }

    /// Creates a new storage error.
    pub fn storage<T: ToString>(msg: T) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Creates a new data-integrity error.
    pub fn data_integrity<T: ToString>(msg: T) -> Self {
        Self::DataIntegrity(msg.to_string())
    }

    /// Creates a new serialization error.
    pub fn serialization<T: ToString>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }
}
