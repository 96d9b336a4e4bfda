//! Error types for the record store.
//!
//! This module defines the error hierarchy used by every persistence operation,
//! separating missing/duplicate records, validation problems, transaction state
//! and backend (driver/pool) failures.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Record state errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transaction errors
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StorageError {
    /// Builds a [`ResourceError::NotFound`] for the given entity kind and key.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StorageError::Resource(ResourceError::NotFound {
            entity,
            id: id.to_string(),
        })
    }

    /// Returns `true` if this error reports a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::Resource(ResourceError::NotFound { .. }))
    }

    /// Returns `true` if the backend rejected a write because of a constraint
    /// (foreign key, unique, check or trigger abort).
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Backend(BackendError::ConstraintViolation { .. })
        )
    }
}

/// Errors related to record state.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A record with the given key already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },
}

/// Errors related to record validation.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A field value is outside its allowed domain.
    #[error("invalid value for {field}: {message}")]
    InvalidField { field: &'static str, message: String },

    /// A stored enumeration value could not be decoded.
    #[error("unknown {kind} value: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    /// Record has no identity yet (it was never inserted).
    #[error("{entity} has no identity; insert it first")]
    MissingIdentity { entity: &'static str },
}

/// Errors related to transactions.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Transaction was rolled back.
    #[error("transaction rolled back: {reason}")]
    RolledBack { reason: String },

    /// Transaction is no longer valid (already committed or rolled back).
    #[error("transaction no longer valid")]
    InvalidTransaction,

    /// A write was attempted on a read-only transaction.
    #[error("write attempted in read-only transaction")]
    ReadOnly,
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// A constraint or trigger rejected the statement.
    #[error("constraint violation: {message}")]
    ConstraintViolation { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, message) = &err {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                return StorageError::Backend(BackendError::ConstraintViolation {
                    message: message.clone().unwrap_or_else(|| code.to_string()),
                });
            }
            if code.code == rusqlite::ErrorCode::ReadOnly {
                return StorageError::Transaction(TransactionError::ReadOnly);
            }
        }
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

impl From<r2d2::Error> for StorageError {
    fn from(_err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: format!("serialization error: {}", err),
            source: Some(Box::new(err)),
        })
    }
}
