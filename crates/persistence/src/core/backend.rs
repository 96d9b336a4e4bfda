//! Backend abstraction for database drivers.
//!
//! This module defines the [`Backend`] trait implemented by each storage
//! driver: identification, health checks and schema initialization.

use std::fmt::Debug;

use crate::error::BackendError;

/// Identifies the type of database backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// SQLite database (file-based or in-memory).
    Sqlite,
    /// Custom or unknown backend.
    Custom(&'static str),
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// A database backend that can be checked and initialized.
pub trait Backend: Send + Sync + Debug {
    /// Returns the kind of this backend.
    fn kind(&self) -> BackendKind;

    /// Returns a short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Verifies that a connection can be acquired and a trivial query runs.
    fn health_check(&self) -> Result<(), BackendError>;

    /// Creates or migrates the schema.
    fn initialize(&self) -> Result<(), BackendError>;
}
