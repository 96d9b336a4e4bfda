//! Transaction traits for atomic multi-statement operations.
//!
//! Every logical operation against the record store runs inside its own
//! transaction on its own pooled connection. Nothing in this crate hands out a
//! process-wide connection.

use std::ops::Deref;

use rusqlite::Connection;
use tracing::warn;

use crate::backends::sqlite::with_savepoint;
use crate::error::{StorageError, StorageResult};

/// How eagerly a transaction takes the database write lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionBehavior {
    /// Locks are acquired on first read/write.
    Deferred,
    /// The write lock is acquired immediately, so the whole
    /// read-check-write sequence runs without interleaving writers.
    #[default]
    Immediate,
    /// Exclusive lock; readers in other connections are blocked too.
    Exclusive,
}

impl TransactionBehavior {
    pub(crate) fn begin_statement(self) -> &'static str {
        match self {
            TransactionBehavior::Deferred => "BEGIN DEFERRED",
            TransactionBehavior::Immediate => "BEGIN IMMEDIATE",
            TransactionBehavior::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

impl std::fmt::Display for TransactionBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionBehavior::Deferred => write!(f, "deferred"),
            TransactionBehavior::Immediate => write!(f, "immediate"),
            TransactionBehavior::Exclusive => write!(f, "exclusive"),
        }
    }
}

/// Options for starting a transaction.
#[derive(Debug, Clone, Default)]
pub struct TransactionOptions {
    /// Lock acquisition behavior.
    pub behavior: TransactionBehavior,
    /// Whether writes are rejected for the duration of the transaction.
    pub read_only: bool,
}

impl TransactionOptions {
    /// Creates new options with defaults (immediate, read-write).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lock acquisition behavior.
    pub fn behavior(mut self, behavior: TransactionBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Options for a read-only transaction.
    pub fn read_only() -> Self {
        Self {
            behavior: TransactionBehavior::Deferred,
            read_only: true,
        }
    }
}

/// An active database transaction.
///
/// A transaction dereferences to the underlying [`Connection`], so any
/// function taking `&Connection` participates in it. Changes are only
/// persisted when [`commit`](Transaction::commit) is called; dropping an
/// active transaction rolls it back.
pub trait Transaction: Deref<Target = Connection> {
    /// Commits the transaction, persisting all changes.
    fn commit(self) -> StorageResult<()>
    where
        Self: Sized;

    /// Rolls back the transaction, discarding all changes.
    fn rollback(self) -> StorageResult<()>
    where
        Self: Sized;

    /// Returns whether this transaction is still active.
    fn is_active(&self) -> bool;

    /// Runs `f` inside a named savepoint nested in this transaction.
    ///
    /// If `f` fails, only the savepoint's writes are undone and the outer
    /// transaction stays usable.
    fn savepoint<R, E, F>(&self, name: &str, f: F) -> Result<R, E>
    where
        F: FnOnce(&Connection) -> Result<R, E>,
        E: From<StorageError>,
    {
        with_savepoint(&**self, name, f)
    }
}

/// Provider for transaction support.
pub trait TransactionProvider: Send + Sync {
    /// The transaction type returned by this provider.
    type Transaction: Transaction;

    /// Begins a new transaction on a freshly acquired connection.
    ///
    /// # Errors
    ///
    /// * `StorageError::Backend` - If no connection can be acquired
    /// * `StorageError::Transaction(RolledBack)` - If `BEGIN` fails (e.g. busy timeout)
    fn begin_transaction(&self, options: TransactionOptions) -> StorageResult<Self::Transaction>;

    /// Executes a function within a transaction.
    ///
    /// If the function returns `Ok`, the transaction is committed.
    /// If it returns `Err`, the transaction is rolled back and the error is
    /// returned unchanged.
    fn with_transaction<R, E, F>(&self, options: TransactionOptions, f: F) -> Result<R, E>
    where
        F: FnOnce(&Self::Transaction) -> Result<R, E>,
        E: From<StorageError>,
    {
        let tx = self.begin_transaction(options)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "rollback after failed operation also failed");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = TransactionOptions::new();
        assert_eq!(options.behavior, TransactionBehavior::Immediate);
        assert!(!options.read_only);
    }

    #[test]
    fn test_read_only_options() {
        let options = TransactionOptions::read_only();
        assert_eq!(options.behavior, TransactionBehavior::Deferred);
        assert!(options.read_only);
    }

    #[test]
    fn test_begin_statement() {
        assert_eq!(
            TransactionBehavior::Exclusive.begin_statement(),
            "BEGIN EXCLUSIVE"
        );
        assert_eq!(TransactionBehavior::Deferred.to_string(), "deferred");
    }
}
