//! Transaction support for SQLite backend.

use std::ops::Deref;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{trace, warn};

use crate::core::{Transaction, TransactionOptions, TransactionProvider};
use crate::error::{StorageError, StorageResult, TransactionError};

use super::SqliteBackend;

/// A SQLite transaction bound to one pooled connection.
pub struct SqliteTransaction {
    /// The connection used for this transaction.
    conn: PooledConnection<SqliteConnectionManager>,
    /// Whether the transaction is still active.
    active: bool,
    /// Whether `query_only` was switched on for this transaction.
    read_only: bool,
}

impl std::fmt::Debug for SqliteTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTransaction")
            .field("active", &self.active)
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl SqliteTransaction {
    /// Starts a transaction on the given connection.
    fn new(
        conn: PooledConnection<SqliteConnectionManager>,
        options: &TransactionOptions,
    ) -> StorageResult<Self> {
        conn.execute_batch(options.behavior.begin_statement())
            .map_err(|e| {
                StorageError::Transaction(TransactionError::RolledBack {
                    reason: format!("Failed to begin transaction: {}", e),
                })
            })?;

        if options.read_only {
            if let Err(e) = conn.execute_batch("PRAGMA query_only = ON") {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e.into());
            }
        }

        trace!(behavior = %options.behavior, read_only = options.read_only, "transaction started");

        Ok(Self {
            conn,
            active: true,
            read_only: options.read_only,
        })
    }

    fn finish(&mut self, statement: &str) -> StorageResult<()> {
        if !self.active {
            return Err(StorageError::Transaction(
                TransactionError::InvalidTransaction,
            ));
        }

        let result = self.conn.execute_batch(statement);
        if result.is_err() && statement == "COMMIT" {
            // A failed COMMIT may leave the transaction open.
            let _ = self.conn.execute_batch("ROLLBACK");
        }
        self.active = false;
        self.reset_query_only();

        result.map_err(|e| {
            StorageError::Transaction(TransactionError::RolledBack {
                reason: format!("{} failed: {}", statement, e),
            })
        })
    }

    fn reset_query_only(&mut self) {
        if self.read_only {
            if let Err(e) = self.conn.execute_batch("PRAGMA query_only = OFF") {
                warn!(error = %e, "failed to reset query_only on pooled connection");
            }
            self.read_only = false;
        }
    }
}

impl Deref for SqliteTransaction {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Transaction for SqliteTransaction {
    fn commit(mut self) -> StorageResult<()> {
        self.finish("COMMIT")
    }

    fn rollback(mut self) -> StorageResult<()> {
        self.finish("ROLLBACK")
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        // If transaction wasn't explicitly committed or rolled back, roll it back
        if self.active {
            let _ = self.conn.execute_batch("ROLLBACK");
            self.active = false;
        }
        self.reset_query_only();
    }
}

impl TransactionProvider for SqliteBackend {
    type Transaction = SqliteTransaction;

    fn begin_transaction(&self, options: TransactionOptions) -> StorageResult<Self::Transaction> {
        let conn = self.get_connection()?;
        SqliteTransaction::new(conn, &options)
    }
}

/// Runs `f` inside a named savepoint on `conn`.
///
/// On success the savepoint is released. On failure its writes are rolled
/// back and the enclosing transaction continues.
pub fn with_savepoint<R, E, F>(conn: &Connection, name: &str, f: F) -> Result<R, E>
where
    F: FnOnce(&Connection) -> Result<R, E>,
    E: From<StorageError>,
{
    conn.execute_batch(&format!("SAVEPOINT {}", name))
        .map_err(StorageError::from)?;

    match f(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {}", name))
                .map_err(StorageError::from)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(e) = conn.execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0}", name)) {
                warn!(savepoint = name, error = %e, "failed to roll back savepoint");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransactionBehavior;

    fn create_test_backend() -> SqliteBackend {
        let backend = SqliteBackend::in_memory().unwrap();
        backend
            .get_connection()
            .unwrap()
            .execute_batch("CREATE TABLE t (v INTEGER NOT NULL)")
            .unwrap();
        backend
    }

    fn count(backend: &SqliteBackend) -> i64 {
        backend
            .get_connection()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_transaction_commit() {
        let backend = create_test_backend();

        let tx = backend
            .begin_transaction(TransactionOptions::default())
            .unwrap();
        assert!(tx.is_active());
        tx.execute("INSERT INTO t (v) VALUES (1)", []).unwrap();
        tx.commit().unwrap();

        assert_eq!(count(&backend), 1);
    }

    #[test]
    fn test_transaction_rollback() {
        let backend = create_test_backend();

        let tx = backend
            .begin_transaction(TransactionOptions::default())
            .unwrap();
        tx.execute("INSERT INTO t (v) VALUES (1)", []).unwrap();
        tx.rollback().unwrap();

        assert_eq!(count(&backend), 0);
    }

    #[test]
    fn test_transaction_auto_rollback_on_drop() {
        let backend = create_test_backend();

        {
            let tx = backend
                .begin_transaction(TransactionOptions::default())
                .unwrap();
            tx.execute("INSERT INTO t (v) VALUES (1)", []).unwrap();
            // Drop without commit or rollback
        }

        assert_eq!(count(&backend), 0);
    }

    #[test]
    fn test_with_transaction_rolls_back_on_error() {
        let backend = create_test_backend();

        let result: StorageResult<()> =
            backend.with_transaction(TransactionOptions::default(), |tx| {
                tx.execute("INSERT INTO t (v) VALUES (1)", [])?;
                Err(StorageError::not_found("bed", 1))
            });

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(count(&backend), 0);
    }

    #[test]
    fn test_savepoint_failure_keeps_outer_writes() {
        let backend = create_test_backend();

        backend
            .with_transaction(TransactionOptions::default(), |tx| {
                tx.execute("INSERT INTO t (v) VALUES (1)", [])?;
                let inner: StorageResult<()> = tx.savepoint("inner", |conn| {
                    conn.execute("INSERT INTO t (v) VALUES (2)", [])?;
                    conn.execute("INSERT INTO t (v) VALUES (NULL)", [])?;
                    Ok(())
                });
                assert!(inner.unwrap_err().is_constraint_violation());
                Ok::<_, StorageError>(())
            })
            .unwrap();

        assert_eq!(count(&backend), 1);
    }

    #[test]
    fn test_read_only_transaction_rejects_writes() {
        let backend = create_test_backend();

        let tx = backend
            .begin_transaction(TransactionOptions::read_only())
            .unwrap();
        let err: StorageError = tx
            .execute("INSERT INTO t (v) VALUES (1)", [])
            .unwrap_err()
            .into();
        assert!(matches!(
            err,
            StorageError::Transaction(TransactionError::ReadOnly)
        ));
        tx.rollback().unwrap();

        // The pooled connection is writable again afterwards.
        backend
            .with_transaction(TransactionOptions::default(), |tx| {
                tx.execute("INSERT INTO t (v) VALUES (1)", [])
                    .map_err(StorageError::from)
            })
            .unwrap();
        assert_eq!(count(&backend), 1);
    }

    #[test]
    fn test_deferred_behavior() {
        let backend = create_test_backend();
        let tx = backend
            .begin_transaction(TransactionOptions::new().behavior(TransactionBehavior::Deferred))
            .unwrap();
        assert!(tx.is_active());
        tx.commit().unwrap();
    }
}
