//! SQLite backend implementation.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{Backend, BackendKind};
use crate::error::{BackendError, StorageError, StorageResult};

use super::schema;

const BACKEND_NAME: &str = "sqlite";

/// SQLite backend for the hospital record store.
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    path: Option<PathBuf>,
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("config", &self.config)
            .field("path", &self.path)
            .field("pool_state", &self.pool.state())
            .finish()
    }
}

/// Configuration for the SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds. A writer waiting on another
    /// writer's `BEGIN IMMEDIATE` gives up after this long.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for file databases.
    #[serde(default = "default_true")]
    pub enable_wal: bool,

    /// Enable foreign key constraints on every connection.
    #[serde(default = "default_true")]
    pub enable_foreign_keys: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

impl SqliteBackend {
    /// Creates a new in-memory SQLite backend.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_config(":memory:", SqliteBackendConfig::default())
    }

    /// Opens or creates a file-based SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Creates a backend with custom configuration.
    ///
    /// The path `":memory:"` selects an in-memory database. Each in-memory
    /// connection would be its own empty database, so the pool is pinned to
    /// a single connection that is never recycled.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteBackendConfig,
    ) -> StorageResult<Self> {
        let is_memory = path.as_ref().as_os_str() == ":memory:";

        let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
        let foreign_keys = config.enable_foreign_keys;
        let manager = if is_memory {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(path.as_ref())
        }
        .with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if foreign_keys {
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            }
            Ok(())
        });

        let builder = Pool::builder().connection_timeout(Duration::from_millis(
            config.connection_timeout_ms,
        ));
        let builder = if is_memory {
            builder
                .max_size(1)
                .min_idle(Some(1))
                .max_lifetime(None)
                .idle_timeout(None)
        } else {
            builder
                .max_size(config.max_connections)
                .min_idle(Some(config.min_connections.min(config.max_connections)))
        };

        let pool = builder.build(manager).map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: BACKEND_NAME.to_string(),
                message: e.to_string(),
            })
        })?;

        let backend = Self {
            pool,
            config,
            path: (!is_memory).then(|| path.as_ref().to_path_buf()),
        };

        backend.configure_journal()?;
        debug!(path = ?backend.path, "sqlite backend ready");

        Ok(backend)
    }

    /// Initialize the database schema.
    pub fn init_schema(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn)?;
        info!(version = schema::SCHEMA_VERSION, "schema initialized");
        Ok(())
    }

    /// Returns the current schema version, or `None` for an empty database.
    pub fn schema_version(&self) -> StorageResult<Option<i32>> {
        let conn = self.get_connection()?;
        schema::get_schema_version(&conn)
    }

    /// Get a connection from the pool.
    ///
    /// Statements run on this connection autocommit. Use
    /// [`TransactionProvider::begin_transaction`](crate::core::TransactionProvider::begin_transaction)
    /// for atomic multi-statement work. With an in-memory backend the single
    /// pooled connection must be returned before another operation starts.
    pub fn get_connection(&self) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: BACKEND_NAME.to_string(),
                message: e.to_string(),
            })
        })
    }

    fn configure_journal(&self) -> StorageResult<()> {
        if self.config.enable_wal && !self.is_memory() {
            let conn = self.get_connection()?;
            conn.execute_batch("PRAGMA journal_mode = WAL;").map_err(|e| {
                StorageError::Backend(BackendError::Internal {
                    backend_name: BACKEND_NAME.to_string(),
                    message: format!("Failed to enable WAL mode: {}", e),
                    source: None,
                })
            })?;
        }
        Ok(())
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.path.is_none()
    }

    /// Returns the database file path, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }
}

impl Backend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn health_check(&self) -> Result<(), BackendError> {
        let conn = self
            .get_connection()
            .map_err(|_| BackendError::ConnectionFailed {
                backend_name: BACKEND_NAME.to_string(),
                message: "Failed to get connection".to_string(),
            })?;
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| BackendError::Internal {
                backend_name: BACKEND_NAME.to_string(),
                message: format!("Health check failed: {}", e),
                source: None,
            })?;
        Ok(())
    }

    fn initialize(&self) -> Result<(), BackendError> {
        self.init_schema().map_err(|e| match e {
            StorageError::Backend(err) => err,
            other => BackendError::MigrationError {
                message: other.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_backend() {
        let backend = SqliteBackend::in_memory().unwrap();
        assert!(backend.is_memory());
        assert_eq!(backend.name(), "sqlite");
        assert_eq!(backend.kind(), BackendKind::Sqlite);
    }

    #[test]
    fn test_backend_initialization() {
        let backend = SqliteBackend::in_memory().unwrap();
        assert_eq!(backend.schema_version().unwrap(), None);
        backend.init_schema().unwrap();
        backend.init_schema().unwrap(); // Should be idempotent
        assert_eq!(backend.schema_version().unwrap(), Some(schema::SCHEMA_VERSION));
    }

    #[test]
    fn test_in_memory_state_survives_between_connections() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        {
            let conn = backend.get_connection().unwrap();
            conn.execute(
                "INSERT INTO hospital (address, phone) VALUES ('1 Main St', '555')",
                [],
            )
            .unwrap();
        }
        let conn = backend.get_connection().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM hospital", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let backend = SqliteBackend::in_memory().unwrap();
        let conn = backend.get_connection().unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_health_check() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.initialize().unwrap();
        assert!(backend.health_check().is_ok());
    }

    #[test]
    fn test_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medbed.db");
        let backend = SqliteBackend::open(&path).unwrap();
        assert!(!backend.is_memory());
        assert_eq!(backend.path(), Some(path.as_path()));
        backend.init_schema().unwrap();

        let reopened = SqliteBackend::open(&path).unwrap();
        assert_eq!(
            reopened.schema_version().unwrap(),
            Some(schema::SCHEMA_VERSION)
        );
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: SqliteBackendConfig = serde_json::from_str(r#"{"busy_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.max_connections, 10);
        assert!(config.enable_foreign_keys);
    }
}
