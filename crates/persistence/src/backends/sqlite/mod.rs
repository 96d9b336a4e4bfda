//! SQLite backend implementation.
//!
//! Supports both in-memory databases (used throughout the test suites) and
//! file-based databases.
//!
//! # Example
//!
//! ```no_run
//! use medbed_persistence::backends::sqlite::SqliteBackend;
//! use medbed_persistence::core::{TransactionOptions, TransactionProvider};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::open("./data/medbed.db")?;
//! backend.init_schema()?;
//!
//! backend.with_transaction(TransactionOptions::default(), |tx| {
//!     tx.execute("UPDATE bed SET occupied = 0 WHERE id = ?1", [7])?;
//!     Ok::<_, medbed_persistence::StorageError>(())
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! One table per entity (`hospital`, `specialization`, `person`, `patient`,
//! `staff`, `bed`, `hospital_visit`, `medical_record`, `billing`) plus the
//! link tables `hospital_specialty` and `responsible_staff`. Patients and
//! staff members share the `person` table's identity. The version is kept in
//! `schema_version`.

mod backend;
pub mod schema;
mod transaction;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use transaction::{SqliteTransaction, with_savepoint};
