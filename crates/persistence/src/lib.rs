//! Medbed record store.
//!
//! This crate provides durable keyed storage for the hospital domain:
//! hospitals, specializations, patients, staff, beds, visits, medical
//! records and billing accounts, on top of SQLite.
//!
//! # Architecture
//!
//! - [`types`] - Strongly typed identifiers and [`Stored`](types::Stored)
//! - [`models`] - Entity types and their table mappings
//! - [`error`] - Error types for all operations
//! - [`core`] - Backend, transaction and record traits
//! - [`backends`] - The SQLite backend
//!
//! # Quick Start
//!
//! ```no_run
//! use medbed_persistence::backends::sqlite::SqliteBackend;
//! use medbed_persistence::core::{Record, TransactionOptions, TransactionProvider};
//! use medbed_persistence::models::{Bed, Hospital, Specialization};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::in_memory()?;
//! backend.init_schema()?;
//!
//! let bed = backend.with_transaction(TransactionOptions::default(), |tx| {
//!     let hospital = Hospital::new("1 Main St", "5550001111").insert(tx)?;
//!     Specialization::new("neurology", Some(10.0)).insert(tx)?;
//!     Bed::new(hospital.id(), "neurology").insert(tx)
//! })?;
//! assert!(!bed.occupied);
//! # Ok(())
//! # }
//! ```
//!
//! # Transactions
//!
//! Every logical operation acquires its own pooled connection through
//! [`TransactionProvider::begin_transaction`]. A transaction dereferences to
//! [`rusqlite::Connection`], so the CRUD functions in [`models`] work the same
//! inside and outside one.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod core;
pub mod error;
pub mod models;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{StorageError, StorageResult};
pub use types::Stored;

// Re-export core traits
pub use crate::core::{Backend, BackendKind, Record, Transaction, TransactionOptions, TransactionProvider};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
