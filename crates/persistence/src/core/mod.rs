//! Core storage traits and abstractions.
//!
//! - [`Backend`] - Database driver abstraction
//! - [`Transaction`] / [`TransactionProvider`] - Atomic multi-statement work
//! - [`Record`] - Keyed CRUD for entity tables

pub mod backend;
pub mod record;
pub mod transaction;

pub use backend::{Backend, BackendKind};
pub use record::{Record, Stored};
pub use transaction::{Transaction, TransactionBehavior, TransactionOptions, TransactionProvider};
