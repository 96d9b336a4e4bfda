//! Database backend implementations.
//!
//! Only SQLite is provided. It runs either in-memory or against a file.
//!
//! ```no_run
//! use medbed_persistence::backends::sqlite::SqliteBackend;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Create an in-memory SQLite backend
//! let backend = SqliteBackend::in_memory()?;
//!
//! // Or use a file-based database
//! let backend = SqliteBackend::open("./data/medbed.db")?;
//! # Ok(())
//! # }
//! ```

pub mod sqlite;
