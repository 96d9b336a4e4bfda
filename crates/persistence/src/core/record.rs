//! Generic keyed record storage.
//!
//! Each entity table with a generated integer key implements [`Record`] by
//! describing its table, its columns and how to map a row. The trait then
//! provides insert/get/find/update/delete/list on any [`Connection`], which
//! includes an open transaction.
//!
//! A record that has been persisted is wrapped in [`Stored`], which pairs the
//! generated identity with the record's fields.

use std::fmt;
use std::ops::Deref;

use rusqlite::types::{FromSql, ToSql};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// A persisted record together with its generated identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound(serialize = "R: Serialize"))]
pub struct Stored<R: Record> {
    id: R::Id,
    #[serde(flatten)]
    record: R,
}

impl<R: Record> Stored<R> {
    /// Pairs an identity with its record.
    pub fn new(id: R::Id, record: R) -> Self {
        Self { id, record }
    }

    /// Returns the record's identity.
    pub fn id(&self) -> R::Id {
        self.id
    }

    /// Returns the record's fields.
    pub fn record(&self) -> &R {
        &self.record
    }

    /// Returns mutable access to the record's fields.
    pub fn record_mut(&mut self) -> &mut R {
        &mut self.record
    }

    /// Consumes the wrapper and returns the fields.
    pub fn into_inner(self) -> R {
        self.record
    }
}

impl<R: Record> Deref for Stored<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.record
    }
}

/// A table row with a generated integer identity.
pub trait Record: Sized {
    /// Identity type of this record.
    type Id: Copy + fmt::Debug + fmt::Display + PartialEq + Serialize + ToSql + FromSql + 'static;

    /// Human-readable entity name used in errors ("bed", "hospital visit").
    const ENTITY: &'static str;

    /// Table holding the record.
    const TABLE: &'static str;

    /// Primary key column.
    const ID_COLUMN: &'static str = "id";

    /// Non-key columns, in the order produced by [`Record::values`] and
    /// consumed by [`Record::from_row`] (starting at index 1).
    const COLUMNS: &'static [&'static str];

    /// Maps a row selected by [`Record::select_sql`]. Column 0 is the key.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Values to bind for [`Record::COLUMNS`].
    fn values(&self) -> Vec<&dyn ToSql>;

    /// `SELECT` statement returning the key followed by the record columns.
    fn select_sql() -> String {
        format!(
            "SELECT {}, {} FROM {}",
            Self::ID_COLUMN,
            Self::COLUMNS.join(", "),
            Self::TABLE
        )
    }

    /// Maps a row into a [`Stored`] record.
    fn read_stored(row: &Row<'_>) -> rusqlite::Result<Stored<Self>> {
        Ok(Stored::new(row.get(0)?, Self::from_row(row)?))
    }

    /// Inserts the record and returns it with its generated identity.
    fn insert(self, conn: &Connection) -> StorageResult<Stored<Self>> {
        let placeholders = (1..=Self::COLUMNS.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            Self::TABLE,
            Self::COLUMNS.join(", "),
            placeholders
        );
        conn.execute(&sql, self.values().as_slice())?;
        let id: Self::Id = conn.query_row("SELECT last_insert_rowid()", [], |row| row.get(0))?;
        debug!(entity = Self::ENTITY, id = %id, "inserted record");
        Ok(Stored::new(id, self))
    }

    /// Looks up a record by identity.
    fn find(conn: &Connection, id: Self::Id) -> StorageResult<Option<Stored<Self>>> {
        let sql = format!(
            "{} WHERE {}.{} = ?1",
            Self::select_sql(),
            Self::TABLE,
            Self::ID_COLUMN
        );
        let found = conn
            .query_row(&sql, [id], |row| Self::read_stored(row))
            .optional()?;
        Ok(found)
    }

    /// Looks up a record by identity, failing with `NotFound` if absent.
    fn get(conn: &Connection, id: Self::Id) -> StorageResult<Stored<Self>> {
        Self::find(conn, id)?.ok_or_else(|| StorageError::not_found(Self::ENTITY, id))
    }

    /// Writes every column of `stored` back to its row.
    fn update(stored: &Stored<Self>, conn: &Connection) -> StorageResult<()> {
        let assignments = Self::COLUMNS
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            Self::TABLE,
            assignments,
            Self::ID_COLUMN,
            Self::COLUMNS.len() + 1
        );
        let id = stored.id();
        let mut values = stored.record().values();
        values.push(&id);
        let changed = conn.execute(&sql, values.as_slice())?;
        if changed == 0 {
            return Err(StorageError::not_found(Self::ENTITY, id));
        }
        Ok(())
    }

    /// Deletes a record by identity. Referential actions declared in the
    /// schema (cascade / set null) are applied by the store.
    fn delete(conn: &Connection, id: Self::Id) -> StorageResult<()> {
        let sql = format!("DELETE FROM {} WHERE {} = ?1", Self::TABLE, Self::ID_COLUMN);
        let changed = conn.execute(&sql, [id])?;
        if changed == 0 {
            return Err(StorageError::not_found(Self::ENTITY, id));
        }
        debug!(entity = Self::ENTITY, id = %id, "deleted record");
        Ok(())
    }

    /// Lists all records ordered by identity.
    fn list(conn: &Connection) -> StorageResult<Vec<Stored<Self>>> {
        let sql = format!(
            "{} ORDER BY {}.{}",
            Self::select_sql(),
            Self::TABLE,
            Self::ID_COLUMN
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| Self::read_stored(row))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
