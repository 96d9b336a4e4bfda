//! Hospitals, specializations and the specialties each hospital offers.

use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::Record;
use crate::error::{ResourceError, StorageError, StorageResult};
use crate::types::HospitalId;

/// A care facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    /// Street address.
    pub address: String,
    /// Contact phone number.
    pub phone: String,
}

impl Hospital {
    /// Creates a hospital record ready for insertion.
    pub fn new(address: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            phone: phone.into(),
        }
    }
}

impl Record for Hospital {
    type Id = HospitalId;

    const ENTITY: &'static str = "hospital";
    const TABLE: &'static str = "hospital";
    const COLUMNS: &'static [&'static str] = &["address", "phone"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            address: row.get(1)?,
            phone: row.get(2)?,
        })
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.address, &self.phone]
    }
}

/// A medical specialization, keyed by name, with its daily charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specialization {
    /// Unique name, e.g. `neurology`.
    pub name: String,
    /// Daily charge for a stay under this specialization.
    pub charges_per_day: Option<f64>,
}

impl Specialization {
    /// Creates a specialization record ready for insertion.
    pub fn new(name: impl Into<String>, charges_per_day: Option<f64>) -> Self {
        Self {
            name: name.into(),
            charges_per_day,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            charges_per_day: row.get(1)?,
        })
    }

    /// Inserts the specialization, failing with `AlreadyExists` if the name
    /// is taken.
    pub fn insert(&self, conn: &Connection) -> StorageResult<()> {
        if Self::find(conn, &self.name)?.is_some() {
            return Err(StorageError::Resource(ResourceError::AlreadyExists {
                entity: "specialization",
                id: self.name.clone(),
            }));
        }
        conn.execute(
            "INSERT INTO specialization (name, charges_per_day) VALUES (?1, ?2)",
            params![self.name, self.charges_per_day],
        )?;
        debug!(specialization = %self.name, "inserted specialization");
        Ok(())
    }

    /// Looks up a specialization by name.
    pub fn find(conn: &Connection, name: &str) -> StorageResult<Option<Self>> {
        let found = conn
            .query_row(
                "SELECT name, charges_per_day FROM specialization WHERE name = ?1",
                [name],
                Self::from_row,
            )
            .optional()?;
        Ok(found)
    }

    /// Looks up a specialization by name, failing with `NotFound` if absent.
    pub fn get(conn: &Connection, name: &str) -> StorageResult<Self> {
        Self::find(conn, name)?.ok_or_else(|| StorageError::not_found("specialization", name))
    }

    /// Updates the daily charge.
    pub fn update(&self, conn: &Connection) -> StorageResult<()> {
        let changed = conn.execute(
            "UPDATE specialization SET charges_per_day = ?1 WHERE name = ?2",
            params![self.charges_per_day, self.name],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("specialization", &self.name));
        }
        Ok(())
    }

    /// Deletes the specialization. Beds of this specialization are deleted
    /// with it and staff members lose their specialization.
    pub fn delete(conn: &Connection, name: &str) -> StorageResult<()> {
        let changed = conn.execute("DELETE FROM specialization WHERE name = ?1", [name])?;
        if changed == 0 {
            return Err(StorageError::not_found("specialization", name));
        }
        Ok(())
    }

    /// Lists all specializations by name.
    pub fn list(conn: &Connection) -> StorageResult<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT name, charges_per_day FROM specialization ORDER BY name")?;
        let rows = stmt.query_map([], Self::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// Link between a hospital and a specialization it offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HospitalSpecialty {
    /// The hospital offering the specialization.
    pub hospital_id: HospitalId,
    /// The specialization's name.
    pub specialization: String,
}

impl HospitalSpecialty {
    /// Creates a link ready for insertion.
    pub fn new(hospital_id: HospitalId, specialization: impl Into<String>) -> Self {
        Self {
            hospital_id,
            specialization: specialization.into(),
        }
    }

    /// Records the link. Adding an existing link is a no-op.
    pub fn insert(&self, conn: &Connection) -> StorageResult<()> {
        conn.execute(
            "INSERT OR IGNORE INTO hospital_specialty (hospital_id, specialization) VALUES (?1, ?2)",
            params![self.hospital_id, self.specialization],
        )?;
        Ok(())
    }

    /// Removes the link.
    pub fn delete(&self, conn: &Connection) -> StorageResult<()> {
        let changed = conn.execute(
            "DELETE FROM hospital_specialty WHERE hospital_id = ?1 AND specialization = ?2",
            params![self.hospital_id, self.specialization],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found(
                "hospital specialty",
                format!("{}/{}", self.hospital_id, self.specialization),
            ));
        }
        Ok(())
    }

    /// Specializations offered by a hospital, by name.
    pub fn for_hospital(conn: &Connection, hospital_id: HospitalId) -> StorageResult<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT specialization FROM hospital_specialty WHERE hospital_id = ?1 ORDER BY specialization",
        )?;
        let rows = stmt.query_map([hospital_id], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sqlite::schema::initialize_schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        initialize_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_hospital_crud() {
        let conn = conn();
        let mut stored = Hospital::new("1 Main St", "5550001111").insert(&conn).unwrap();

        stored.record_mut().phone = "5550002222".to_string();
        Hospital::update(&stored, &conn).unwrap();
        let read = Hospital::get(&conn, stored.id()).unwrap();
        assert_eq!(read.phone, "5550002222");

        Hospital::delete(&conn, stored.id()).unwrap();
        assert!(Hospital::get(&conn, stored.id()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_specialization_duplicate_rejected() {
        let conn = conn();
        Specialization::new("neurology", Some(10.0)).insert(&conn).unwrap();
        let err = Specialization::new("neurology", None).insert(&conn).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Resource(ResourceError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_hospital_specialty_links() {
        let conn = conn();
        let hospital = Hospital::new("1 Main St", "5550001111").insert(&conn).unwrap();
        Specialization::new("oncology", None).insert(&conn).unwrap();
        Specialization::new("cardiology", None).insert(&conn).unwrap();

        HospitalSpecialty::new(hospital.id(), "oncology").insert(&conn).unwrap();
        HospitalSpecialty::new(hospital.id(), "cardiology").insert(&conn).unwrap();
        HospitalSpecialty::new(hospital.id(), "cardiology").insert(&conn).unwrap();

        assert_eq!(
            HospitalSpecialty::for_hospital(&conn, hospital.id()).unwrap(),
            vec!["cardiology".to_string(), "oncology".to_string()]
        );

        Specialization::delete(&conn, "oncology").unwrap();
        assert_eq!(
            HospitalSpecialty::for_hospital(&conn, hospital.id()).unwrap(),
            vec!["cardiology".to_string()]
        );
    }
}
