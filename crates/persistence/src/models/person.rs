//! People: the shared [`Person`] row and the [`Patient`] and [`Staff`] roles
//! that embed it.
//!
//! A patient or staff member is stored as a `person` row plus a role row
//! keyed by the same id. Insert and update write both rows inside one
//! savepoint, and deleting the person cascades to the role.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};

use crate::backends::sqlite::with_savepoint;
use crate::core::{Record, Stored};
use crate::error::{StorageError, StorageResult, ValidationError};
use crate::types::{HospitalId, PersonId};

const PERSON_COLUMNS: &str = "person.name, person.address, person.phone, person.date_of_birth";

/// Personal details shared by patients and staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    /// Full name.
    pub name: String,
    /// Home address.
    pub address: String,
    /// Contact phone number.
    pub phone: String,
    /// Date of birth.
    pub date_of_birth: NaiveDate,
}

impl Person {
    /// Creates a person record.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        phone: impl Into<String>,
        date_of_birth: NaiveDate,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            phone: phone.into(),
            date_of_birth,
        }
    }

    /// Reads the four person columns starting at `offset`.
    fn from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(offset)?,
            address: row.get(offset + 1)?,
            phone: row.get(offset + 2)?,
            date_of_birth: row.get(offset + 3)?,
        })
    }

    fn insert_row(&self, conn: &Connection) -> StorageResult<PersonId> {
        conn.execute(
            "INSERT INTO person (name, address, phone, date_of_birth) VALUES (?1, ?2, ?3, ?4)",
            params![self.name, self.address, self.phone, self.date_of_birth],
        )?;
        Ok(PersonId::new(conn.last_insert_rowid()))
    }

    fn update_row(&self, conn: &Connection, id: PersonId) -> StorageResult<()> {
        let changed = conn.execute(
            "UPDATE person SET name = ?1, address = ?2, phone = ?3, date_of_birth = ?4 WHERE id = ?5",
            params![self.name, self.address, self.phone, self.date_of_birth, id],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("person", id));
        }
        Ok(())
    }
}

fn delete_person(conn: &Connection, entity: &'static str, table: &str, id: PersonId) -> StorageResult<()> {
    let sql = format!(
        "DELETE FROM person WHERE id = ?1 AND EXISTS (SELECT 1 FROM {} WHERE id = ?1)",
        table
    );
    let changed = conn.execute(&sql, [id])?;
    if changed == 0 {
        return Err(StorageError::not_found(entity, id));
    }
    Ok(())
}

macro_rules! sql_enum {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: ValidationError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

/// Treatment status of a patient. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatientStatus {
    /// Registered, not yet treated.
    #[default]
    Processing,
    /// Currently under treatment.
    InTreatment,
    /// Treatment finished.
    TreatmentComplete,
}

impl PatientStatus {
    /// Returns the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Processing => "PROCESSING",
            PatientStatus::InTreatment => "IN_TREATMENT",
            PatientStatus::TreatmentComplete => "TREATMENT_COMPLETE",
        }
    }
}

impl FromStr for PatientStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PROCESSING" => Ok(PatientStatus::Processing),
            "IN_TREATMENT" => Ok(PatientStatus::InTreatment),
            "TREATMENT_COMPLETE" => Ok(PatientStatus::TreatmentComplete),
            _ => Err(ValidationError::UnknownVariant {
                kind: "patient status",
                value: s.to_string(),
            }),
        }
    }
}

sql_enum!(PatientStatus);

/// Role of a staff member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobTitle {
    /// Nurse; may be assigned to beds.
    Nurse,
    /// Doctor; may be responsible for visits and write medical records.
    Doctor,
    /// Administrator.
    Administrator,
    /// Billing clerk.
    Biller,
}

impl JobTitle {
    /// Returns the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobTitle::Nurse => "NURSE",
            JobTitle::Doctor => "DOCTOR",
            JobTitle::Administrator => "ADMINISTRATOR",
            JobTitle::Biller => "BILLER",
        }
    }
}

impl FromStr for JobTitle {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NURSE" => Ok(JobTitle::Nurse),
            "DOCTOR" => Ok(JobTitle::Doctor),
            "ADMINISTRATOR" => Ok(JobTitle::Administrator),
            "BILLER" => Ok(JobTitle::Biller),
            _ => Err(ValidationError::UnknownVariant {
                kind: "job title",
                value: s.to_string(),
            }),
        }
    }
}

sql_enum!(JobTitle);

/// A patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Personal details.
    #[serde(flatten)]
    pub person: Person,
    /// Social security number.
    pub ssn: Option<i64>,
    /// Self-reported gender.
    pub gender: Option<String>,
    /// Treatment status.
    #[serde(default)]
    pub status: PatientStatus,
}

impl Patient {
    /// Creates a patient in the `PROCESSING` state.
    pub fn new(person: Person, ssn: Option<i64>, gender: Option<String>) -> Self {
        Self {
            person,
            ssn,
            gender,
            status: PatientStatus::Processing,
        }
    }
}

impl Record for Patient {
    type Id = PersonId;

    const ENTITY: &'static str = "patient";
    const TABLE: &'static str = "patient";
    const COLUMNS: &'static [&'static str] = &["ssn", "gender", "status"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            person: Person::from_row_at(row, 1)?,
            ssn: row.get(5)?,
            gender: row.get(6)?,
            status: row.get(7)?,
        })
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.ssn, &self.gender, &self.status]
    }

    fn select_sql() -> String {
        format!(
            "SELECT patient.id, {}, patient.ssn, patient.gender, patient.status \
             FROM patient JOIN person ON person.id = patient.id",
            PERSON_COLUMNS
        )
    }

    fn insert(self, conn: &Connection) -> StorageResult<Stored<Self>> {
        let id = with_savepoint(conn, "patient_insert", |conn| {
            let id = self.person.insert_row(conn)?;
            conn.execute(
                "INSERT INTO patient (id, ssn, gender, status) VALUES (?1, ?2, ?3, ?4)",
                params![id, self.ssn, self.gender, self.status],
            )?;
            Ok::<_, StorageError>(id)
        })?;
        Ok(Stored::new(id, self))
    }

    fn update(stored: &Stored<Self>, conn: &Connection) -> StorageResult<()> {
        let id = stored.id();
        with_savepoint(conn, "patient_update", |conn| {
            stored.person.update_row(conn, id)?;
            let changed = conn.execute(
                "UPDATE patient SET ssn = ?1, gender = ?2, status = ?3 WHERE id = ?4",
                params![stored.ssn, stored.gender, stored.status, id],
            )?;
            if changed == 0 {
                return Err(StorageError::not_found(Self::ENTITY, id));
            }
            Ok(())
        })
    }

    fn delete(conn: &Connection, id: PersonId) -> StorageResult<()> {
        delete_person(conn, Self::ENTITY, Self::TABLE, id)
    }
}

/// A staff member employed by a hospital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    /// Personal details.
    #[serde(flatten)]
    pub person: Person,
    /// Employing hospital.
    pub hospital_id: HospitalId,
    /// Department name.
    pub department: Option<String>,
    /// Role.
    pub job_title: JobTitle,
    /// Professional title, e.g. `MD`.
    pub professional_title: Option<String>,
    /// Office address.
    pub office_address: Option<String>,
    /// Specialization name, if any.
    pub specialization: Option<String>,
}

impl Staff {
    /// Creates a staff member with only the required fields set.
    pub fn new(person: Person, hospital_id: HospitalId, job_title: JobTitle) -> Self {
        Self {
            person,
            hospital_id,
            department: None,
            job_title,
            professional_title: None,
            office_address: None,
            specialization: None,
        }
    }

    /// Sets the specialization.
    pub fn with_specialization(mut self, specialization: impl Into<String>) -> Self {
        self.specialization = Some(specialization.into());
        self
    }

    /// Sets the department.
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    /// Lists the staff of one hospital.
    pub fn for_hospital(conn: &Connection, hospital_id: HospitalId) -> StorageResult<Vec<Stored<Self>>> {
        let sql = format!("{} WHERE staff.hospital_id = ?1 ORDER BY staff.id", Self::select_sql());
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([hospital_id], |row| Self::read_stored(row))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl Record for Staff {
    type Id = PersonId;

    const ENTITY: &'static str = "staff member";
    const TABLE: &'static str = "staff";
    const COLUMNS: &'static [&'static str] = &[
        "hospital_id",
        "department",
        "job_title",
        "professional_title",
        "office_address",
        "specialization",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            person: Person::from_row_at(row, 1)?,
            hospital_id: row.get(5)?,
            department: row.get(6)?,
            job_title: row.get(7)?,
            professional_title: row.get(8)?,
            office_address: row.get(9)?,
            specialization: row.get(10)?,
        })
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.hospital_id,
            &self.department,
            &self.job_title,
            &self.professional_title,
            &self.office_address,
            &self.specialization,
        ]
    }

    fn select_sql() -> String {
        format!(
            "SELECT staff.id, {}, staff.hospital_id, staff.department, staff.job_title, \
             staff.professional_title, staff.office_address, staff.specialization \
             FROM staff JOIN person ON person.id = staff.id",
            PERSON_COLUMNS
        )
    }

    fn insert(self, conn: &Connection) -> StorageResult<Stored<Self>> {
        let id = with_savepoint(conn, "staff_insert", |conn| {
            let id = self.person.insert_row(conn)?;
            conn.execute(
                "INSERT INTO staff (id, hospital_id, department, job_title, professional_title, \
                 office_address, specialization) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    self.hospital_id,
                    self.department,
                    self.job_title,
                    self.professional_title,
                    self.office_address,
                    self.specialization
                ],
            )?;
            Ok::<_, StorageError>(id)
        })?;
        Ok(Stored::new(id, self))
    }

    fn update(stored: &Stored<Self>, conn: &Connection) -> StorageResult<()> {
        let id = stored.id();
        with_savepoint(conn, "staff_update", |conn| {
            stored.person.update_row(conn, id)?;
            let changed = conn.execute(
                "UPDATE staff SET hospital_id = ?1, department = ?2, job_title = ?3, \
                 professional_title = ?4, office_address = ?5, specialization = ?6 WHERE id = ?7",
                params![
                    stored.hospital_id,
                    stored.department,
                    stored.job_title,
                    stored.professional_title,
                    stored.office_address,
                    stored.specialization,
                    id
                ],
            )?;
            if changed == 0 {
                return Err(StorageError::not_found(Self::ENTITY, id));
            }
            Ok(())
        })
    }

    fn delete(conn: &Connection, id: PersonId) -> StorageResult<()> {
        delete_person(conn, Self::ENTITY, Self::TABLE, id)
    }
}
