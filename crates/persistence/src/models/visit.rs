//! Hospital visits and the staff responsible for them.

use chrono::NaiveDate;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};

use crate::core::Record;
use crate::error::{StorageError, StorageResult};
use crate::types::{BedId, HospitalId, PatientId, StaffId, VisitId};

/// One stay of a patient at a hospital.
///
/// A visit is open while `end_date` is unset. At most one open visit exists
/// per patient and hospital, and an open visit holds at most one bed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalVisit {
    /// Hospital visited.
    pub hospital_id: HospitalId,
    /// Visiting patient.
    pub patient_id: PatientId,
    /// Check-in date.
    pub start_date: NaiveDate,
    /// Check-out date; `None` while the visit is open.
    pub end_date: Option<NaiveDate>,
    /// Diagnosis, once known.
    pub diagnosis: Option<String>,
    /// Bed held by the visit.
    pub bed_id: Option<BedId>,
    /// Fee charged at check-in.
    pub registration_fee: Option<f64>,
}

impl HospitalVisit {
    /// Creates an open visit with no bed.
    pub fn open(
        hospital_id: HospitalId,
        patient_id: PatientId,
        start_date: NaiveDate,
        registration_fee: Option<f64>,
    ) -> Self {
        Self {
            hospital_id,
            patient_id,
            start_date,
            end_date: None,
            diagnosis: None,
            bed_id: None,
            registration_fee,
        }
    }

    /// Returns whether the visit has not been closed.
    pub fn is_open(&self) -> bool {
        self.end_date.is_none()
    }

    /// Length of the stay in days, counting the check-in day, as of `today`
    /// for an open visit.
    pub fn days(&self, today: NaiveDate) -> i64 {
        let end = self.end_date.unwrap_or(today);
        (end - self.start_date).num_days().max(0) + 1
    }
}

impl Record for HospitalVisit {
    type Id = VisitId;

    const ENTITY: &'static str = "hospital visit";
    const TABLE: &'static str = "hospital_visit";
    const COLUMNS: &'static [&'static str] = &[
        "hospital_id",
        "patient_id",
        "start_date",
        "end_date",
        "diagnosis",
        "bed_id",
        "registration_fee",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            hospital_id: row.get(1)?,
            patient_id: row.get(2)?,
            start_date: row.get(3)?,
            end_date: row.get(4)?,
            diagnosis: row.get(5)?,
            bed_id: row.get(6)?,
            registration_fee: row.get(7)?,
        })
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.hospital_id,
            &self.patient_id,
            &self.start_date,
            &self.end_date,
            &self.diagnosis,
            &self.bed_id,
            &self.registration_fee,
        ]
    }
}

/// Link between a visit and a staff member responsible for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsibleStaff {
    /// The visit.
    pub visit_id: VisitId,
    /// The responsible staff member.
    pub staff_id: StaffId,
}

impl ResponsibleStaff {
    /// Creates a link ready for insertion.
    pub fn new(visit_id: VisitId, staff_id: StaffId) -> Self {
        Self { visit_id, staff_id }
    }

    /// Records the link. Adding an existing link is a no-op.
    pub fn insert(&self, conn: &Connection) -> StorageResult<()> {
        conn.execute(
            "INSERT OR IGNORE INTO responsible_staff (visit_id, staff_id) VALUES (?1, ?2)",
            params![self.visit_id, self.staff_id],
        )?;
        Ok(())
    }

    /// Removes the link.
    pub fn delete(&self, conn: &Connection) -> StorageResult<()> {
        let changed = conn.execute(
            "DELETE FROM responsible_staff WHERE visit_id = ?1 AND staff_id = ?2",
            params![self.visit_id, self.staff_id],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found(
                "responsible staff",
                format!("{}/{}", self.visit_id, self.staff_id),
            ));
        }
        Ok(())
    }

    /// Staff responsible for one visit.
    pub fn for_visit(conn: &Connection, visit_id: VisitId) -> StorageResult<Vec<StaffId>> {
        let mut stmt = conn.prepare(
            "SELECT staff_id FROM responsible_staff WHERE visit_id = ?1 ORDER BY staff_id",
        )?;
        let rows = stmt.query_map([visit_id], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
