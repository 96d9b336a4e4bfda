//! Beds.

use rusqlite::Row;
use rusqlite::types::ToSql;
use serde::{Deserialize, Serialize};

use crate::core::Record;
use crate::types::{BedId, HospitalId, StaffId};

/// A bed in one hospital, provisioned for one specialization.
///
/// `occupied` is only changed together with the visit that holds the bed;
/// see the allocation crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bed {
    /// Hospital the bed belongs to.
    pub hospital_id: HospitalId,
    /// Specialization the bed is provisioned for.
    pub specialization: String,
    /// Nurse assigned to the bed.
    pub nurse_id: Option<StaffId>,
    /// Whether an open visit currently holds the bed.
    pub occupied: bool,
}

impl Bed {
    /// Creates a free bed.
    pub fn new(hospital_id: HospitalId, specialization: impl Into<String>) -> Self {
        Self {
            hospital_id,
            specialization: specialization.into(),
            nurse_id: None,
            occupied: false,
        }
    }

    /// Assigns a nurse.
    pub fn with_nurse(mut self, nurse_id: StaffId) -> Self {
        self.nurse_id = Some(nurse_id);
        self
    }
}

impl Record for Bed {
    type Id = BedId;

    const ENTITY: &'static str = "bed";
    const TABLE: &'static str = "bed";
    const COLUMNS: &'static [&'static str] = &["hospital_id", "specialization", "nurse_id", "occupied"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            hospital_id: row.get(1)?,
            specialization: row.get(2)?,
            nurse_id: row.get(3)?,
            occupied: row.get(4)?,
        })
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.hospital_id,
            &self.specialization,
            &self.nurse_id,
            &self.occupied,
        ]
    }
}
