//! The visit ledger: open and closed hospital visits per patient.

use chrono::NaiveDate;
use medbed_persistence::core::Record;
use medbed_persistence::models::HospitalVisit;
use medbed_persistence::types::{BedId, HospitalId, PatientId, Stored, VisitId};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::error::{AllocationError, AllocationResult};

/// Access to hospital visits over one connection or transaction.
///
/// Bed references are only written here; the bed's occupied flag belongs to
/// [`BedRegistry`](crate::BedRegistry).
#[derive(Debug, Clone, Copy)]
pub struct VisitLedger<'c> {
    conn: &'c Connection,
}

impl<'c> VisitLedger<'c> {
    /// Creates a ledger over `conn`.
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Opens a new visit with no bed.
    ///
    /// With `enforce_single_open_visit`, fails with `Conflict` if the patient
    /// already has an open visit at the hospital.
    pub fn open_visit(
        &self,
        hospital_id: HospitalId,
        patient_id: PatientId,
        start_date: NaiveDate,
        registration_fee: Option<f64>,
        enforce_single_open_visit: bool,
    ) -> AllocationResult<Stored<HospitalVisit>> {
        if enforce_single_open_visit {
            if let Some(existing) = self.get_open_visit(patient_id, hospital_id)? {
                return Err(AllocationError::Conflict {
                    patient_id,
                    hospital_id,
                    visit_id: existing.id(),
                });
            }
        }

        let visit = HospitalVisit::open(hospital_id, patient_id, start_date, registration_fee)
            .insert(self.conn)?;
        debug!(visit_id = %visit.id(), patient_id = %patient_id, hospital_id = %hospital_id, "opened visit");
        Ok(visit)
    }

    /// Returns the patient's open visit at the hospital. If several exist,
    /// the oldest is returned.
    pub fn get_open_visit(
        &self,
        patient_id: PatientId,
        hospital_id: HospitalId,
    ) -> AllocationResult<Option<Stored<HospitalVisit>>> {
        let sql = format!(
            "{} WHERE patient_id = ?1 AND hospital_id = ?2 AND end_date IS NULL ORDER BY id LIMIT 1",
            HospitalVisit::select_sql()
        );
        let visit = self
            .conn
            .query_row(&sql, params![patient_id, hospital_id], |row| {
                HospitalVisit::read_stored(row)
            })
            .optional()?;
        Ok(visit)
    }

    /// Loads a visit, failing with `NotFound` if absent.
    pub fn get(&self, visit_id: VisitId) -> AllocationResult<Stored<HospitalVisit>> {
        Ok(HospitalVisit::get(self.conn, visit_id)?)
    }

    /// Closes a visit by setting its end date.
    ///
    /// Fails with `InvalidState` if the visit is already closed or the end
    /// date precedes the start date.
    pub fn close_visit(&self, visit_id: VisitId, end_date: NaiveDate) -> AllocationResult<()> {
        let visit = self.get(visit_id)?;
        if let Some(closed) = visit.end_date {
            return Err(AllocationError::InvalidState {
                visit_id,
                reason: format!("already closed on {}", closed),
            });
        }
        if end_date < visit.start_date {
            return Err(AllocationError::InvalidState {
                visit_id,
                reason: format!(
                    "end date {} is before start date {}",
                    end_date, visit.start_date
                ),
            });
        }

        let changed = self.conn.execute(
            "UPDATE hospital_visit SET end_date = ?1 WHERE id = ?2 AND end_date IS NULL",
            params![end_date, visit_id],
        )?;
        if changed == 0 {
            return Err(AllocationError::InvalidState {
                visit_id,
                reason: "closed concurrently".to_string(),
            });
        }
        debug!(visit_id = %visit_id, %end_date, "closed visit");
        Ok(())
    }

    /// Sets or clears the bed reference of an open visit. Does not touch the
    /// bed's occupied flag.
    pub fn set_bed(&self, visit_id: VisitId, bed_id: Option<BedId>) -> AllocationResult<()> {
        let changed = self.conn.execute(
            "UPDATE hospital_visit SET bed_id = ?1 WHERE id = ?2 AND end_date IS NULL",
            params![bed_id, visit_id],
        )?;
        if changed == 0 {
            // Distinguish a missing visit from a closed one.
            self.get(visit_id)?;
            return Err(AllocationError::InvalidState {
                visit_id,
                reason: "visit is closed".to_string(),
            });
        }
        Ok(())
    }

    /// Attaches a bed to an open visit that holds none. Returns whether the
    /// visit changed.
    pub fn claim_bed(&self, visit_id: VisitId, bed_id: BedId) -> AllocationResult<bool> {
        let changed = self.conn.execute(
            "UPDATE hospital_visit SET bed_id = ?1 WHERE id = ?2 AND end_date IS NULL AND bed_id IS NULL",
            params![bed_id, visit_id],
        )?;
        Ok(changed == 1)
    }

    /// Detaches a bed from every open visit referencing it. Returns the
    /// visits that changed.
    pub fn clear_bed(&self, bed_id: BedId) -> AllocationResult<Vec<VisitId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM hospital_visit WHERE bed_id = ?1 AND end_date IS NULL ORDER BY id",
        )?;
        let ids = stmt
            .query_map([bed_id], |row| row.get(0))?
            .collect::<Result<Vec<VisitId>, _>>()?;

        self.conn.execute(
            "UPDATE hospital_visit SET bed_id = NULL WHERE bed_id = ?1 AND end_date IS NULL",
            [bed_id],
        )?;
        Ok(ids)
    }

    /// Every open visit of a patient, across hospitals.
    pub fn open_visits_for_patient(
        &self,
        patient_id: PatientId,
    ) -> AllocationResult<Vec<Stored<HospitalVisit>>> {
        let sql = format!(
            "{} WHERE patient_id = ?1 AND end_date IS NULL ORDER BY id",
            HospitalVisit::select_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([patient_id], |row| HospitalVisit::read_stored(row))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// The open visit holding a bed, if any.
    pub fn visit_pointing_at(&self, bed_id: BedId) -> AllocationResult<Option<Stored<HospitalVisit>>> {
        let sql = format!(
            "{} WHERE bed_id = ?1 AND end_date IS NULL ORDER BY id LIMIT 1",
            HospitalVisit::select_sql()
        );
        let visit = self
            .conn
            .query_row(&sql, [bed_id], |row| HospitalVisit::read_stored(row))
            .optional()?;
        Ok(visit)
    }
}
