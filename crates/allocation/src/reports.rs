//! Read-only reports over the record store.
//!
//! Each function takes a connection and returns plain data; formatting is left
//! to the caller. None of them write.

use chrono::{Month, NaiveDate};
use medbed_persistence::types::{HospitalId, PatientId, StaffId};
use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::debug;

use crate::beds::{BedRegistry, HospitalUsage, SpecializationOccupancy};
use crate::error::AllocationResult;

/// A hospital offering a specialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HospitalSpecialtyRow {
    /// Specialization name.
    pub specialization: String,
    /// Hospital offering it.
    pub hospital_id: HospitalId,
    /// The hospital's street address.
    pub address: String,
}

/// A doctor responsible for one of a patient's open visits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoctorRow {
    /// The doctor's staff id.
    pub staff_id: StaffId,
    /// Full name.
    pub name: String,
    /// Specialization, if the doctor has one.
    pub specialization: Option<String>,
}

/// Visits started at a hospital in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyVisits {
    /// Month as `YYYY-MM`.
    pub month: String,
    /// English month name, e.g. `March`.
    pub month_name: String,
    /// Number of visits started in the month.
    pub visits: i64,
}

/// Fees billed to a patient for visits started in a date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingSummary {
    /// Patient billed.
    pub patient_id: PatientId,
    /// Visits started in the range.
    pub visits: i64,
    /// Registration fees, one per visit.
    pub registration_fees: f64,
    /// Consultation fees from medical records.
    pub consultation_fees: f64,
    /// Test fees from medical records.
    pub test_fees: f64,
    /// Treatment fees from medical records.
    pub treatment_fees: f64,
}

impl BillingSummary {
    /// Sum of all fee columns.
    pub fn total(&self) -> f64 {
        self.registration_fees + self.consultation_fees + self.test_fees + self.treatment_fees
    }
}

/// Every hospital-specialization pair, grouped by specialization.
pub fn hospitals_by_specialty(conn: &Connection) -> AllocationResult<Vec<HospitalSpecialtyRow>> {
    let mut stmt = conn.prepare(
        "SELECT hs.specialization, h.id, h.address
         FROM hospital_specialty hs
         JOIN hospital h ON hs.hospital_id = h.id
         ORDER BY hs.specialization, h.id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(HospitalSpecialtyRow {
            specialization: row.get(0)?,
            hospital_id: row.get(1)?,
            address: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Doctors currently responsible for any of the patient's open visits.
pub fn doctors_for_patient(
    conn: &Connection,
    patient_id: PatientId,
) -> AllocationResult<Vec<DoctorRow>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT s.id, p.name, s.specialization
         FROM responsible_staff rs
         JOIN hospital_visit v ON rs.visit_id = v.id
         JOIN staff s ON rs.staff_id = s.id
         JOIN person p ON s.id = p.id
         WHERE s.job_title = 'DOCTOR' AND v.patient_id = ?1 AND v.end_date IS NULL
         ORDER BY s.id",
    )?;
    let rows = stmt.query_map([patient_id], |row| {
        Ok(DoctorRow {
            staff_id: row.get(0)?,
            name: row.get(1)?,
            specialization: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Free, occupied and usage percentage per hospital.
pub fn hospital_usage(conn: &Connection) -> AllocationResult<Vec<HospitalUsage>> {
    BedRegistry::new(conn).hospital_usage()
}

/// Free and occupied beds per specialization in one hospital.
pub fn available_beds(
    conn: &Connection,
    hospital_id: HospitalId,
) -> AllocationResult<Vec<SpecializationOccupancy>> {
    BedRegistry::new(conn).occupancy_by_specialization(hospital_id)
}

/// Visits started at a hospital, counted per calendar month.
pub fn visits_per_month(
    conn: &Connection,
    hospital_id: HospitalId,
) -> AllocationResult<Vec<MonthlyVisits>> {
    let mut stmt = conn.prepare(
        "SELECT strftime('%Y-%m', start_date) AS month, COUNT(*)
         FROM hospital_visit
         WHERE hospital_id = ?1
         GROUP BY month
         ORDER BY month",
    )?;
    let rows = stmt.query_map([hospital_id], |row| {
        let month: String = row.get(0)?;
        Ok(MonthlyVisits {
            month_name: month_name(&month),
            month,
            visits: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Fees billed to a patient for visits whose start date lies in
/// `from..=to`.
///
/// Registration fees are counted once per visit. Medical record fees are
/// summed over every record of those visits; a missing fee counts as zero.
pub fn billing_summary(
    conn: &Connection,
    patient_id: PatientId,
    from: NaiveDate,
    to: NaiveDate,
) -> AllocationResult<BillingSummary> {
    let (visits, registration_fees): (i64, f64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(registration_fee), 0)
         FROM hospital_visit
         WHERE patient_id = ?1 AND start_date BETWEEN ?2 AND ?3",
        params![patient_id, from, to],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let (consultation_fees, test_fees, treatment_fees): (f64, f64, f64) = conn.query_row(
        "SELECT COALESCE(SUM(mr.consultation_fee), 0),
                COALESCE(SUM(mr.test_fee), 0),
                COALESCE(SUM(mr.treatment_fee), 0)
         FROM medical_record mr
         JOIN hospital_visit v ON mr.visit_id = v.id
         WHERE v.patient_id = ?1 AND v.start_date BETWEEN ?2 AND ?3",
        params![patient_id, from, to],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    debug!(patient_id = %patient_id, %from, %to, visits, "computed billing summary");
    Ok(BillingSummary {
        patient_id,
        visits,
        registration_fees,
        consultation_fees,
        test_fees,
        treatment_fees,
    })
}

fn month_name(month: &str) -> String {
    month
        .split('-')
        .nth(1)
        .and_then(|m| m.parse::<u8>().ok())
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_name() {
        assert_eq!(month_name("2024-03"), "March");
        assert_eq!(month_name("2024-12"), "December");
        assert_eq!(month_name("garbage"), "");
    }

    #[test]
    fn test_billing_total() {
        let summary = BillingSummary {
            patient_id: PatientId::new(1),
            visits: 2,
            registration_fees: 40.0,
            consultation_fees: 15.0,
            test_fees: 5.0,
            treatment_fees: 0.0,
        };
        assert_eq!(summary.total(), 60.0);
    }
}
