//! Medical records and billing accounts.

use rusqlite::Row;
use rusqlite::types::ToSql;
use serde::{Deserialize, Serialize};

use crate::core::Record;
use crate::types::{BillingId, MedicalRecordId, PatientId, StaffId, VisitId};

/// A doctor's entry against a visit, with its fees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalRecord {
    /// Visit the entry belongs to.
    pub visit_id: VisitId,
    /// Doctor who wrote the entry.
    pub doctor_id: StaffId,
    /// Prescribed medication.
    pub prescription: Option<String>,
    /// Diagnostic notes.
    pub diagnostic: Option<String>,
    /// Test performed.
    pub test: Option<String>,
    /// Test result.
    pub result: Option<String>,
    /// Treatment given.
    pub treatment: Option<String>,
    /// Consultation fee.
    pub consultation_fee: Option<f64>,
    /// Test fee.
    pub test_fee: f64,
    /// Treatment fee.
    pub treatment_fee: Option<f64>,
}

impl MedicalRecord {
    /// Creates an entry with no notes and no fees.
    pub fn new(visit_id: VisitId, doctor_id: StaffId) -> Self {
        Self {
            visit_id,
            doctor_id,
            prescription: None,
            diagnostic: None,
            test: None,
            result: None,
            treatment: None,
            consultation_fee: None,
            test_fee: 0.0,
            treatment_fee: None,
        }
    }

    /// Sum of all fees on the entry.
    pub fn total_fees(&self) -> f64 {
        self.consultation_fee.unwrap_or(0.0) + self.test_fee + self.treatment_fee.unwrap_or(0.0)
    }
}

impl Record for MedicalRecord {
    type Id = MedicalRecordId;

    const ENTITY: &'static str = "medical record";
    const TABLE: &'static str = "medical_record";
    const COLUMNS: &'static [&'static str] = &[
        "visit_id",
        "doctor_id",
        "prescription",
        "diagnostic",
        "test",
        "result",
        "treatment",
        "consultation_fee",
        "test_fee",
        "treatment_fee",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            visit_id: row.get(1)?,
            doctor_id: row.get(2)?,
            prescription: row.get(3)?,
            diagnostic: row.get(4)?,
            test: row.get(5)?,
            result: row.get(6)?,
            treatment: row.get(7)?,
            consultation_fee: row.get(8)?,
            test_fee: row.get(9)?,
            treatment_fee: row.get(10)?,
        })
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.visit_id,
            &self.doctor_id,
            &self.prescription,
            &self.diagnostic,
            &self.test,
            &self.result,
            &self.treatment,
            &self.consultation_fee,
            &self.test_fee,
            &self.treatment_fee,
        ]
    }
}

/// A patient's billing account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Billing {
    /// Account holder.
    pub patient_id: PatientId,
    /// Payment details, e.g. card or insurer reference.
    pub payment_info: Option<String>,
}

impl Record for Billing {
    type Id = BillingId;

    const ENTITY: &'static str = "billing account";
    const TABLE: &'static str = "billing";
    const COLUMNS: &'static [&'static str] = &["patient_id", "payment_info"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            patient_id: row.get(1)?,
            payment_info: row.get(2)?,
        })
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.patient_id, &self.payment_info]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_fees() {
        let mut record = MedicalRecord::new(VisitId::new(1), StaffId::new(2));
        assert_eq!(record.total_fees(), 0.0);

        record.consultation_fee = Some(50.0);
        record.test_fee = 25.0;
        assert_eq!(record.total_fees(), 75.0);
    }
}
