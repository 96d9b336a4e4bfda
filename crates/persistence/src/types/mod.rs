//! Identifier types shared by the record store and its callers.

mod ids;

pub use ids::{BedId, BillingId, HospitalId, MedicalRecordId, PatientId, PersonId, StaffId, VisitId};
pub use crate::core::Stored;
