//! Entity types stored in the record store.
//!
//! Tables with generated integer keys implement [`Record`](crate::core::Record).
//! [`Specialization`] is keyed by name, and the link tables
//! [`HospitalSpecialty`] and [`ResponsibleStaff`] have explicit functions.

mod bed;
mod hospital;
mod medical;
mod person;
mod visit;

pub use bed::Bed;
pub use hospital::{Hospital, HospitalSpecialty, Specialization};
pub use medical::{Billing, MedicalRecord};
pub use person::{JobTitle, PatientStatus, Patient, Person, Staff};
pub use visit::{HospitalVisit, ResponsibleStaff};
