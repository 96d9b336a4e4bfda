//! Demo data for `medbed init --seed`.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use medbed_allocation::BedRegistry;
use medbed_persistence::core::{Record, TransactionOptions, TransactionProvider};
use medbed_persistence::models::{
    Bed, Hospital, HospitalSpecialty, HospitalVisit, JobTitle, MedicalRecord, Patient,
    PatientStatus, Person, ResponsibleStaff, Specialization, Staff,
};
use medbed_persistence::Stored;
use medbed_persistence::types::{HospitalId, StaffId};
use serde::Serialize;

/// Beds created per specialization and hospital, on top of the two
/// pre-occupied neurology beds.
const BEDS_PER_DEPARTMENT: u32 = 20;

const SPECIALIZATIONS: &[&str] = &["neurology", "pediatrics", "cardiology", "oncology"];

/// What the seed inserted.
#[derive(Debug, Clone, Serialize)]
pub struct SeedSummary {
    pub hospitals: Vec<HospitalId>,
    pub specializations: usize,
    pub patients: usize,
    pub staff: usize,
    pub beds: usize,
    pub visits: usize,
}

fn date(y: i32, m: u32, d: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
        .with_context(|| format!("{}-{}-{} is not a calendar date", y, m, d))
}

struct StaffSeed<'a> {
    name: &'a str,
    address: &'a str,
    phone: &'a str,
    born: i32,
    job_title: JobTitle,
    department: &'a str,
    title: &'a str,
    specialization: Option<&'a str>,
}

/// Inserts two hospitals with staff, beds, three patients and their visits,
/// all in one transaction.
pub fn seed<P: TransactionProvider>(store: &P) -> Result<SeedSummary> {
    store.with_transaction(TransactionOptions::default(), |tx| -> Result<SeedSummary> {
        let h1 = Hospital::new("111 St NC, 111", "101").insert(tx)?;
        let h2 = Hospital::new("222 St NC, 222", "202").insert(tx)?;

        for name in SPECIALIZATIONS {
            Specialization::new(*name, Some(10.0)).insert(tx)?;
        }
        for (hospital, specialization) in [
            (h1.id(), "pediatrics"),
            (h1.id(), "neurology"),
            (h2.id(), "cardiology"),
            (h2.id(), "oncology"),
        ] {
            HospitalSpecialty::new(hospital, specialization).insert(tx)?;
        }

        let patients = [
            ("John", "81 ABC St, NC 27", "513", date(1980, 2, 22)?, PatientStatus::TreatmentComplete),
            ("Jason", "82 ABC St, NC 27", "418", date(1999, 4, 22)?, PatientStatus::InTreatment),
            ("William", "99 XYZ Ave, NC 27", "837", date(1999, 7, 2)?, PatientStatus::Processing),
        ];
        let mut patient_ids = Vec::with_capacity(patients.len());
        for (name, address, phone, born, status) in patients {
            let mut patient =
                Patient::new(Person::new(name, address, phone, born), None, Some("M".to_string()));
            patient.status = status;
            patient_ids.push(patient.insert(tx)?.id());
        }

        let staff_at = |hospital: &Stored<Hospital>, seed: StaffSeed<'_>| -> Result<StaffId> {
            let mut staff = Staff::new(
                Person::new(seed.name, seed.address, seed.phone, date(seed.born, 1, 1)?),
                hospital.id(),
                seed.job_title,
            )
            .with_department(seed.department);
            staff.professional_title = Some(seed.title.to_string());
            staff.office_address = Some(hospital.address.clone());
            staff.specialization = seed.specialization.map(str::to_string);
            Ok(staff.insert(tx)?.id())
        };

        staff_at(&h1, StaffSeed {
            name: "Simpson",
            address: "21 ABC St, NC 27",
            phone: "919",
            born: 1990,
            job_title: JobTitle::Biller,
            department: "Billing",
            title: "Accounts Supervisor",
            specialization: None,
        })?;
        let nurse_neuro = staff_at(&h1, StaffSeed {
            name: "David",
            address: "22 ABC St, NC 27",
            phone: "123",
            born: 1980,
            job_title: JobTitle::Nurse,
            department: "Neurology",
            title: "Senior Nurse",
            specialization: None,
        })?;
        staff_at(&h2, StaffSeed {
            name: "Ruth",
            address: "23 ABC St, NC 27",
            phone: "456",
            born: 1990,
            job_title: JobTitle::Nurse,
            department: "Pediatrics",
            title: "Assistant Nurse",
            specialization: None,
        })?;
        let nurse_peds = staff_at(&h1, StaffSeed {
            name: "Sally",
            address: "43 DEF St, NC 27",
            phone: "7892",
            born: 1999,
            job_title: JobTitle::Nurse,
            department: "Pediatrics",
            title: "Junior Nurse",
            specialization: None,
        })?;
        let nurse_h2 = staff_at(&h2, StaffSeed {
            name: "James",
            address: "47 DEF St, NC 27",
            phone: "9248",
            born: 1993,
            job_title: JobTitle::Nurse,
            department: "Oncology",
            title: "Junior Nurse",
            specialization: None,
        })?;
        let lucy = staff_at(&h1, StaffSeed {
            name: "Lucy",
            address: "42 ABC St, NC 27",
            phone: "631",
            born: 1985,
            job_title: JobTitle::Doctor,
            department: "Pediatrics",
            title: "Senior Surgeon",
            specialization: Some("pediatrics"),
        })?;
        let steven = staff_at(&h1, StaffSeed {
            name: "Steven",
            address: "48 ABC St, NC 27",
            phone: "632",
            born: 1960,
            job_title: JobTitle::Doctor,
            department: "Pediatrics",
            title: "Senior Surgeon",
            specialization: Some("pediatrics"),
        })?;
        staff_at(&h2, StaffSeed {
            name: "Joseph",
            address: "51 ABC St, NC 27",
            phone: "327",
            born: 1984,
            job_title: JobTitle::Doctor,
            department: "Cardiology",
            title: "Cardiologist",
            specialization: Some("cardiology"),
        })?;

        // Two neurology beds start out held by the first two visits.
        let mut held = Vec::with_capacity(2);
        for _ in 0..2 {
            let mut bed = Bed::new(h1.id(), "neurology").with_nurse(nurse_neuro);
            bed.occupied = true;
            held.push(bed.insert(tx)?.id());
        }

        let registry = BedRegistry::new(tx);
        let mut beds = held.len();
        for (hospital, specialization, nurse) in [
            (h1.id(), "neurology", nurse_neuro),
            (h1.id(), "pediatrics", nurse_peds),
            (h2.id(), "cardiology", nurse_h2),
            (h2.id(), "oncology", nurse_h2),
        ] {
            beds += registry
                .provision(hospital, specialization, Some(nurse), BEDS_PER_DEPARTMENT)?
                .len();
        }

        let visits = [
            (patient_ids[0], date(2019, 8, 5)?, "abc", Some(held[0])),
            (patient_ids[1], date(2019, 10, 15)?, "def", Some(held[1])),
            (patient_ids[2], date(2019, 11, 15)?, "geh", None),
        ];
        let mut visit_ids = Vec::with_capacity(visits.len());
        for (patient, start, diagnosis, bed) in visits {
            let mut visit = HospitalVisit::open(h1.id(), patient, start, Some(20.0));
            visit.diagnosis = Some(diagnosis.to_string());
            visit.bed_id = bed;
            visit_ids.push(visit.insert(tx)?.id());
        }

        ResponsibleStaff::new(visit_ids[0], lucy).insert(tx)?;
        ResponsibleStaff::new(visit_ids[0], nurse_neuro).insert(tx)?;
        ResponsibleStaff::new(visit_ids[1], steven).insert(tx)?;

        for (prescription, test, result, treatment, fees) in [
            ("antibiotics", "TB Blood test", "positive", "TB Treatment", (50.0, 75.0, 200.0)),
            ("continue antibiotics", "X-ray chest (TB) Advanced", "negative", "Not required", (0.0, 125.0, 0.0)),
        ] {
            let mut record = MedicalRecord::new(visit_ids[0], lucy);
            record.prescription = Some(prescription.to_string());
            record.diagnostic = Some("Testing for TB".to_string());
            record.test = Some(test.to_string());
            record.result = Some(result.to_string());
            record.treatment = Some(treatment.to_string());
            record.consultation_fee = Some(fees.0);
            record.test_fee = fees.1;
            record.treatment_fee = Some(fees.2);
            record.insert(tx)?;
        }

        Ok(SeedSummary {
            hospitals: vec![h1.id(), h2.id()],
            specializations: SPECIALIZATIONS.len(),
            patients: patient_ids.len(),
            staff: Staff::list(tx)?.len(),
            beds,
            visits: visit_ids.len(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use medbed_allocation::{AllocationCoordinator, AllocationError, reports};
    use medbed_persistence::backends::sqlite::SqliteBackend;

    fn seeded() -> (AllocationCoordinator<SqliteBackend>, SeedSummary) {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        let summary = seed(&backend).unwrap();
        (AllocationCoordinator::new(backend), summary)
    }

    #[test]
    fn test_seed_counts() {
        let (_, summary) = seeded();
        assert_eq!(summary.hospitals.len(), 2);
        assert_eq!(summary.specializations, 4);
        assert_eq!(summary.patients, 3);
        assert_eq!(summary.staff, 8);
        assert_eq!(summary.beds, 2 + 4 * BEDS_PER_DEPARTMENT as usize);
        assert_eq!(summary.visits, 3);
    }

    #[test]
    fn test_seeded_data_is_consistent() {
        let (coordinator, summary) = seeded();
        assert!(coordinator.occupancy_violations().unwrap().is_empty());

        let beds = coordinator
            .read(|conn| reports::available_beds(conn, summary.hospitals[0]))
            .unwrap();
        let neurology = beds.iter().find(|b| b.specialization == "neurology").unwrap();
        assert_eq!(neurology.occupied, 2);
        assert_eq!(neurology.free, i64::from(BEDS_PER_DEPARTMENT));
    }

    #[test]
    fn test_seeded_visits_are_open() {
        let (coordinator, summary) = seeded();
        let err = coordinator
            .check_in(1.into(), summary.hospitals[0], NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
            .unwrap_err();
        assert!(matches!(err, AllocationError::Conflict { .. }));
    }

    #[test]
    fn test_seed_fails_on_second_run() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        seed(&backend).unwrap();
        assert!(seed(&backend).is_err());
    }
}
