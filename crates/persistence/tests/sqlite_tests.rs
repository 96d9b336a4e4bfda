//! SQLite backend integration tests.
//!
//! These tests exercise entity CRUD and the schema's referential actions
//! through the public API.

use chrono::NaiveDate;

use medbed_persistence::backends::sqlite::SqliteBackend;
use medbed_persistence::core::{Record, TransactionOptions, TransactionProvider};
use medbed_persistence::error::{BackendError, StorageError};
use medbed_persistence::models::{
    Bed, Billing, Hospital, HospitalVisit, JobTitle, MedicalRecord, Patient, Person,
    ResponsibleStaff, Specialization, Staff,
};
use medbed_persistence::types::{BedId, HospitalId, PatientId};

fn create_backend() -> SqliteBackend {
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    backend.init_schema().expect("Failed to initialize schema");
    backend
}

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

fn person(name: &str) -> Person {
    Person::new(name, "42 Oak Ave", "5550000000", date(1, 1))
}

struct Fixture {
    hospital: HospitalId,
    patient: PatientId,
    bed: BedId,
}

fn seed(backend: &SqliteBackend) -> Fixture {
    let conn = backend.get_connection().unwrap();
    let hospital = Hospital::new("1 Main St", "5550001111").insert(&conn).unwrap();
    Specialization::new("neurology", Some(10.0)).insert(&conn).unwrap();
    let patient = Patient::new(person("Ada"), None, None).insert(&conn).unwrap();
    let bed = Bed::new(hospital.id(), "neurology").insert(&conn).unwrap();
    Fixture {
        hospital: hospital.id(),
        patient: patient.id(),
        bed: bed.id(),
    }
}

fn count(backend: &SqliteBackend, table: &str) -> i64 {
    backend
        .get_connection()
        .unwrap()
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}

// ============================================================================
// Create / Read Tests
// ============================================================================

#[test]
fn test_insert_returns_generated_identity() {
    let backend = create_backend();
    let conn = backend.get_connection().unwrap();

    let first = Hospital::new("1 Main St", "5550001111").insert(&conn).unwrap();
    let second = Hospital::new("2 Main St", "5550002222").insert(&conn).unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(Hospital::list(&conn).unwrap().len(), 2);
}

#[test]
fn test_get_missing_is_not_found() {
    let backend = create_backend();
    let conn = backend.get_connection().unwrap();

    let err = Bed::get(&conn, BedId::new(404)).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "bed not found: 404");
    assert!(Bed::find(&conn, BedId::new(404)).unwrap().is_none());
}

#[test]
fn test_visit_round_trip() {
    let backend = create_backend();
    let fixture = seed(&backend);
    let conn = backend.get_connection().unwrap();

    let mut visit = HospitalVisit::open(fixture.hospital, fixture.patient, date(3, 1), Some(20.0));
    visit.diagnosis = Some("migraine".to_string());
    let stored = visit.clone().insert(&conn).unwrap();

    let read = HospitalVisit::get(&conn, stored.id()).unwrap();
    assert_eq!(read.record(), &visit);
    assert!(read.is_open());
}

#[test]
fn test_bed_with_unknown_specialization_rejected() {
    let backend = create_backend();
    let fixture = seed(&backend);
    let conn = backend.get_connection().unwrap();

    let err = Bed::new(fixture.hospital, "dermatology")
        .insert(&conn)
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Backend(BackendError::ConstraintViolation { .. })
    ));
}

#[test]
fn test_visit_end_before_start_rejected() {
    let backend = create_backend();
    let fixture = seed(&backend);
    let conn = backend.get_connection().unwrap();

    let mut visit = HospitalVisit::open(fixture.hospital, fixture.patient, date(3, 5), None);
    visit.end_date = Some(date(3, 1));
    assert!(visit.insert(&conn).unwrap_err().is_constraint_violation());
}

#[test]
fn test_two_open_visits_cannot_hold_one_bed() {
    let backend = create_backend();
    let fixture = seed(&backend);
    let conn = backend.get_connection().unwrap();
    let other = Patient::new(person("Grace"), None, None).insert(&conn).unwrap();

    let mut first = HospitalVisit::open(fixture.hospital, fixture.patient, date(3, 1), None);
    first.bed_id = Some(fixture.bed);
    first.insert(&conn).unwrap();

    let mut second = HospitalVisit::open(fixture.hospital, other.id(), date(3, 1), None);
    second.bed_id = Some(fixture.bed);
    assert!(second.insert(&conn).unwrap_err().is_constraint_violation());
}

// ============================================================================
// Update / Delete Tests
// ============================================================================

#[test]
fn test_update_missing_is_not_found() {
    let backend = create_backend();
    let fixture = seed(&backend);
    let conn = backend.get_connection().unwrap();

    let mut bed = Bed::get(&conn, fixture.bed).unwrap();
    Bed::delete(&conn, fixture.bed).unwrap();
    bed.record_mut().occupied = true;

    assert!(Bed::update(&bed, &conn).unwrap_err().is_not_found());
}

#[test]
fn test_medical_record_and_billing_crud() {
    let backend = create_backend();
    let fixture = seed(&backend);
    let conn = backend.get_connection().unwrap();

    let doctor = Staff::new(person("House"), fixture.hospital, JobTitle::Doctor)
        .insert(&conn)
        .unwrap();
    let visit = HospitalVisit::open(fixture.hospital, fixture.patient, date(3, 1), None)
        .insert(&conn)
        .unwrap();
    ResponsibleStaff::new(visit.id(), doctor.id()).insert(&conn).unwrap();

    let mut record = MedicalRecord::new(visit.id(), doctor.id());
    record.consultation_fee = Some(80.0);
    record.test_fee = 20.0;
    let stored = record.insert(&conn).unwrap();
    assert_eq!(MedicalRecord::get(&conn, stored.id()).unwrap().total_fees(), 100.0);

    let mut billing = Billing {
        patient_id: fixture.patient,
        payment_info: None,
    }
    .insert(&conn)
    .unwrap();
    billing.record_mut().payment_info = Some("VISA 4242".to_string());
    Billing::update(&billing, &conn).unwrap();
    assert_eq!(
        Billing::get(&conn, billing.id()).unwrap().payment_info.as_deref(),
        Some("VISA 4242")
    );

    assert_eq!(
        ResponsibleStaff::for_visit(&conn, visit.id()).unwrap(),
        vec![doctor.id()]
    );
}

// ============================================================================
// Referential Action Tests
// ============================================================================

#[test]
fn test_delete_hospital_cascades_to_beds_and_visits() {
    let backend = create_backend();
    let fixture = seed(&backend);
    {
        let conn = backend.get_connection().unwrap();
        HospitalVisit::open(fixture.hospital, fixture.patient, date(3, 1), None)
            .insert(&conn)
            .unwrap();
        Hospital::delete(&conn, fixture.hospital).unwrap();
    }

    assert_eq!(count(&backend, "bed"), 0);
    assert_eq!(count(&backend, "hospital_visit"), 0);
    assert_eq!(count(&backend, "patient"), 1);
}

#[test]
fn test_delete_specialization_cascades_to_beds() {
    let backend = create_backend();
    let _fixture = seed(&backend);
    {
        let conn = backend.get_connection().unwrap();
        Specialization::delete(&conn, "neurology").unwrap();
    }

    assert_eq!(count(&backend, "bed"), 0);
}

#[test]
fn test_delete_bed_clears_visit_reference() {
    let backend = create_backend();
    let fixture = seed(&backend);
    let conn = backend.get_connection().unwrap();

    let mut visit = HospitalVisit::open(fixture.hospital, fixture.patient, date(3, 1), None);
    visit.bed_id = Some(fixture.bed);
    let visit = visit.insert(&conn).unwrap();

    Bed::delete(&conn, fixture.bed).unwrap();
    assert_eq!(HospitalVisit::get(&conn, visit.id()).unwrap().bed_id, None);
}

#[test]
fn test_delete_patient_cascades_to_visits_and_billing() {
    let backend = create_backend();
    let fixture = seed(&backend);
    {
        let conn = backend.get_connection().unwrap();
        HospitalVisit::open(fixture.hospital, fixture.patient, date(3, 1), None)
            .insert(&conn)
            .unwrap();
        Billing {
            patient_id: fixture.patient,
            payment_info: None,
        }
        .insert(&conn)
        .unwrap();
        Patient::delete(&conn, fixture.patient).unwrap();
    }

    assert_eq!(count(&backend, "hospital_visit"), 0);
    assert_eq!(count(&backend, "billing"), 0);
    assert_eq!(count(&backend, "person"), 0);
}

// ============================================================================
// Transaction Tests
// ============================================================================

/// Writes made through a transaction are visible only after commit.
#[test]
fn test_crud_inside_transaction_rolls_back() {
    let backend = create_backend();
    let fixture = seed(&backend);

    let result: Result<(), StorageError> =
        backend.with_transaction(TransactionOptions::default(), |tx| {
            let mut bed = Bed::get(tx, fixture.bed)?;
            bed.record_mut().occupied = true;
            Bed::update(&bed, tx)?;
            Bed::new(HospitalId::new(999), "neurology").insert(tx)?;
            Ok(())
        });

    assert!(result.unwrap_err().is_constraint_violation());
    let conn = backend.get_connection().unwrap();
    assert!(!Bed::get(&conn, fixture.bed).unwrap().occupied);
}

#[test]
fn test_patient_insert_inside_transaction_commits() {
    let backend = create_backend();

    let stored = backend
        .with_transaction(TransactionOptions::default(), |tx| {
            Patient::new(person("Ada"), Some(1), None).insert(tx)
        })
        .unwrap();

    let conn = backend.get_connection().unwrap();
    assert_eq!(Patient::get(&conn, stored.id()).unwrap().person.name, "Ada");
}
