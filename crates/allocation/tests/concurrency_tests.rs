//! Concurrent reservations against a file-backed store.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::*;
use medbed_allocation::{AllocationCoordinator, AllocationError, ReserveOutcome};
use medbed_persistence::backends::sqlite::SqliteBackend;
use medbed_persistence::core::Record;
use medbed_persistence::models::{Bed, Hospital, Patient, Person, Specialization};
use medbed_persistence::types::PatientId;
use tempfile::TempDir;

const CONTENDERS: usize = 8;

#[test]
fn test_concurrent_reservations_never_share_a_bed() {
    let dir = TempDir::new().unwrap();
    let backend = SqliteBackend::open(dir.path().join("medbed.db")).unwrap();
    backend.init_schema().unwrap();

    let (hospital, patients) = {
        let conn = backend.get_connection().unwrap();
        Specialization::new("neurology", Some(10.0)).insert(&conn).unwrap();
        let hospital = Hospital::new("1 Main St", "5550001111").insert(&conn).unwrap().id();
        Bed::new(hospital, "neurology").insert(&conn).unwrap();
        let patients: Vec<PatientId> = (0..CONTENDERS)
            .map(|i| {
                Patient::new(
                    Person::new(format!("Patient {}", i), "1 Elm St", "5550000000", day(1)),
                    None,
                    None,
                )
                .insert(&conn)
                .unwrap()
                .id()
            })
            .collect();
        (hospital, patients)
    };

    let coordinator = Arc::new(AllocationCoordinator::new(backend));
    for patient in &patients {
        coordinator.check_in(*patient, hospital, day(1)).unwrap();
    }

    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let handles: Vec<_> = patients
        .iter()
        .map(|&patient| {
            let coordinator = Arc::clone(&coordinator);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                coordinator.reserve_bed(hospital, "neurology", patient)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let reserved = results
        .iter()
        .filter(|r| matches!(r, Ok(ReserveOutcome::Reserved { .. })))
        .count();
    let no_bed = results
        .iter()
        .filter(|r| matches!(r, Err(AllocationError::NoBedAvailable { .. })))
        .count();
    assert_eq!(reserved, 1, "results: {:?}", results);
    assert_eq!(no_bed, CONTENDERS - 1, "results: {:?}", results);

    let holders = all_visits(&coordinator)
        .iter()
        .filter(|v| v.bed_id.is_some())
        .count();
    assert_eq!(holders, 1);
    assert_occupancy_consistent(&coordinator);
}

#[test]
fn test_file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("medbed.db");

    let (hospital, patient, bed_id) = {
        let backend = SqliteBackend::open(&path).unwrap();
        backend.init_schema().unwrap();
        let ward = seed_ward(&backend);
        let coordinator = AllocationCoordinator::new(backend);
        coordinator.check_in(ward.p1, ward.h1, day(1)).unwrap();
        let bed_id = coordinator
            .reserve_bed(ward.h1, "neurology", ward.p1)
            .unwrap()
            .bed_id();
        (ward.h1, ward.p1, bed_id)
    };

    let backend = SqliteBackend::open(&path).unwrap();
    backend.init_schema().unwrap();
    let coordinator = AllocationCoordinator::new(backend);

    assert!(bed(&coordinator, bed_id).occupied);
    let again = coordinator.reserve_bed(hospital, "neurology", patient).unwrap();
    assert!(matches!(again, ReserveOutcome::AlreadyAssigned { .. }));
    assert_occupancy_consistent(&coordinator);
}
