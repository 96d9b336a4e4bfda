//! Shared fixtures and assertions for allocation integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;

use medbed_allocation::{AllocationCoordinator, BedRegistry};
use medbed_persistence::backends::sqlite::SqliteBackend;
use medbed_persistence::core::Record;
use medbed_persistence::models::{Bed, Hospital, HospitalVisit, Patient, Person, Specialization};
use medbed_persistence::types::{BedId, HospitalId, PatientId, Stored, VisitId};

/// Two hospitals, two patients and a handful of beds.
///
/// * `h1` has neurology beds `h1_neuro[0..2]` and no cardiology bed.
/// * `h2` has one pediatrics bed `h2_peds`.
pub struct Ward {
    pub h1: HospitalId,
    pub h2: HospitalId,
    pub p1: PatientId,
    pub p2: PatientId,
    pub h1_neuro: Vec<BedId>,
    pub h2_peds: BedId,
}

pub fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, n).unwrap()
}

pub fn create_backend() -> SqliteBackend {
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    backend.init_schema().expect("Failed to initialize schema");
    backend
}

pub fn seed_ward(backend: &SqliteBackend) -> Ward {
    let conn = backend.get_connection().unwrap();
    for name in ["neurology", "cardiology", "pediatrics"] {
        Specialization::new(name, Some(10.0)).insert(&conn).unwrap();
    }
    let h1 = Hospital::new("1 Main St", "5550001111").insert(&conn).unwrap().id();
    let h2 = Hospital::new("9 River Rd", "5550002222").insert(&conn).unwrap().id();
    let p1 = Patient::new(Person::new("Ada", "12 Elm St", "5551230001", day(1)), None, None)
        .insert(&conn)
        .unwrap()
        .id();
    let p2 = Patient::new(Person::new("Grace", "14 Elm St", "5551230002", day(1)), None, None)
        .insert(&conn)
        .unwrap()
        .id();

    let registry = BedRegistry::new(&conn);
    let h1_neuro = registry.provision(h1, "neurology", None, 2).unwrap();
    let h2_peds = registry.provision(h2, "pediatrics", None, 1).unwrap()[0];

    Ward {
        h1,
        h2,
        p1,
        p2,
        h1_neuro,
        h2_peds,
    }
}

pub fn setup() -> (AllocationCoordinator<SqliteBackend>, Ward) {
    let backend = create_backend();
    let ward = seed_ward(&backend);
    (AllocationCoordinator::new(backend), ward)
}

pub fn bed(coordinator: &AllocationCoordinator<SqliteBackend>, id: BedId) -> Stored<Bed> {
    let conn = coordinator.store().get_connection().unwrap();
    Bed::get(&conn, id).unwrap()
}

pub fn visit(coordinator: &AllocationCoordinator<SqliteBackend>, id: VisitId) -> Stored<HospitalVisit> {
    let conn = coordinator.store().get_connection().unwrap();
    HospitalVisit::get(&conn, id).unwrap()
}

pub fn all_visits(coordinator: &AllocationCoordinator<SqliteBackend>) -> Vec<Stored<HospitalVisit>> {
    let conn = coordinator.store().get_connection().unwrap();
    HospitalVisit::list(&conn).unwrap()
}

pub fn all_beds(coordinator: &AllocationCoordinator<SqliteBackend>) -> Vec<Stored<Bed>> {
    let conn = coordinator.store().get_connection().unwrap();
    Bed::list(&conn).unwrap()
}

/// Asserts that every occupied bed has exactly one open visit referencing it
/// and every free bed has none.
pub fn assert_occupancy_consistent(coordinator: &AllocationCoordinator<SqliteBackend>) {
    let violations = coordinator.occupancy_violations().unwrap();
    assert!(violations.is_empty(), "occupancy violations: {:?}", violations);
}
