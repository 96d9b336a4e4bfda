//! Read-only report queries.

mod common;

use common::*;
use medbed_allocation::reports;
use medbed_persistence::core::Record;
use medbed_persistence::models::{
    HospitalSpecialty, JobTitle, MedicalRecord, Person, ResponsibleStaff, Staff,
};

#[test]
fn test_hospitals_by_specialty() {
    let (coordinator, ward) = setup();
    {
        let conn = coordinator.store().get_connection().unwrap();
        HospitalSpecialty::new(ward.h1, "neurology").insert(&conn).unwrap();
        HospitalSpecialty::new(ward.h2, "neurology").insert(&conn).unwrap();
        HospitalSpecialty::new(ward.h2, "cardiology").insert(&conn).unwrap();
    }

    let rows = coordinator.read(|conn| reports::hospitals_by_specialty(conn)).unwrap();

    let pairs: Vec<_> = rows
        .iter()
        .map(|r| (r.specialization.as_str(), r.hospital_id))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("cardiology", ward.h2),
            ("neurology", ward.h1),
            ("neurology", ward.h2),
        ]
    );
    assert_eq!(rows[0].address, "9 River Rd");
}

#[test]
fn test_doctors_for_patient_only_open_visits() {
    let (coordinator, ward) = setup();
    let old = coordinator.check_in(ward.p1, ward.h1, day(1)).unwrap();
    coordinator.check_out(ward.p1, ward.h1, day(2)).unwrap();
    let current = coordinator.check_in(ward.p1, ward.h2, day(3)).unwrap();

    let (house, grey, nurse) = {
        let conn = coordinator.store().get_connection().unwrap();
        let staff = |name: &str, hospital, title| {
            Staff::new(Person::new(name, "3 Clinic Way", "5559990000", day(1)), hospital, title)
                .with_specialization("neurology")
                .insert(&conn)
                .unwrap()
                .id()
        };
        let house = staff("House", ward.h2, JobTitle::Doctor);
        let grey = staff("Grey", ward.h1, JobTitle::Doctor);
        let nurse = staff("Joy", ward.h2, JobTitle::Nurse);
        ResponsibleStaff::new(current.id(), house).insert(&conn).unwrap();
        ResponsibleStaff::new(current.id(), nurse).insert(&conn).unwrap();
        ResponsibleStaff::new(old.id(), grey).insert(&conn).unwrap();
        (house, grey, nurse)
    };

    let doctors = coordinator
        .read(|conn| reports::doctors_for_patient(conn, ward.p1))
        .unwrap();

    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0].staff_id, house);
    assert_eq!(doctors[0].name, "House");
    assert_eq!(doctors[0].specialization.as_deref(), Some("neurology"));
    assert!(doctors.iter().all(|d| d.staff_id != grey && d.staff_id != nurse));
}

#[test]
fn test_usage_and_available_beds() {
    let (coordinator, ward) = setup();
    coordinator.check_in(ward.p1, ward.h1, day(1)).unwrap();
    coordinator.reserve_bed(ward.h1, "neurology", ward.p1).unwrap();

    let usage = coordinator.read(|conn| reports::hospital_usage(conn)).unwrap();
    assert_eq!(usage.len(), 2);
    assert_eq!(usage[0].hospital_id, ward.h1);
    assert_eq!((usage[0].free, usage[0].occupied), (1, 1));
    assert_eq!(usage[0].usage_percent, 50.0);
    assert_eq!(usage[1].usage_percent, 0.0);

    let beds = coordinator
        .read(|conn| reports::available_beds(conn, ward.h1))
        .unwrap();
    assert_eq!(beds.len(), 1);
    assert_eq!(beds[0].specialization, "neurology");
    assert_eq!(beds[0].free, 1);
    assert_eq!(beds[0].total(), 2);
}

#[test]
fn test_visits_per_month() {
    let (coordinator, ward) = setup();
    coordinator.check_in(ward.p1, ward.h1, day(1)).unwrap();
    coordinator.check_out(ward.p1, ward.h1, day(2)).unwrap();
    coordinator.check_in(ward.p2, ward.h1, day(20)).unwrap();
    let may = chrono::NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
    coordinator.check_in(ward.p1, ward.h1, may).unwrap();

    let months = coordinator
        .read(|conn| reports::visits_per_month(conn, ward.h1))
        .unwrap();

    assert_eq!(months.len(), 2);
    assert_eq!(months[0].month, "2024-04");
    assert_eq!(months[0].month_name, "April");
    assert_eq!(months[0].visits, 2);
    assert_eq!(months[1].month_name, "May");
    assert_eq!(months[1].visits, 1);
}

#[test]
fn test_billing_summary_in_range() {
    let (coordinator, ward) = setup();
    let first = coordinator.check_in(ward.p1, ward.h1, day(2)).unwrap();
    coordinator.check_out(ward.p1, ward.h1, day(3)).unwrap();
    coordinator.check_in(ward.p1, ward.h1, day(25)).unwrap();

    {
        let conn = coordinator.store().get_connection().unwrap();
        let doctor = Staff::new(
            Person::new("House", "3 Clinic Way", "5559990000", day(1)),
            ward.h1,
            JobTitle::Doctor,
        )
        .insert(&conn)
        .unwrap()
        .id();
        for fee in [15.0, 5.0] {
            let mut record = MedicalRecord::new(first.id(), doctor);
            record.consultation_fee = Some(fee);
            record.test_fee = 2.0;
            record.insert(&conn).unwrap();
        }
    }

    let summary = coordinator
        .read(|conn| reports::billing_summary(conn, ward.p1, day(1), day(10)))
        .unwrap();

    assert_eq!(summary.visits, 1);
    assert_eq!(summary.registration_fees, 20.0);
    assert_eq!(summary.consultation_fees, 20.0);
    assert_eq!(summary.test_fees, 4.0);
    assert_eq!(summary.treatment_fees, 0.0);
    assert_eq!(summary.total(), 44.0);

    let everything = coordinator
        .read(|conn| reports::billing_summary(conn, ward.p1, day(1), day(30)))
        .unwrap();
    assert_eq!(everything.visits, 2);
    assert_eq!(everything.registration_fees, 40.0);
}
