//! The allocation coordinator.
//!
//! Every operation runs in its own transaction obtained from the injected
//! [`TransactionProvider`]. Write transactions begin `IMMEDIATE`, so the
//! read-check-write sequence of a reservation holds the database write lock
//! from the first read. The state-changing statements are conditional and
//! their affected-row counts are checked, so a bed can never be handed to
//! two visits.
//!
//! # Example
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use medbed_allocation::{AllocationCoordinator, ReserveOutcome};
//! use medbed_persistence::backends::sqlite::SqliteBackend;
//! use medbed_persistence::types::{HospitalId, PatientId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::in_memory()?;
//! backend.init_schema()?;
//! let coordinator = AllocationCoordinator::new(backend);
//!
//! let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
//! coordinator.check_in(PatientId::new(1), HospitalId::new(1), today)?;
//! match coordinator.reserve_bed(HospitalId::new(1), "neurology", PatientId::new(1))? {
//!     ReserveOutcome::Reserved { bed_id, .. } => println!("reserved {}", bed_id),
//!     ReserveOutcome::AlreadyAssigned { bed_id, .. } => println!("already in {}", bed_id),
//! }
//! # Ok(())
//! # }
//! ```

use chrono::NaiveDate;
use medbed_persistence::core::{Record, TransactionOptions, TransactionProvider};
use medbed_persistence::models::{Hospital, HospitalVisit, Patient};
use medbed_persistence::types::{BedId, HospitalId, PatientId, Stored};
use medbed_persistence::{StorageError, Transaction};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::beds::{BedRegistry, OccupancyViolation};
use crate::error::{AllocationError, AllocationResult};
use crate::outcome::{
    CheckOutOutcome, ReleaseOutcome, ReserveOutcome, TransferOutcome, TransferResult,
};
use crate::policy::AllocationPolicy;
use crate::visits::VisitLedger;

/// Performs check-in, bed reservation, bed release, check-out and transfer
/// as atomic units over the bed registry and visit ledger.
#[derive(Debug)]
pub struct AllocationCoordinator<S> {
    store: S,
    policy: AllocationPolicy,
}

impl<S: TransactionProvider> AllocationCoordinator<S> {
    /// Creates a coordinator with the default policy.
    pub fn new(store: S) -> Self {
        Self::with_policy(store, AllocationPolicy::default())
    }

    /// Creates a coordinator with an explicit policy.
    pub fn with_policy(store: S, policy: AllocationPolicy) -> Self {
        Self { store, policy }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The policy in effect.
    pub fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    /// Assigns a free bed of `specialization` to the patient's open visit at
    /// the hospital.
    ///
    /// # Errors
    ///
    /// * `NoBedAvailable` - no unoccupied matching bed; nothing written
    /// * `PatientNotCheckedIn` - the patient has no open visit there
    /// * `AllocationFailed` - marking the bed or attaching it failed; rolled back
    pub fn reserve_bed(
        &self,
        hospital_id: HospitalId,
        specialization: &str,
        patient_id: PatientId,
    ) -> AllocationResult<ReserveOutcome> {
        let outcome = self.store.with_transaction(TransactionOptions::default(), |tx| {
            reserve_in(tx, hospital_id, specialization, patient_id)
        })?;

        match &outcome {
            ReserveOutcome::Reserved { bed_id, visit_id } => info!(
                bed_id = %bed_id,
                visit_id = %visit_id,
                patient_id = %patient_id,
                hospital_id = %hospital_id,
                specialization,
                "bed reserved"
            ),
            ReserveOutcome::AlreadyAssigned { bed_id, visit_id } => debug!(
                bed_id = %bed_id,
                visit_id = %visit_id,
                patient_id = %patient_id,
                "visit already holds a bed"
            ),
        }
        Ok(outcome)
    }

    /// Frees a bed and detaches it from any open visit holding it.
    ///
    /// # Errors
    ///
    /// * `NotFound` - the bed does not exist
    /// * `ReleaseFailed` - detaching or freeing failed; rolled back
    pub fn release_bed(&self, bed_id: BedId) -> AllocationResult<ReleaseOutcome> {
        let outcome = self
            .store
            .with_transaction(TransactionOptions::default(), |tx| release_in(tx, bed_id))?;

        if let ReleaseOutcome::Released { cleared_visits, .. } = &outcome {
            info!(bed_id = %bed_id, cleared = cleared_visits.len(), "bed released");
        }
        Ok(outcome)
    }

    /// Opens a visit with no bed for the patient at the hospital.
    ///
    /// # Errors
    ///
    /// * `NotFound` - the patient or hospital does not exist
    /// * `Conflict` - the patient already has an open visit there and the
    ///   policy enforces a single open visit
    pub fn check_in(
        &self,
        patient_id: PatientId,
        hospital_id: HospitalId,
        date: NaiveDate,
    ) -> AllocationResult<Stored<HospitalVisit>> {
        let visit = self.store.with_transaction(TransactionOptions::default(), |tx| {
            check_in_in(tx, &self.policy, patient_id, hospital_id, date)
        })?;
        info!(
            visit_id = %visit.id(),
            patient_id = %patient_id,
            hospital_id = %hospital_id,
            "patient checked in"
        );
        Ok(visit)
    }

    /// Closes the patient's open visit at the hospital.
    ///
    /// The visit's bed, if any, stays occupied and is reported in
    /// [`CheckOutOutcome::retained_bed`]; release it with
    /// [`release_bed`](Self::release_bed).
    ///
    /// # Errors
    ///
    /// * `NoOpenVisit` - nothing to close; no visit is touched
    /// * `InvalidState` - `date` is before the visit's start date
    pub fn check_out(
        &self,
        patient_id: PatientId,
        hospital_id: HospitalId,
        date: NaiveDate,
    ) -> AllocationResult<CheckOutOutcome> {
        let outcome = self.store.with_transaction(TransactionOptions::default(), |tx| {
            check_out_in(tx, patient_id, hospital_id, date)
        })?;
        info!(
            visit_id = %outcome.visit_id,
            patient_id = %patient_id,
            hospital_id = %hospital_id,
            bed_id = ?outcome.retained_bed,
            "patient checked out"
        );
        Ok(outcome)
    }

    /// Moves a patient from one hospital to another.
    ///
    /// Checks out at `from`, releases the bed the closed visit held on a
    /// best-effort basis, and checks in at `to` with no bed. Check-out and
    /// check-in commit together or not at all; a failed release only undoes
    /// its own writes and is reported in [`TransferResult::bed_release`].
    pub fn transfer_patient(
        &self,
        patient_id: PatientId,
        from: HospitalId,
        to: HospitalId,
        new_specialization: &str,
        date: NaiveDate,
    ) -> TransferResult {
        let mut bed_release = None;

        let primary = self.store.with_transaction(
            TransactionOptions::default(),
            |tx| -> AllocationResult<TransferOutcome> {
                let checked_out = check_out_in(tx, patient_id, from, date)?;

                if let Some(bed_id) = checked_out.retained_bed {
                    let release =
                        tx.savepoint("transfer_release", |conn| release_in(conn, bed_id));
                    if let Err(err) = &release {
                        warn!(
                            bed_id = %bed_id,
                            patient_id = %patient_id,
                            hospital_id = %from,
                            error = %err,
                            "bed release during transfer failed"
                        );
                    }
                    bed_release = Some(release);
                }

                let new_visit = check_in_in(tx, &self.policy, patient_id, to, date)?;
                Ok(TransferOutcome {
                    closed_visit: checked_out.visit_id,
                    previous_bed: checked_out.retained_bed,
                    new_visit,
                    new_specialization: new_specialization.to_string(),
                })
            },
        );

        match &primary {
            Ok(outcome) => info!(
                patient_id = %patient_id,
                from = %from,
                to = %to,
                visit_id = %outcome.new_visit.id(),
                "patient transferred"
            ),
            Err(err) => {
                warn!(patient_id = %patient_id, from = %from, to = %to, error = %err, "transfer rolled back");
                bed_release = None;
            }
        }

        TransferResult {
            primary,
            bed_release,
        }
    }

    /// Beds whose occupied flag disagrees with their open visits, read in a
    /// read-only transaction.
    pub fn occupancy_violations(&self) -> AllocationResult<Vec<OccupancyViolation>> {
        self.read(|conn| BedRegistry::new(conn).occupancy_violations())
    }

    /// Runs `f` in a read-only transaction.
    pub fn read<R, F>(&self, f: F) -> AllocationResult<R>
    where
        F: FnOnce(&Connection) -> AllocationResult<R>,
    {
        self.store
            .with_transaction(TransactionOptions::read_only(), |tx| f(tx))
    }
}

fn reserve_in(
    conn: &Connection,
    hospital_id: HospitalId,
    specialization: &str,
    patient_id: PatientId,
) -> AllocationResult<ReserveOutcome> {
    let beds = BedRegistry::new(conn);
    let visits = VisitLedger::new(conn);

    let bed = beds
        .find_available_bed(hospital_id, specialization)?
        .ok_or_else(|| AllocationError::NoBedAvailable {
            hospital_id,
            specialization: specialization.to_string(),
        })?;

    let visit = visits
        .get_open_visit(patient_id, hospital_id)?
        .ok_or(AllocationError::PatientNotCheckedIn {
            patient_id,
            hospital_id,
        })?;

    if let Some(held) = visit.bed_id {
        return Ok(ReserveOutcome::AlreadyAssigned {
            bed_id: held,
            visit_id: visit.id(),
        });
    }

    let bed_id = bed.id();
    let visit_id = visit.id();
    let allocation_failed = |reason: &str, err: Option<AllocationError>| {
        AllocationError::AllocationFailed {
            bed_id,
            visit_id,
            reason: reason.to_string(),
            source: err.and_then(into_storage),
        }
    };

    match beds.mark_occupied(bed_id) {
        Ok(true) => {}
        Ok(false) => return Err(allocation_failed("bed is no longer free", None)),
        Err(err) => return Err(allocation_failed("marking bed occupied failed", Some(err))),
    }
    match visits.claim_bed(visit_id, bed_id) {
        Ok(true) => {}
        Ok(false) => return Err(allocation_failed("visit is closed or already holds a bed", None)),
        Err(err) => return Err(allocation_failed("attaching bed to visit failed", Some(err))),
    }

    Ok(ReserveOutcome::Reserved { bed_id, visit_id })
}

fn release_in(conn: &Connection, bed_id: BedId) -> AllocationResult<ReleaseOutcome> {
    let beds = BedRegistry::new(conn);
    let visits = VisitLedger::new(conn);

    let bed = beds.get_by_id(bed_id)?;
    if !bed.occupied {
        return Ok(ReleaseOutcome::AlreadyFree { bed_id });
    }

    let release_failed = |reason: &str, err: Option<AllocationError>| AllocationError::ReleaseFailed {
        bed_id,
        reason: reason.to_string(),
        source: err.and_then(into_storage),
    };

    let cleared_visits = visits
        .clear_bed(bed_id)
        .map_err(|err| release_failed("detaching bed from visits failed", Some(err)))?;
    match beds.mark_free(bed_id) {
        Ok(true) => {}
        Ok(false) => return Err(release_failed("bed was freed concurrently", None)),
        Err(err) => return Err(release_failed("marking bed free failed", Some(err))),
    }

    Ok(ReleaseOutcome::Released {
        bed_id,
        cleared_visits,
    })
}

fn check_in_in(
    conn: &Connection,
    policy: &AllocationPolicy,
    patient_id: PatientId,
    hospital_id: HospitalId,
    date: NaiveDate,
) -> AllocationResult<Stored<HospitalVisit>> {
    Patient::get(conn, patient_id)?;
    Hospital::get(conn, hospital_id)?;

    VisitLedger::new(conn).open_visit(
        hospital_id,
        patient_id,
        date,
        Some(policy.default_registration_fee),
        policy.enforce_single_open_visit,
    )
}

fn check_out_in(
    conn: &Connection,
    patient_id: PatientId,
    hospital_id: HospitalId,
    date: NaiveDate,
) -> AllocationResult<CheckOutOutcome> {
    let visits = VisitLedger::new(conn);
    let visit = visits
        .get_open_visit(patient_id, hospital_id)?
        .ok_or(AllocationError::NoOpenVisit {
            patient_id,
            hospital_id,
        })?;

    visits.close_visit(visit.id(), date)?;
    Ok(CheckOutOutcome {
        visit_id: visit.id(),
        end_date: date,
        retained_bed: visit.bed_id,
    })
}

fn into_storage(err: AllocationError) -> Option<StorageError> {
    match err {
        AllocationError::Storage(err) => Some(err),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medbed_persistence::backends::sqlite::SqliteBackend;
    use medbed_persistence::models::{Bed, Person, Specialization};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn coordinator() -> (AllocationCoordinator<SqliteBackend>, HospitalId, PatientId) {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        let (hospital, patient) = {
            let conn = backend.get_connection().unwrap();
            let hospital = Hospital::new("1 Main St", "5550001111").insert(&conn).unwrap().id();
            Specialization::new("neurology", Some(10.0)).insert(&conn).unwrap();
            Bed::new(hospital, "neurology").insert(&conn).unwrap();
            let patient = Patient::new(
                Person::new("Ada", "12 Elm St", "5551234567", date(1)),
                None,
                None,
            )
            .insert(&conn)
            .unwrap()
            .id();
            (hospital, patient)
        };
        (AllocationCoordinator::new(backend), hospital, patient)
    }

    #[test]
    fn test_check_in_records_policy_fee() {
        let (coordinator, hospital, patient) = coordinator();
        let visit = coordinator.check_in(patient, hospital, date(2)).unwrap();
        assert_eq!(visit.registration_fee, Some(20.0));
        assert!(visit.bed_id.is_none());
    }

    #[test]
    fn test_check_in_unknown_patient() {
        let (coordinator, hospital, _) = coordinator();
        let err = coordinator
            .check_in(PatientId::new(404), hospital, date(2))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_second_reserve_without_spare_bed() {
        let (coordinator, hospital, patient) = coordinator();
        coordinator.check_in(patient, hospital, date(2)).unwrap();

        let first = coordinator.reserve_bed(hospital, "neurology", patient).unwrap();
        assert!(matches!(first, ReserveOutcome::Reserved { .. }));
        // The bed lookup runs before the visit check.
        let again = coordinator.reserve_bed(hospital, "neurology", patient);
        assert!(matches!(again, Err(AllocationError::NoBedAvailable { .. })));
    }

    #[test]
    fn test_release_free_bed_is_noop() {
        let (coordinator, hospital, _) = coordinator();
        let bed = coordinator
            .read(|conn| BedRegistry::new(conn).beds_in_hospital(hospital))
            .unwrap()[0]
            .id();
        assert_eq!(
            coordinator.release_bed(bed).unwrap(),
            ReleaseOutcome::AlreadyFree { bed_id: bed }
        );
    }

    #[test]
    fn test_check_out_without_visit() {
        let (coordinator, hospital, patient) = coordinator();
        let err = coordinator.check_out(patient, hospital, date(3)).unwrap_err();
        assert!(matches!(err, AllocationError::NoOpenVisit { .. }));
    }

    #[test]
    fn test_read_rejects_writes() {
        let (coordinator, hospital, _) = coordinator();
        let result = coordinator.read(|conn| {
            BedRegistry::new(conn).provision(hospital, "neurology", None, 1)
        });
        assert!(matches!(result, Err(AllocationError::Storage(_))));
    }
}
