//! Results of coordinator operations.

use chrono::NaiveDate;
use medbed_persistence::models::HospitalVisit;
use medbed_persistence::types::{BedId, Stored, VisitId};
use serde::Serialize;

use crate::error::AllocationError;

/// Result of [`reserve_bed`](crate::AllocationCoordinator::reserve_bed).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReserveOutcome {
    /// The bed was marked occupied and attached to the visit.
    Reserved { bed_id: BedId, visit_id: VisitId },
    /// The visit already held a bed. Nothing was written.
    AlreadyAssigned { bed_id: BedId, visit_id: VisitId },
}

impl ReserveOutcome {
    /// The bed held by the visit after the call.
    pub fn bed_id(&self) -> BedId {
        match self {
            ReserveOutcome::Reserved { bed_id, .. } | ReserveOutcome::AlreadyAssigned { bed_id, .. } => {
                *bed_id
            }
        }
    }

    /// The visit holding the bed.
    pub fn visit_id(&self) -> VisitId {
        match self {
            ReserveOutcome::Reserved { visit_id, .. }
            | ReserveOutcome::AlreadyAssigned { visit_id, .. } => *visit_id,
        }
    }
}

/// Result of [`release_bed`](crate::AllocationCoordinator::release_bed).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// The bed was marked free and detached from the listed open visits.
    Released {
        bed_id: BedId,
        cleared_visits: Vec<VisitId>,
    },
    /// The bed was already free. Nothing was written.
    AlreadyFree { bed_id: BedId },
}

/// Result of [`check_out`](crate::AllocationCoordinator::check_out).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutOutcome {
    /// The closed visit.
    pub visit_id: VisitId,
    /// The date recorded as the visit's end.
    pub end_date: NaiveDate,
    /// Bed still marked occupied on behalf of the closed visit. Check-out
    /// does not release it; the caller releases it separately.
    pub retained_bed: Option<BedId>,
}

/// Successful part of a transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferOutcome {
    /// The visit closed at the origin hospital.
    pub closed_visit: VisitId,
    /// Bed the closed visit held, if any.
    pub previous_bed: Option<BedId>,
    /// The new open visit at the destination hospital. It holds no bed.
    pub new_visit: Stored<HospitalVisit>,
    /// Specialization requested at the destination, for a follow-up
    /// reservation.
    pub new_specialization: String,
}

/// Two-phase result of [`transfer_patient`](crate::AllocationCoordinator::transfer_patient).
///
/// `primary` covers check-out and check-in. `bed_release` reports the
/// best-effort release of the origin bed: `None` when there was no bed to
/// release or when `primary` failed and everything was rolled back.
#[derive(Debug)]
pub struct TransferResult {
    /// Check-out at the origin and check-in at the destination.
    pub primary: Result<TransferOutcome, AllocationError>,
    /// Release of the bed held at the origin.
    pub bed_release: Option<Result<ReleaseOutcome, AllocationError>>,
}

impl TransferResult {
    /// Returns `true` if the patient was moved.
    pub fn is_transferred(&self) -> bool {
        self.primary.is_ok()
    }

    /// Returns `true` if a bed release was attempted and failed.
    pub fn release_failed(&self) -> bool {
        matches!(self.bed_release, Some(Err(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_outcome_serializes_tagged() {
        let outcome = ReserveOutcome::AlreadyAssigned {
            bed_id: BedId::new(2),
            visit_id: VisitId::new(9),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "already_assigned");
        assert_eq!(json["bed_id"], 2);
        assert_eq!(outcome.visit_id(), VisitId::new(9));
    }

    #[test]
    fn test_transfer_result_flags() {
        let result = TransferResult {
            primary: Err(AllocationError::not_found("patient", 1)),
            bed_release: None,
        };
        assert!(!result.is_transferred());
        assert!(!result.release_failed());
    }
}
