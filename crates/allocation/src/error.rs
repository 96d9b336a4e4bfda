//! Error types for allocation operations.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use medbed_persistence::error::ResourceError;
use medbed_persistence::types::{BedId, HospitalId, PatientId, VisitId};
use medbed_persistence::StorageError;
use thiserror::Error;

/// Errors returned by the bed registry, the visit ledger and the
/// allocation coordinator.
///
/// The idempotent no-op results of reserving an already-assigned visit or
/// releasing a free bed are not errors; see
/// [`ReserveOutcome`](crate::ReserveOutcome) and
/// [`ReleaseOutcome`](crate::ReleaseOutcome).
#[derive(Error, Debug)]
pub enum AllocationError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// No unoccupied bed matches the hospital and specialization.
    #[error("no free {specialization} bed available at hospital {hospital_id}")]
    NoBedAvailable {
        hospital_id: HospitalId,
        specialization: String,
    },

    /// The patient has no open visit at the hospital, so no bed can be
    /// reserved for them.
    #[error("patient {patient_id} is not checked in at hospital {hospital_id}")]
    PatientNotCheckedIn {
        patient_id: PatientId,
        hospital_id: HospitalId,
    },

    /// The patient has no open visit at the hospital to close.
    #[error("patient {patient_id} has no open visit at hospital {hospital_id}")]
    NoOpenVisit {
        patient_id: PatientId,
        hospital_id: HospitalId,
    },

    /// The visit is not in a state that allows the change.
    #[error("visit {visit_id} cannot be changed: {reason}")]
    InvalidState { visit_id: VisitId, reason: String },

    /// The patient already has an open visit at the hospital.
    #[error("patient {patient_id} already has open visit {visit_id} at hospital {hospital_id}")]
    Conflict {
        patient_id: PatientId,
        hospital_id: HospitalId,
        visit_id: VisitId,
    },

    /// Marking the bed occupied or attaching it to the visit failed. Nothing
    /// was written.
    #[error("allocation of bed {bed_id} to visit {visit_id} failed: {reason}")]
    AllocationFailed {
        bed_id: BedId,
        visit_id: VisitId,
        reason: String,
        #[source]
        source: Option<StorageError>,
    },

    /// Detaching the bed from its visit or marking it free failed. Nothing
    /// was written.
    #[error("release of bed {bed_id} failed: {reason}")]
    ReleaseFailed {
        bed_id: BedId,
        reason: String,
        #[source]
        source: Option<StorageError>,
    },

    /// Any other record store failure.
    #[error(transparent)]
    Storage(StorageError),
}

impl AllocationError {
    /// Builds a [`AllocationError::NotFound`] for the given entity kind and key.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AllocationError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns `true` for `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AllocationError::NotFound { .. })
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AllocationError::NotFound { .. } => "not_found",
            AllocationError::NoBedAvailable { .. } => "no_bed_available",
            AllocationError::PatientNotCheckedIn { .. } => "patient_not_checked_in",
            AllocationError::NoOpenVisit { .. } => "no_open_visit",
            AllocationError::InvalidState { .. } => "invalid_state",
            AllocationError::Conflict { .. } => "conflict",
            AllocationError::AllocationFailed { .. } => "allocation_failed",
            AllocationError::ReleaseFailed { .. } => "release_failed",
            AllocationError::Storage(_) => "storage",
        }
    }
}

impl From<StorageError> for AllocationError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Resource(ResourceError::NotFound { entity, id }) => {
                AllocationError::NotFound { entity, id }
            }
            other => AllocationError::Storage(other),
        }
    }
}

impl From<rusqlite::Error> for AllocationError {
    fn from(err: rusqlite::Error) -> Self {
        AllocationError::Storage(StorageError::from(err))
    }
}

/// Result type alias for allocation operations.
pub type AllocationResult<T> = Result<T, AllocationError>;
