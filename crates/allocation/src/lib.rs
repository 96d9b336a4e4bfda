//! Bed allocation and visit lifecycle for the medbed record store.
//!
//! - [`BedRegistry`] answers whether a free bed of a specialization exists in
//!   a hospital and flips occupancy flags.
//! - [`VisitLedger`] opens, closes and re-points hospital visits.
//! - [`AllocationCoordinator`] runs check-in, reservation, release,
//!   check-out and transfer as atomic units over both.
//! - [`reports`] holds read-only aggregate queries.
//!
//! The registry and ledger work over any `&rusqlite::Connection`, including a
//! transaction. Only the coordinator opens transactions; it gets them from an
//! injected [`TransactionProvider`](medbed_persistence::TransactionProvider).
//!
//! A bed is occupied exactly when one open visit references it. Check-out is
//! the one operation that leaves an occupied bed behind a closed visit; the
//! bed is reported in [`CheckOutOutcome::retained_bed`] and must be released
//! by the caller.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod beds;
pub mod coordinator;
pub mod error;
pub mod outcome;
pub mod policy;
pub mod reports;
pub mod visits;

pub use beds::{BedRegistry, HospitalUsage, OccupancyViolation, SpecializationOccupancy};
pub use coordinator::AllocationCoordinator;
pub use error::{AllocationError, AllocationResult};
pub use outcome::{CheckOutOutcome, ReleaseOutcome, ReserveOutcome, TransferOutcome, TransferResult};
pub use policy::AllocationPolicy;
pub use visits::VisitLedger;
