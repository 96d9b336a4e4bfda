//! Tunable rules applied by the allocation coordinator.

use serde::{Deserialize, Serialize};

/// Rules applied by [`AllocationCoordinator`](crate::AllocationCoordinator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPolicy {
    /// Reject a check-in when the patient already has an open visit at the
    /// same hospital. Turning this off allows duplicate open visits; the
    /// ledger then works with the oldest one.
    #[serde(default = "default_true")]
    pub enforce_single_open_visit: bool,

    /// Registration fee recorded on every new visit.
    #[serde(default = "default_registration_fee")]
    pub default_registration_fee: f64,
}

fn default_true() -> bool {
    true
}

fn default_registration_fee() -> f64 {
    20.0
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            enforce_single_open_visit: true,
            default_registration_fee: default_registration_fee(),
        }
    }
}

impl AllocationPolicy {
    /// Sets whether duplicate open visits are rejected.
    pub fn with_single_open_visit(mut self, enforce: bool) -> Self {
        self.enforce_single_open_visit = enforce;
        self
    }

    /// Sets the registration fee for new visits.
    pub fn with_registration_fee(mut self, fee: f64) -> Self {
        self.default_registration_fee = fee;
        self
    }
}
