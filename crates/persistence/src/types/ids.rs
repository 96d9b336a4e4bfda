//! Strongly typed record identifiers.
//!
//! Every auto-increment table gets its own identifier newtype so a bed id can
//! never be passed where a visit id is expected. Identifiers are stored as
//! SQLite `INTEGER` columns and serialize transparently as numbers.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw row id.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw row id.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

record_id!(
    /// Identifier of a hospital.
    HospitalId
);

record_id!(
    /// Identifier of a person row. Patients and staff members share this
    /// identity space because both embed a person.
    PersonId
);

record_id!(
    /// Identifier of a bed.
    BedId
);

record_id!(
    /// Identifier of a hospital visit.
    VisitId
);

record_id!(
    /// Identifier of a medical record entry.
    MedicalRecordId
);

record_id!(
    /// Identifier of a billing account.
    BillingId
);

/// Identifier of a patient (a person with a patient row).
pub type PatientId = PersonId;

/// Identifier of a staff member (a person with a staff row).
pub type StaffId = PersonId;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let id: BedId = " 17 ".parse().unwrap();
        assert_eq!(id, BedId::new(17));
        assert_eq!(id.to_string(), "17");
        assert!("x".parse::<VisitId>().is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let id = HospitalId::new(3);
        assert_eq!(serde_json::to_string(&id).unwrap(), "3");
        let back: HospitalId = serde_json::from_str("3").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_sql_round_trip() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let id: VisitId = conn
            .query_row("SELECT ?1", [VisitId::new(99)], |row| row.get(0))
            .unwrap();
        assert_eq!(id.get(), 99);
    }
}
