//! The bed registry: bed lookup, occupancy flags and occupancy aggregates.

use medbed_persistence::core::Record;
use medbed_persistence::models::Bed;
use medbed_persistence::types::{BedId, HospitalId, StaffId, Stored, VisitId};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::debug;

use crate::error::AllocationResult;

/// Occupied and free bed counts for one specialization in one hospital.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecializationOccupancy {
    /// Specialization name.
    pub specialization: String,
    /// Beds not held by any visit.
    pub free: i64,
    /// Beds held by a visit.
    pub occupied: i64,
}

impl SpecializationOccupancy {
    /// Total beds of the specialization.
    pub fn total(&self) -> i64 {
        self.free + self.occupied
    }
}

/// Bed usage for one hospital.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HospitalUsage {
    /// The hospital.
    pub hospital_id: HospitalId,
    /// Beds not held by any visit.
    pub free: i64,
    /// Beds held by a visit.
    pub occupied: i64,
    /// Occupied beds as a percentage of all beds.
    pub usage_percent: f64,
}

/// A bed whose occupied flag disagrees with the open visits that
/// reference it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupancyViolation {
    /// The bed.
    pub bed_id: BedId,
    /// The bed's hospital.
    pub hospital_id: HospitalId,
    /// The stored flag.
    pub occupied: bool,
    /// Open visits referencing the bed.
    pub open_visits: i64,
    /// The most recent closed visit still referencing an occupied bed with
    /// no open holder. This is the state check-out leaves behind until the
    /// bed is released.
    pub held_by_closed_visit: Option<VisitId>,
}

/// Access to beds over one connection or transaction.
///
/// The flag mutators only touch the `bed` table. Callers pair them with the
/// matching [`VisitLedger`](crate::VisitLedger) change in the same
/// transaction.
#[derive(Debug, Clone, Copy)]
pub struct BedRegistry<'c> {
    conn: &'c Connection,
}

impl<'c> BedRegistry<'c> {
    /// Creates a registry over `conn`.
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Returns an unoccupied bed of the given specialization in the
    /// hospital, lowest id first, or `None`.
    pub fn find_available_bed(
        &self,
        hospital_id: HospitalId,
        specialization: &str,
    ) -> AllocationResult<Option<Stored<Bed>>> {
        let sql = format!(
            "{} WHERE hospital_id = ?1 AND specialization = ?2 AND occupied = 0 ORDER BY id LIMIT 1",
            Bed::select_sql()
        );
        let bed = self
            .conn
            .query_row(&sql, params![hospital_id, specialization], |row| {
                Bed::read_stored(row)
            })
            .optional()?;
        debug!(
            hospital_id = %hospital_id,
            specialization,
            bed_id = ?bed.as_ref().map(|b| b.id()),
            "looked up available bed"
        );
        Ok(bed)
    }

    /// Loads a bed, failing with `NotFound` if absent.
    pub fn get_by_id(&self, bed_id: BedId) -> AllocationResult<Stored<Bed>> {
        Ok(Bed::get(self.conn, bed_id)?)
    }

    /// Sets the occupied flag if the bed is currently free. Returns whether
    /// the flag changed.
    pub fn mark_occupied(&self, bed_id: BedId) -> AllocationResult<bool> {
        let changed = self.conn.execute(
            "UPDATE bed SET occupied = 1 WHERE id = ?1 AND occupied = 0",
            [bed_id],
        )?;
        Ok(changed == 1)
    }

    /// Clears the occupied flag if the bed is currently occupied. Returns
    /// whether the flag changed.
    pub fn mark_free(&self, bed_id: BedId) -> AllocationResult<bool> {
        let changed = self.conn.execute(
            "UPDATE bed SET occupied = 0 WHERE id = ?1 AND occupied = 1",
            [bed_id],
        )?;
        Ok(changed == 1)
    }

    /// Creates `count` free beds of one specialization in a hospital.
    pub fn provision(
        &self,
        hospital_id: HospitalId,
        specialization: &str,
        nurse_id: Option<StaffId>,
        count: u32,
    ) -> AllocationResult<Vec<BedId>> {
        let mut ids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut bed = Bed::new(hospital_id, specialization);
            bed.nurse_id = nurse_id;
            ids.push(bed.insert(self.conn)?.id());
        }
        debug!(hospital_id = %hospital_id, specialization, count, "provisioned beds");
        Ok(ids)
    }

    /// All beds of a hospital.
    pub fn beds_in_hospital(&self, hospital_id: HospitalId) -> AllocationResult<Vec<Stored<Bed>>> {
        let sql = format!("{} WHERE hospital_id = ?1 ORDER BY id", Bed::select_sql());
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([hospital_id], |row| Bed::read_stored(row))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Free and occupied counts per specialization for one hospital.
    pub fn occupancy_by_specialization(
        &self,
        hospital_id: HospitalId,
    ) -> AllocationResult<Vec<SpecializationOccupancy>> {
        let mut stmt = self.conn.prepare(
            "SELECT specialization,
                    SUM(CASE WHEN occupied = 0 THEN 1 ELSE 0 END),
                    SUM(CASE WHEN occupied = 1 THEN 1 ELSE 0 END)
             FROM bed
             WHERE hospital_id = ?1
             GROUP BY specialization
             ORDER BY specialization",
        )?;
        let rows = stmt.query_map([hospital_id], |row| {
            Ok(SpecializationOccupancy {
                specialization: row.get(0)?,
                free: row.get(1)?,
                occupied: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Free and occupied counts and usage percentage for every hospital with
    /// at least one bed.
    pub fn hospital_usage(&self) -> AllocationResult<Vec<HospitalUsage>> {
        let mut stmt = self.conn.prepare(
            "SELECT hospital_id,
                    SUM(CASE WHEN occupied = 0 THEN 1 ELSE 0 END),
                    SUM(CASE WHEN occupied = 1 THEN 1 ELSE 0 END)
             FROM bed
             GROUP BY hospital_id
             ORDER BY hospital_id",
        )?;
        let rows = stmt.query_map([], |row| {
            let free: i64 = row.get(1)?;
            let occupied: i64 = row.get(2)?;
            Ok(HospitalUsage {
                hospital_id: row.get(0)?,
                free,
                occupied,
                usage_percent: usage_percent(occupied, free + occupied),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Beds where `occupied` is not equivalent to "exactly one open visit
    /// references this bed".
    pub fn occupancy_violations(&self) -> AllocationResult<Vec<OccupancyViolation>> {
        let mut stmt = self.conn.prepare(
            "SELECT b.id, b.hospital_id, b.occupied,
                    (SELECT COUNT(*) FROM hospital_visit v
                      WHERE v.bed_id = b.id AND v.end_date IS NULL) AS open_visits,
                    (SELECT MAX(v.id) FROM hospital_visit v
                      WHERE v.bed_id = b.id AND v.end_date IS NOT NULL) AS last_closed
             FROM bed b
             ORDER BY b.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, BedId>(0)?,
                row.get::<_, HospitalId>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<VisitId>>(4)?,
            ))
        })?;

        let mut violations = Vec::new();
        for row in rows {
            let (bed_id, hospital_id, occupied, open_visits, last_closed) = row?;
            let consistent = if occupied {
                open_visits == 1
            } else {
                open_visits == 0
            };
            if !consistent {
                violations.push(OccupancyViolation {
                    bed_id,
                    hospital_id,
                    occupied,
                    open_visits,
                    held_by_closed_visit: if occupied && open_visits == 0 {
                        last_closed
                    } else {
                        None
                    },
                });
            }
        }
        Ok(violations)
    }
}

fn usage_percent(occupied: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        occupied as f64 * 100.0 / total as f64
    }
}
