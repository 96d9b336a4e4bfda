//! SQLite schema definitions and migrations.

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::error::{BackendError, StorageError, StorageResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

fn migration_error(step: &str, e: rusqlite::Error) -> StorageError {
    StorageError::Backend(BackendError::MigrationError {
        message: format!("{}: {}", step, e),
    })
}

/// Initialize the database schema.
///
/// Creates the tables on a fresh database and applies any pending
/// migrations. All of it runs in one transaction.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| migration_error("begin schema transaction", e))?;

    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")
        .map_err(|e| migration_error("create schema_version table", e))?;

    let current_version = get_schema_version(conn)?.unwrap_or(0);

    if current_version == 0 {
        // Fresh database - create base schema then run all migrations
        create_schema_v1(conn)?;
        set_schema_version(conn, 1)?;
        migrate_schema(conn, 1)?;
    } else if current_version < SCHEMA_VERSION {
        migrate_schema(conn, current_version)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(StorageError::Backend(BackendError::MigrationError {
            message: format!(
                "database schema version {} is newer than supported version {}",
                current_version, SCHEMA_VERSION
            ),
        }));
    }

    tx.commit()
        .map_err(|e| migration_error("commit schema transaction", e))?;
    Ok(())
}

/// Get the current schema version, or `None` if the database has never
/// been initialized.
pub fn get_schema_version(conn: &Connection) -> StorageResult<Option<i32>> {
    let has_table: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
        [],
        |row| row.get(0),
    )?;
    if !has_table {
        return Ok(None);
    }

    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| migration_error("clear schema_version", e))?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )
    .map_err(|e| migration_error("set schema_version", e))?;
    Ok(())
}

/// Create the initial schema (version 1).
fn create_schema_v1(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS hospital (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            address TEXT NOT NULL,
            phone TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS specialization (
            name TEXT PRIMARY KEY,
            charges_per_day REAL
        );

        CREATE TABLE IF NOT EXISTS hospital_specialty (
            hospital_id INTEGER NOT NULL
                REFERENCES hospital (id) ON DELETE CASCADE ON UPDATE CASCADE,
            specialization TEXT NOT NULL
                REFERENCES specialization (name) ON DELETE CASCADE ON UPDATE CASCADE,
            PRIMARY KEY (hospital_id, specialization)
        );

        CREATE TABLE IF NOT EXISTS person (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            address TEXT NOT NULL,
            phone TEXT NOT NULL,
            date_of_birth TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS patient (
            id INTEGER PRIMARY KEY
                REFERENCES person (id) ON DELETE CASCADE ON UPDATE CASCADE,
            ssn INTEGER,
            gender TEXT,
            status TEXT NOT NULL DEFAULT 'PROCESSING'
                CHECK (status IN ('PROCESSING', 'IN_TREATMENT', 'TREATMENT_COMPLETE'))
        );

        CREATE TABLE IF NOT EXISTS staff (
            id INTEGER PRIMARY KEY
                REFERENCES person (id) ON DELETE CASCADE ON UPDATE CASCADE,
            hospital_id INTEGER NOT NULL
                REFERENCES hospital (id) ON DELETE CASCADE ON UPDATE CASCADE,
            department TEXT,
            job_title TEXT NOT NULL
                CHECK (job_title IN ('NURSE', 'DOCTOR', 'ADMINISTRATOR', 'BILLER')),
            professional_title TEXT,
            office_address TEXT,
            specialization TEXT
                REFERENCES specialization (name) ON DELETE SET NULL ON UPDATE CASCADE
        );

        CREATE TABLE IF NOT EXISTS bed (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hospital_id INTEGER NOT NULL
                REFERENCES hospital (id) ON DELETE CASCADE ON UPDATE CASCADE,
            specialization TEXT NOT NULL
                REFERENCES specialization (name) ON DELETE CASCADE ON UPDATE CASCADE,
            nurse_id INTEGER
                REFERENCES staff (id) ON DELETE SET NULL ON UPDATE CASCADE,
            occupied INTEGER NOT NULL DEFAULT 0 CHECK (occupied IN (0, 1))
        );

        CREATE TABLE IF NOT EXISTS hospital_visit (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hospital_id INTEGER NOT NULL
                REFERENCES hospital (id) ON DELETE CASCADE ON UPDATE CASCADE,
            patient_id INTEGER NOT NULL
                REFERENCES patient (id) ON DELETE CASCADE ON UPDATE CASCADE,
            start_date TEXT NOT NULL,
            end_date TEXT,
            diagnosis TEXT,
            bed_id INTEGER
                REFERENCES bed (id) ON DELETE SET NULL ON UPDATE CASCADE,
            registration_fee REAL,
            CHECK (end_date IS NULL OR end_date >= start_date)
        );

        CREATE TABLE IF NOT EXISTS responsible_staff (
            visit_id INTEGER NOT NULL
                REFERENCES hospital_visit (id) ON DELETE CASCADE ON UPDATE CASCADE,
            staff_id INTEGER NOT NULL
                REFERENCES staff (id) ON DELETE CASCADE ON UPDATE CASCADE,
            PRIMARY KEY (visit_id, staff_id)
        );

        CREATE TABLE IF NOT EXISTS medical_record (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            visit_id INTEGER NOT NULL
                REFERENCES hospital_visit (id) ON DELETE CASCADE ON UPDATE CASCADE,
            doctor_id INTEGER NOT NULL
                REFERENCES staff (id) ON DELETE CASCADE ON UPDATE CASCADE,
            prescription TEXT,
            diagnostic TEXT,
            test TEXT,
            result TEXT,
            treatment TEXT,
            consultation_fee REAL,
            test_fee REAL NOT NULL DEFAULT 0,
            treatment_fee REAL
        );

        CREATE TABLE IF NOT EXISTS billing (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_id INTEGER NOT NULL
                REFERENCES patient (id) ON DELETE CASCADE ON UPDATE CASCADE,
            payment_info TEXT
        );",
    )
    .map_err(|e| migration_error("create schema v1", e))?;

    debug!("created schema v1");
    Ok(())
}

/// Run migrations from `from_version` up to [`SCHEMA_VERSION`].
fn migrate_schema(conn: &Connection, from_version: i32) -> StorageResult<()> {
    let mut version = from_version;

    while version < SCHEMA_VERSION {
        match version {
            1 => migrate_v1_to_v2(conn)?,
            _ => {
                return Err(StorageError::Backend(BackendError::MigrationError {
                    message: format!("no migration path from schema version {}", version),
                }));
            }
        }
        version += 1;
        set_schema_version(conn, version)?;
        debug!(version, "applied schema migration");
    }

    Ok(())
}

/// Version 2: lookup indexes plus the unique open-visit-per-bed index.
///
/// `idx_visit_open_bed` makes it impossible for two open visits to reference
/// the same bed, whatever path the write took.
fn migrate_v1_to_v2(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_bed_lookup
            ON bed (hospital_id, specialization, occupied);

        CREATE INDEX IF NOT EXISTS idx_visit_open
            ON hospital_visit (patient_id, hospital_id)
            WHERE end_date IS NULL;

        CREATE UNIQUE INDEX IF NOT EXISTS idx_visit_open_bed
            ON hospital_visit (bed_id)
            WHERE end_date IS NULL AND bed_id IS NOT NULL;

        CREATE INDEX IF NOT EXISTS idx_visit_hospital_start
            ON hospital_visit (hospital_id, start_date);

        CREATE INDEX IF NOT EXISTS idx_staff_hospital
            ON staff (hospital_id);",
    )
    .map_err(|e| migration_error("migrate v1 to v2", e))?;
    Ok(())
}

/// Drop every table. Used by tests and `medbed init --reset`.
pub fn drop_all_tables(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS billing;
        DROP TABLE IF EXISTS medical_record;
        DROP TABLE IF EXISTS responsible_staff;
        DROP TABLE IF EXISTS hospital_visit;
        DROP TABLE IF EXISTS bed;
        DROP TABLE IF EXISTS staff;
        DROP TABLE IF EXISTS patient;
        DROP TABLE IF EXISTS person;
        DROP TABLE IF EXISTS hospital_specialty;
        DROP TABLE IF EXISTS specialization;
        DROP TABLE IF EXISTS hospital;
        DROP TABLE IF EXISTS schema_version;",
    )
    .map_err(|e| migration_error("drop tables", e))?;
    Ok(())
}
