//! Subcommands and their output.

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::Subcommand;
use medbed_allocation::{
    AllocationCoordinator, BedRegistry, CheckOutOutcome, ReleaseOutcome, ReserveOutcome,
    VisitLedger, reports,
};
use medbed_persistence::backends::sqlite::{SqliteBackend, schema};
use medbed_persistence::core::Record;
use medbed_persistence::models::{Hospital, JobTitle, Patient, PatientStatus, Staff};
use medbed_persistence::types::{
    BedId, BillingId, HospitalId, MedicalRecordId, PatientId, StaffId, VisitId,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::admin::{self, PersonArgs, PersonEdit, RecordDetails, StaffDetails};
use crate::config::CliConfig;
use crate::seed;

/// Available subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create or migrate the database schema.
    Init {
        /// Load demo hospitals, staff, beds and visits.
        #[arg(long)]
        seed: bool,
        /// Drop every table first.
        #[arg(long)]
        reset: bool,
    },
    /// Open a visit for a patient at a hospital.
    CheckIn {
        #[arg(long)]
        patient: PatientId,
        #[arg(long)]
        hospital: HospitalId,
        /// Visit start date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Close a patient's open visit at a hospital. The bed stays occupied.
    CheckOut {
        #[arg(long)]
        patient: PatientId,
        #[arg(long)]
        hospital: HospitalId,
        /// Visit end date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Assign a free bed of a specialization to a checked-in patient.
    ReserveBed {
        #[arg(long)]
        hospital: HospitalId,
        #[arg(long)]
        specialization: String,
        #[arg(long)]
        patient: PatientId,
    },
    /// Free a bed and detach it from its visit.
    ReleaseBed {
        #[arg(long)]
        bed: BedId,
    },
    /// Move a patient to another hospital.
    Transfer {
        #[arg(long)]
        patient: PatientId,
        #[arg(long)]
        from: HospitalId,
        #[arg(long)]
        to: HospitalId,
        /// Specialization wanted at the destination.
        #[arg(long)]
        specialization: String,
        /// Transfer date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Available and occupied beds per specialization in a hospital.
    Beds {
        #[arg(long)]
        hospital: HospitalId,
    },
    /// Bed usage per hospital.
    Usage,
    /// Report beds whose occupancy disagrees with their visits.
    Audit,
    /// Hospitals grouped by specialty.
    Specialties,
    /// Doctors currently seeing a patient.
    Doctors {
        #[arg(long)]
        patient: PatientId,
    },
    /// Visits per month at a hospital.
    Visits {
        #[arg(long)]
        hospital: HospitalId,
    },
    /// Fees billed to a patient for visits started between two dates.
    Billing {
        #[arg(long)]
        patient: PatientId,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Register a specialization that hospitals, beds and staff can use.
    AddSpecialization {
        #[arg(long)]
        name: String,
        #[arg(long)]
        charges_per_day: Option<f64>,
    },
    /// Register a hospital.
    AddHospital {
        #[arg(long)]
        address: String,
        #[arg(long)]
        phone: String,
        /// Specialization the hospital offers; repeat for several.
        #[arg(long = "specialty")]
        specialties: Vec<String>,
    },
    /// Change a hospital's details or the specializations it offers.
    EditHospital {
        #[arg(long)]
        hospital: HospitalId,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        add_specialty: Vec<String>,
        #[arg(long)]
        remove_specialty: Vec<String>,
    },
    /// Remove a hospital with its beds, staff and visits.
    DeleteHospital {
        #[arg(long)]
        hospital: HospitalId,
    },
    /// Register a patient.
    AddPatient {
        #[command(flatten)]
        person: PersonArgs,
        #[arg(long)]
        ssn: Option<i64>,
        #[arg(long)]
        gender: Option<String>,
    },
    /// Change a patient's details.
    EditPatient {
        #[arg(long)]
        patient: PatientId,
        #[command(flatten)]
        person: PersonEdit,
        #[arg(long)]
        ssn: Option<i64>,
        #[arg(long)]
        gender: Option<String>,
        /// PROCESSING, IN_TREATMENT or TREATMENT_COMPLETE.
        #[arg(long)]
        status: Option<PatientStatus>,
    },
    /// Remove a patient and their records, freeing any bed they hold.
    DeletePatient {
        #[arg(long)]
        patient: PatientId,
    },
    /// Register a staff member at a hospital.
    AddStaff {
        #[arg(long)]
        hospital: HospitalId,
        /// NURSE, DOCTOR, ADMINISTRATOR or BILLER.
        #[arg(long)]
        job_title: JobTitle,
        #[command(flatten)]
        person: PersonArgs,
        #[command(flatten)]
        details: StaffDetails,
    },
    /// Change a staff member's details.
    EditStaff {
        #[arg(long)]
        staff: StaffId,
        #[arg(long)]
        hospital: Option<HospitalId>,
        #[arg(long)]
        job_title: Option<JobTitle>,
        #[command(flatten)]
        person: PersonEdit,
        #[command(flatten)]
        details: StaffDetails,
    },
    /// Remove a staff member.
    DeleteStaff {
        #[arg(long)]
        staff: StaffId,
    },
    /// Add free beds of a specialization to a hospital.
    ProvisionBeds {
        #[arg(long)]
        hospital: HospitalId,
        #[arg(long)]
        specialization: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Nurse assigned to the new beds.
        #[arg(long)]
        nurse: Option<StaffId>,
    },
    /// Write a doctor's medical record against a visit.
    AddRecord {
        #[arg(long)]
        visit: VisitId,
        #[arg(long)]
        doctor: StaffId,
        #[command(flatten)]
        details: RecordDetails,
    },
    /// Change a medical record.
    EditRecord {
        #[arg(long)]
        record: MedicalRecordId,
        #[command(flatten)]
        details: RecordDetails,
    },
    /// Create, update or delete a billing account.
    BillingAccount {
        #[command(subcommand)]
        action: BillingAction,
    },
    /// A patient's details and open visits.
    ShowPatient {
        #[arg(long)]
        patient: PatientId,
    },
    /// A bed and the visit holding it.
    ShowBed {
        #[arg(long)]
        bed: BedId,
    },
}

/// Billing account actions.
#[derive(Debug, Clone, Subcommand)]
pub enum BillingAction {
    /// Open an account for a patient.
    Create {
        #[arg(long)]
        patient: PatientId,
        #[arg(long)]
        payment_info: Option<String>,
    },
    /// Replace an account's payment details.
    Update {
        #[arg(long)]
        account: BillingId,
        #[arg(long)]
        payment_info: Option<String>,
    },
    /// Close an account.
    Delete {
        #[arg(long)]
        account: BillingId,
    },
}

/// Opens the configured database, creating the pool.
fn open_backend(config: &CliConfig) -> Result<SqliteBackend> {
    info!(database = %config.database, "opening database");
    SqliteBackend::with_config(&config.database, config.backend_config())
        .with_context(|| format!("cannot open database '{}'", config.database))
}

/// Opens the database and checks that it has been initialized.
fn store(config: &CliConfig) -> Result<SqliteBackend> {
    let backend = open_backend(config)?;
    match backend.schema_version()? {
        Some(version) => debug!(version, "schema found"),
        None => bail!(
            "database '{}' is not initialized; run `medbed init` first",
            config.database
        ),
    }
    Ok(backend)
}

fn coordinator(config: &CliConfig) -> Result<AllocationCoordinator<SqliteBackend>> {
    Ok(AllocationCoordinator::with_policy(store(config)?, config.policy()))
}

fn today(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Local::now().date_naive())
}

/// Prints `value` as JSON, or as the text produced by `text`.
fn emit<T: Serialize>(config: &CliConfig, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
    if config.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text(value));
    }
    Ok(())
}

/// Runs one subcommand.
pub fn run(command: Command, config: &CliConfig) -> Result<()> {
    match command {
        Command::Init { seed, reset } => init(config, seed, reset),

        Command::CheckIn {
            patient,
            hospital,
            date,
        } => {
            let visit = coordinator(config)?.check_in(patient, hospital, today(date))?;
            emit(config, &visit, |v| {
                format!(
                    "Checked in patient {} at hospital {} (visit {}, fee {:.2})",
                    v.patient_id,
                    v.hospital_id,
                    v.id(),
                    v.registration_fee.unwrap_or_default()
                )
            })
        }

        Command::CheckOut {
            patient,
            hospital,
            date,
        } => {
            let outcome = coordinator(config)?.check_out(patient, hospital, today(date))?;
            emit(config, &outcome, check_out_text)
        }

        Command::ReserveBed {
            hospital,
            specialization,
            patient,
        } => {
            let outcome = coordinator(config)?.reserve_bed(hospital, &specialization, patient)?;
            emit(config, &outcome, |o| match o {
                ReserveOutcome::Reserved { bed_id, visit_id } => {
                    format!("Reserved bed #{} for visit {}", bed_id, visit_id)
                }
                ReserveOutcome::AlreadyAssigned { bed_id, .. } => {
                    format!("Patient {} is already assigned to bed #{}", patient, bed_id)
                }
            })
        }

        Command::ReleaseBed { bed } => {
            let outcome = coordinator(config)?.release_bed(bed)?;
            emit(config, &outcome, |o| match o {
                ReleaseOutcome::Released { bed_id, .. } => {
                    format!("Successfully released bed #{}", bed_id)
                }
                ReleaseOutcome::AlreadyFree { bed_id } => {
                    format!("Bed #{} is already unoccupied", bed_id)
                }
            })
        }

        Command::Transfer {
            patient,
            from,
            to,
            specialization,
            date,
        } => transfer(config, patient, from, to, &specialization, today(date)),

        Command::Beds { hospital } => {
            let rows = coordinator(config)?.read(|conn| reports::available_beds(conn, hospital))?;
            emit(config, &rows, |rows| {
                if rows.is_empty() {
                    return format!("No beds found for hospital {}", hospital);
                }
                let mut out = format!("{:<16}{:>10}{:>10}", "Specialization", "Available", "Occupied");
                for row in rows {
                    out.push_str(&format!(
                        "\n{:<16}{:>10}{:>10}",
                        row.specialization, row.free, row.occupied
                    ));
                }
                out
            })
        }

        Command::Usage => {
            let rows = coordinator(config)?.read(|conn| reports::hospital_usage(conn))?;
            emit(config, &rows, |rows| {
                let mut out = format!(
                    "{:<10}{:>10}{:>10}{:>10}",
                    "Hospital", "Available", "Occupied", "Usage %"
                );
                for row in rows {
                    out.push_str(&format!(
                        "\n{:<10}{:>10}{:>10}{:>10.1}",
                        row.hospital_id, row.free, row.occupied, row.usage_percent
                    ));
                }
                out
            })
        }

        Command::Audit => {
            let violations = coordinator(config)?.occupancy_violations()?;
            emit(config, &violations, |violations| {
                if violations.is_empty() {
                    return "No occupancy violations".to_string();
                }
                violations
                    .iter()
                    .map(|v| match (v.occupied, v.held_by_closed_visit) {
                        (true, Some(visit)) => format!(
                            "Bed #{} (hospital {}) is occupied but its visit {} is closed; release it",
                            v.bed_id, v.hospital_id, visit
                        ),
                        (true, None) => format!(
                            "Bed #{} (hospital {}) is occupied with {} open visits",
                            v.bed_id, v.hospital_id, v.open_visits
                        ),
                        (false, _) => format!(
                            "Bed #{} (hospital {}) is free but referenced by {} open visits",
                            v.bed_id, v.hospital_id, v.open_visits
                        ),
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }

        Command::Specialties => {
            let rows = coordinator(config)?.read(|conn| reports::hospitals_by_specialty(conn))?;
            emit(config, &rows, |rows| {
                let mut out = format!("{:<16}{:<10}{}", "Specialization", "Hospital", "Address");
                for row in rows {
                    out.push_str(&format!(
                        "\n{:<16}{:<10}{}",
                        row.specialization, row.hospital_id, row.address
                    ));
                }
                out
            })
        }

        Command::Doctors { patient } => {
            let rows = coordinator(config)?.read(|conn| reports::doctors_for_patient(conn, patient))?;
            emit(config, &rows, |rows| {
                if rows.is_empty() {
                    return format!("Patient {} is not currently seeing any doctors", patient);
                }
                let mut out = format!("Patient {} is currently seeing:", patient);
                for row in rows {
                    out.push_str(&format!("\n  {} (staff {})", row.name, row.staff_id));
                }
                out
            })
        }

        Command::Visits { hospital } => {
            let rows = coordinator(config)?.read(|conn| reports::visits_per_month(conn, hospital))?;
            emit(config, &rows, |rows| {
                if rows.is_empty() {
                    return format!("No visits found for hospital {}", hospital);
                }
                let mut out = format!("{:<10}{:<12}{:>8}", "Month", "", "Visits");
                for row in rows {
                    out.push_str(&format!(
                        "\n{:<10}{:<12}{:>8}",
                        row.month, row.month_name, row.visits
                    ));
                }
                out
            })
        }

        Command::Billing { patient, from, to } => {
            if to < from {
                bail!("billing range ends ({}) before it starts ({})", to, from);
            }
            let summary =
                coordinator(config)?.read(|conn| reports::billing_summary(conn, patient, from, to))?;
            emit(config, &summary, |s| {
                format!(
                    "Billing for patient {} ({} visits, {} to {})\n  Registration: {:>10.2}\n  Consultation: {:>10.2}\n  Tests:        {:>10.2}\n  Treatment:    {:>10.2}\n  Total:        {:>10.2}",
                    s.patient_id,
                    s.visits,
                    from,
                    to,
                    s.registration_fees,
                    s.consultation_fees,
                    s.test_fees,
                    s.treatment_fees,
                    s.total()
                )
            })
        }

        Command::AddSpecialization {
            name,
            charges_per_day,
        } => {
            let specialization = admin::add_specialization(&store(config)?, &name, charges_per_day)?;
            emit(config, &specialization, |s| format!("Added specialization {}", s.name))
        }

        Command::AddHospital {
            address,
            phone,
            specialties,
        } => {
            let hospital =
                admin::add_hospital(&store(config)?, Hospital::new(address, phone), &specialties)?;
            emit(config, &hospital, |h| format!("Added hospital {} at {}", h.id(), h.address))
        }

        Command::EditHospital {
            hospital,
            address,
            phone,
            add_specialty,
            remove_specialty,
        } => {
            let hospital = admin::edit_hospital(
                &store(config)?,
                hospital,
                address,
                phone,
                &add_specialty,
                &remove_specialty,
            )?;
            emit(config, &hospital, |h| format!("Updated hospital {}", h.id()))
        }

        Command::DeleteHospital { hospital } => {
            admin::delete_hospital(&store(config)?, hospital)?;
            emit(config, &json!({ "deleted": "hospital", "id": hospital }), |_| {
                format!("Deleted hospital {}", hospital)
            })
        }

        Command::AddPatient { person, ssn, gender } => {
            let patient = admin::add_patient(&store(config)?, Patient::new(person.into(), ssn, gender))?;
            emit(config, &patient, |p| {
                format!("Added patient {} ({})", p.id(), p.person.name)
            })
        }

        Command::EditPatient {
            patient,
            person,
            ssn,
            gender,
            status,
        } => {
            let patient = admin::edit_patient(&store(config)?, patient, |p| {
                person.apply(&mut p.person);
                if ssn.is_some() {
                    p.ssn = ssn;
                }
                if gender.is_some() {
                    p.gender = gender;
                }
                if let Some(status) = status {
                    p.status = status;
                }
            })?;
            emit(config, &patient, |p| {
                format!("Updated patient {} ({}, {})", p.id(), p.person.name, p.status)
            })
        }

        Command::DeletePatient { patient } => {
            let freed = admin::delete_patient(&store(config)?, patient)?;
            emit(
                config,
                &json!({ "deleted": "patient", "id": patient, "freed_beds": freed }),
                |_| {
                    let mut out = format!("Deleted patient {}", patient);
                    for bed in &freed {
                        out.push_str(&format!("\nReleased bed #{}", bed));
                    }
                    out
                },
            )
        }

        Command::AddStaff {
            hospital,
            job_title,
            person,
            details,
        } => {
            let mut staff = Staff::new(person.into(), hospital, job_title);
            details.apply(&mut staff);
            let staff = admin::add_staff(&store(config)?, staff)?;
            emit(config, &staff, |s| {
                format!(
                    "Added {} {} ({}) at hospital {}",
                    s.job_title, s.id(), s.person.name, s.hospital_id
                )
            })
        }

        Command::EditStaff {
            staff,
            hospital,
            job_title,
            person,
            details,
        } => {
            let staff = admin::edit_staff(&store(config)?, staff, |s| {
                if let Some(hospital) = hospital {
                    s.hospital_id = hospital;
                }
                if let Some(job_title) = job_title {
                    s.job_title = job_title;
                }
                person.apply(&mut s.person);
                details.apply(s);
            })?;
            emit(config, &staff, |s| format!("Updated staff member {}", s.id()))
        }

        Command::DeleteStaff { staff } => {
            admin::delete_staff(&store(config)?, staff)?;
            emit(config, &json!({ "deleted": "staff", "id": staff }), |_| {
                format!("Deleted staff member {}", staff)
            })
        }

        Command::ProvisionBeds {
            hospital,
            specialization,
            count,
            nurse,
        } => {
            let beds = admin::provision_beds(&store(config)?, hospital, &specialization, count, nurse)?;
            emit(config, &beds, |beds| {
                let ids = beds.iter().map(ToString::to_string).collect::<Vec<_>>();
                format!(
                    "Added {} {} beds to hospital {}: {}",
                    beds.len(),
                    specialization,
                    hospital,
                    ids.join(", ")
                )
            })
        }

        Command::AddRecord {
            visit,
            doctor,
            details,
        } => {
            let record = admin::add_record(&store(config)?, visit, doctor, details)?;
            emit(config, &record, |r| {
                format!(
                    "Added medical record {} to visit {} (fees {:.2})",
                    r.id(),
                    r.visit_id,
                    r.total_fees()
                )
            })
        }

        Command::EditRecord { record, details } => {
            let record = admin::edit_record(&store(config)?, record, details)?;
            emit(config, &record, |r| {
                format!("Updated medical record {} (fees {:.2})", r.id(), r.total_fees())
            })
        }

        Command::BillingAccount { action } => billing_account(config, action),

        Command::ShowPatient { patient } => show_patient(config, patient),

        Command::ShowBed { bed } => show_bed(config, bed),
    }
}

fn init(config: &CliConfig, seed: bool, reset: bool) -> Result<()> {
    let backend = open_backend(config)?;
    if reset {
        let conn = backend.get_connection()?;
        schema::drop_all_tables(&conn)?;
        info!("dropped all tables");
    }
    backend.init_schema()?;

    let summary = if seed {
        if has_hospitals(&backend)? {
            bail!("database already holds data; use `medbed init --reset --seed` to start over");
        }
        Some(seed::seed(&backend)?)
    } else {
        None
    };

    let version = backend.schema_version()?;
    emit(
        config,
        &json!({ "schema_version": version, "seed": summary }),
        |_| match &summary {
            Some(s) => format!(
                "Initialized '{}' and loaded {} hospitals, {} patients, {} staff, {} beds, {} visits",
                config.database,
                s.hospitals.len(),
                s.patients,
                s.staff,
                s.beds,
                s.visits
            ),
            None => format!("Initialized '{}'", config.database),
        },
    )
}

fn has_hospitals(backend: &SqliteBackend) -> Result<bool> {
    let conn = backend.get_connection()?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM hospital", [], |row| row.get(0))?;
    Ok(count > 0)
}

fn billing_account(config: &CliConfig, action: BillingAction) -> Result<()> {
    let store = store(config)?;
    match action {
        BillingAction::Create {
            patient,
            payment_info,
        } => {
            let account = admin::create_billing_account(&store, patient, payment_info)?;
            emit(config, &account, |a| {
                format!("Created billing account {} for patient {}", a.id(), a.patient_id)
            })
        }
        BillingAction::Update {
            account,
            payment_info,
        } => {
            let account = admin::update_billing_account(&store, account, payment_info)?;
            emit(config, &account, |a| format!("Updated billing account {}", a.id()))
        }
        BillingAction::Delete { account } => {
            admin::delete_billing_account(&store, account)?;
            emit(config, &json!({ "deleted": "billing_account", "id": account }), |_| {
                format!("Deleted billing account {}", account)
            })
        }
    }
}

fn show_patient(config: &CliConfig, patient_id: PatientId) -> Result<()> {
    let (patient, visits) = coordinator(config)?.read(|conn| {
        let patient = Patient::get(conn, patient_id)?;
        let visits = VisitLedger::new(conn).open_visits_for_patient(patient_id)?;
        Ok((patient, visits))
    })?;
    let now = today(None);
    let open_visits = visits
        .iter()
        .map(|v| json!({ "visit": v, "days": v.days(now) }))
        .collect::<Vec<_>>();

    emit(
        config,
        &json!({ "patient": patient, "open_visits": open_visits }),
        |_| {
            let mut out = format!(
                "Patient {}: {} ({}), born {}, phone {}",
                patient.id(),
                patient.person.name,
                patient.status,
                patient.person.date_of_birth,
                patient.person.phone
            );
            if visits.is_empty() {
                out.push_str("\nNo open visits");
            }
            for visit in &visits {
                let bed = visit
                    .bed_id
                    .map_or_else(|| "no bed".to_string(), |bed| format!("bed #{}", bed));
                out.push_str(&format!(
                    "\n  Visit {} at hospital {} since {} (day {}, {})",
                    visit.id(),
                    visit.hospital_id,
                    visit.start_date,
                    visit.days(now),
                    bed
                ));
            }
            out
        },
    )
}

fn show_bed(config: &CliConfig, bed_id: BedId) -> Result<()> {
    let (bed, holder) = coordinator(config)?.read(|conn| {
        let bed = BedRegistry::new(conn).get_by_id(bed_id)?;
        let holder = VisitLedger::new(conn).visit_pointing_at(bed_id)?;
        Ok((bed, holder))
    })?;

    emit(config, &json!({ "bed": bed, "visit": holder }), |_| {
        let head = format!(
            "Bed #{} at hospital {} ({})",
            bed.id(),
            bed.hospital_id,
            bed.specialization
        );
        match (&holder, bed.occupied) {
            (Some(visit), _) => format!(
                "{}: held by visit {} of patient {} since {}",
                head,
                visit.id(),
                visit.patient_id,
                visit.start_date
            ),
            (None, true) => format!(
                "{}: occupied but no open visit holds it; run `medbed audit`",
                head
            ),
            (None, false) => format!("{}: free", head),
        }
    })
}

fn check_out_text(outcome: &CheckOutOutcome) -> String {
    let mut out = format!("Closed visit {} on {}", outcome.visit_id, outcome.end_date);
    if let Some(bed) = outcome.retained_bed {
        out.push_str(&format!(
            "\nBed #{} is still occupied; free it with `medbed release-bed --bed {}`",
            bed, bed
        ));
    }
    out
}

fn transfer(
    config: &CliConfig,
    patient: PatientId,
    from: HospitalId,
    to: HospitalId,
    specialization: &str,
    date: NaiveDate,
) -> Result<()> {
    let result = coordinator(config)?.transfer_patient(patient, from, to, specialization, date);

    let outcome = match result.primary {
        Ok(outcome) => outcome,
        Err(err) => return Err(err).context("transfer failed; nothing was changed"),
    };

    let release = match &result.bed_release {
        None => json!(null),
        Some(Ok(released)) => json!({ "ok": released }),
        Some(Err(err)) => json!({ "error": err.kind(), "message": err.to_string() }),
    };

    emit(
        config,
        &json!({ "transfer": outcome, "bed_release": release }),
        |_| {
            let mut out = format!(
                "Transferred patient {} from hospital {} to {} (visit {} closed, visit {} opened)",
                patient,
                from,
                to,
                outcome.closed_visit,
                outcome.new_visit.id()
            );
            match (&result.bed_release, outcome.previous_bed) {
                (Some(Ok(_)), Some(bed)) => out.push_str(&format!("\nReleased bed #{}", bed)),
                (Some(Err(err)), Some(bed)) => out.push_str(&format!(
                    "\nWarning: bed #{} could not be released ({}); release it with `medbed release-bed --bed {}`",
                    bed, err, bed
                )),
                _ => {}
            }
            out.push_str(&format!(
                "\nReserve a {} bed with `medbed reserve-bed --hospital {} --specialization {} --patient {}`",
                outcome.new_specialization, to, outcome.new_specialization, patient
            ));
            out
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[test]
    fn test_check_out_text_mentions_retained_bed() {
        let text = check_out_text(&CheckOutOutcome {
            visit_id: 4.into(),
            end_date: date(2),
            retained_bed: Some(7.into()),
        });
        assert!(text.contains("Closed visit 4 on 2024-06-02"));
        assert!(text.contains("release-bed --bed 7"));

        let text = check_out_text(&CheckOutOutcome {
            visit_id: 4.into(),
            end_date: date(2),
            retained_bed: None,
        });
        assert!(!text.contains("still occupied"));
    }

    #[test]
    fn test_today_prefers_explicit_date() {
        assert_eq!(today(Some(date(9))), date(9));
    }

    fn file_config(dir: &tempfile::TempDir) -> CliConfig {
        CliConfig {
            database: dir.path().join("medbed.db").display().to_string(),
            ..CliConfig::for_testing()
        }
    }

    fn person(name: &str) -> PersonArgs {
        PersonArgs {
            name: name.to_string(),
            address: "4 Oak Ave".to_string(),
            phone: "5550102030".to_string(),
            born: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        }
    }

    #[test]
    fn test_registered_entities_support_check_in() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = file_config(&dir);

        let commands = vec![
            Command::Init {
                seed: false,
                reset: false,
            },
            Command::AddSpecialization {
                name: "neurology".to_string(),
                charges_per_day: Some(10.0),
            },
            Command::AddHospital {
                address: "1 Main St".to_string(),
                phone: "5550001111".to_string(),
                specialties: vec!["neurology".to_string()],
            },
            Command::AddPatient {
                person: person("Ann"),
                ssn: None,
                gender: None,
            },
            Command::AddStaff {
                hospital: 1.into(),
                job_title: JobTitle::Nurse,
                person: person("Joy"),
                details: StaffDetails::default(),
            },
            Command::ProvisionBeds {
                hospital: 1.into(),
                specialization: "neurology".to_string(),
                count: 2,
                nurse: Some(2.into()),
            },
            Command::CheckIn {
                patient: 1.into(),
                hospital: 1.into(),
                date: Some(date(1)),
            },
            Command::ReserveBed {
                hospital: 1.into(),
                specialization: "neurology".to_string(),
                patient: 1.into(),
            },
            Command::BillingAccount {
                action: BillingAction::Create {
                    patient: 1.into(),
                    payment_info: Some("VISA 4242".to_string()),
                },
            },
            Command::ShowPatient { patient: 1.into() },
            Command::ShowBed { bed: 1.into() },
        ];
        for command in commands {
            run(command.clone(), &config).unwrap_or_else(|e| panic!("{:?} failed: {:#}", command, e));
        }

        let coordinator = coordinator(&config).unwrap();
        let usage = coordinator.read(|conn| reports::hospital_usage(conn)).unwrap();
        assert_eq!((usage[0].free, usage[0].occupied), (1, 1));
        assert!(coordinator.occupancy_violations().unwrap().is_empty());
    }

    #[test]
    fn test_delete_patient_command_frees_bed() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = file_config(&dir);
        for command in [
            Command::Init {
                seed: true,
                reset: false,
            },
            Command::DeletePatient { patient: 1.into() },
        ] {
            run(command, &config).unwrap();
        }

        let coordinator = coordinator(&config).unwrap();
        assert!(coordinator.occupancy_violations().unwrap().is_empty());
        let err = run(Command::ShowPatient { patient: 1.into() }, &config).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_uninitialized_database_is_rejected() {
        let err = coordinator(&CliConfig::for_testing())
            .err()
            .expect("fresh database has no schema");
        assert!(err.to_string().contains("not initialized"));
    }
}
