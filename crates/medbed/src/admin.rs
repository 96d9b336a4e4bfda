//! Registration, edits and removal of hospitals, people, beds, medical
//! records and billing accounts.
//!
//! Every function runs in its own write transaction.

use anyhow::{Context, Result, bail, ensure};
use chrono::NaiveDate;
use clap::Args;
use medbed_allocation::{BedRegistry, VisitLedger};
use medbed_persistence::core::{Record, TransactionOptions, TransactionProvider};
use medbed_persistence::models::{
    Billing, Hospital, HospitalSpecialty, HospitalVisit, JobTitle, MedicalRecord, Patient, Person,
    Specialization, Staff,
};
use medbed_persistence::types::{BedId, BillingId, HospitalId, MedicalRecordId, PatientId, StaffId, VisitId};
use medbed_persistence::Stored;
use rusqlite::Connection;
use tracing::info;

/// Personal details of a new patient or staff member.
#[derive(Debug, Clone, Args)]
pub struct PersonArgs {
    /// Full name.
    #[arg(long)]
    pub name: String,
    /// Home address.
    #[arg(long)]
    pub address: String,
    /// Contact phone number.
    #[arg(long)]
    pub phone: String,
    /// Date of birth (YYYY-MM-DD).
    #[arg(long)]
    pub born: NaiveDate,
}

impl From<PersonArgs> for Person {
    fn from(args: PersonArgs) -> Self {
        Person::new(args.name, args.address, args.phone, args.born)
    }
}

/// Personal details to change; unset options are left alone.
#[derive(Debug, Clone, Default, Args)]
pub struct PersonEdit {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    /// Date of birth (YYYY-MM-DD).
    #[arg(long)]
    pub born: Option<NaiveDate>,
}

impl PersonEdit {
    pub(crate) fn apply(self, person: &mut Person) {
        if let Some(name) = self.name {
            person.name = name;
        }
        if let Some(address) = self.address {
            person.address = address;
        }
        if let Some(phone) = self.phone {
            person.phone = phone;
        }
        if let Some(born) = self.born {
            person.date_of_birth = born;
        }
    }
}

/// Optional staff details.
#[derive(Debug, Clone, Default, Args)]
pub struct StaffDetails {
    #[arg(long)]
    pub department: Option<String>,
    /// Professional title, e.g. `Senior Nurse`.
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub office: Option<String>,
    /// Specialization name; must already exist.
    #[arg(long)]
    pub specialization: Option<String>,
}

impl StaffDetails {
    pub(crate) fn apply(self, staff: &mut Staff) {
        if let Some(department) = self.department {
            staff.department = Some(department);
        }
        if let Some(title) = self.title {
            staff.professional_title = Some(title);
        }
        if let Some(office) = self.office {
            staff.office_address = Some(office);
        }
        if let Some(specialization) = self.specialization {
            staff.specialization = Some(specialization);
        }
    }
}

/// Medical record fields; unset options are left alone.
#[derive(Debug, Clone, Default, Args)]
pub struct RecordDetails {
    #[arg(long)]
    pub prescription: Option<String>,
    #[arg(long)]
    pub diagnostic: Option<String>,
    #[arg(long)]
    pub test: Option<String>,
    #[arg(long)]
    pub result: Option<String>,
    #[arg(long)]
    pub treatment: Option<String>,
    #[arg(long)]
    pub consultation_fee: Option<f64>,
    #[arg(long)]
    pub test_fee: Option<f64>,
    #[arg(long)]
    pub treatment_fee: Option<f64>,
}

impl RecordDetails {
    pub(crate) fn apply(self, record: &mut MedicalRecord) -> Result<()> {
        for (name, fee) in [
            ("consultation", self.consultation_fee),
            ("test", self.test_fee),
            ("treatment", self.treatment_fee),
        ] {
            if let Some(fee) = fee {
                ensure!(
                    fee.is_finite() && fee >= 0.0,
                    "{} fee must be a non-negative amount, got {}",
                    name,
                    fee
                );
            }
        }

        if self.prescription.is_some() {
            record.prescription = self.prescription;
        }
        if self.diagnostic.is_some() {
            record.diagnostic = self.diagnostic;
        }
        if self.test.is_some() {
            record.test = self.test;
        }
        if self.result.is_some() {
            record.result = self.result;
        }
        if self.treatment.is_some() {
            record.treatment = self.treatment;
        }
        if self.consultation_fee.is_some() {
            record.consultation_fee = self.consultation_fee;
        }
        if let Some(fee) = self.test_fee {
            record.test_fee = fee;
        }
        if self.treatment_fee.is_some() {
            record.treatment_fee = self.treatment_fee;
        }
        Ok(())
    }
}

fn write<P, T>(store: &P, f: impl FnOnce(&P::Transaction) -> Result<T>) -> Result<T>
where
    P: TransactionProvider,
{
    store.with_transaction(TransactionOptions::default(), f)
}

/// Loads a record, lets `f` change it and writes it back.
fn edit<P, R>(store: &P, id: R::Id, f: impl FnOnce(&mut R) -> Result<()>) -> Result<Stored<R>>
where
    P: TransactionProvider,
    R: Record,
{
    write(store, |tx| -> Result<Stored<R>> {
        let mut stored = R::get(tx, id)?;
        f(stored.record_mut())?;
        R::update(&stored, tx)?;
        info!(entity = R::ENTITY, id = %id, "updated record");
        Ok(stored)
    })
}

fn delete<P, R>(store: &P, id: R::Id) -> Result<()>
where
    P: TransactionProvider,
    R: Record,
{
    write(store, |tx| -> Result<()> {
        R::delete(tx, id)?;
        info!(entity = R::ENTITY, id = %id, "deleted record");
        Ok(())
    })
}

fn link_specialties(conn: &Connection, hospital_id: HospitalId, names: &[String]) -> Result<()> {
    for name in names {
        Specialization::get(conn, name)?;
        HospitalSpecialty::new(hospital_id, name.as_str()).insert(conn)?;
    }
    Ok(())
}

/// Registers a specialization that beds and staff can refer to.
pub fn add_specialization<P: TransactionProvider>(
    store: &P,
    name: &str,
    charges_per_day: Option<f64>,
) -> Result<Specialization> {
    let name = name.trim();
    ensure!(!name.is_empty(), "specialization name cannot be empty");
    if let Some(charge) = charges_per_day {
        ensure!(
            charge.is_finite() && charge >= 0.0,
            "daily charge must be a non-negative amount, got {}",
            charge
        );
    }
    write(store, |tx| -> Result<Specialization> {
        let specialization = Specialization::new(name, charges_per_day);
        specialization.insert(tx)?;
        info!(specialization = %name, "added specialization");
        Ok(specialization)
    })
}

/// Registers a hospital offering the named specializations.
pub fn add_hospital<P: TransactionProvider>(
    store: &P,
    hospital: Hospital,
    specialties: &[String],
) -> Result<Stored<Hospital>> {
    write(store, |tx| -> Result<Stored<Hospital>> {
        let hospital = hospital.insert(tx)?;
        link_specialties(tx, hospital.id(), specialties)?;
        info!(hospital_id = %hospital.id(), "added hospital");
        Ok(hospital)
    })
}

/// Changes a hospital's contact details and the specializations it offers.
pub fn edit_hospital<P: TransactionProvider>(
    store: &P,
    hospital_id: HospitalId,
    address: Option<String>,
    phone: Option<String>,
    add_specialties: &[String],
    remove_specialties: &[String],
) -> Result<Stored<Hospital>> {
    write(store, |tx| -> Result<Stored<Hospital>> {
        let mut hospital = Hospital::get(tx, hospital_id)?;
        if let Some(address) = address {
            hospital.record_mut().address = address;
        }
        if let Some(phone) = phone {
            hospital.record_mut().phone = phone;
        }
        Hospital::update(&hospital, tx)?;
        link_specialties(tx, hospital_id, add_specialties)?;
        for name in remove_specialties {
            HospitalSpecialty::new(hospital_id, name.as_str()).delete(tx)?;
        }
        info!(hospital_id = %hospital_id, "updated hospital");
        Ok(hospital)
    })
}

/// Removes a hospital together with its beds, staff and visits.
pub fn delete_hospital<P: TransactionProvider>(store: &P, hospital_id: HospitalId) -> Result<()> {
    delete::<P, Hospital>(store, hospital_id)
}

/// Registers a patient.
pub fn add_patient<P: TransactionProvider>(store: &P, patient: Patient) -> Result<Stored<Patient>> {
    write(store, |tx| -> Result<Stored<Patient>> {
        let patient = patient.insert(tx)?;
        info!(patient_id = %patient.id(), "added patient");
        Ok(patient)
    })
}

/// Changes a patient's details.
pub fn edit_patient<P: TransactionProvider>(
    store: &P,
    patient_id: PatientId,
    f: impl FnOnce(&mut Patient),
) -> Result<Stored<Patient>> {
    edit(store, patient_id, |patient: &mut Patient| {
        f(patient);
        Ok(())
    })
}

/// Removes a patient with their visits, medical records and billing
/// accounts. Beds held by the patient's open visits are freed first.
pub fn delete_patient<P: TransactionProvider>(store: &P, patient_id: PatientId) -> Result<Vec<BedId>> {
    write(store, |tx| -> Result<Vec<BedId>> {
        Patient::get(tx, patient_id)?;
        let registry = BedRegistry::new(tx);
        let mut freed = Vec::new();
        for visit in VisitLedger::new(tx).open_visits_for_patient(patient_id)? {
            if let Some(bed_id) = visit.bed_id {
                if registry.mark_free(bed_id)? {
                    freed.push(bed_id);
                }
            }
        }
        Patient::delete(tx, patient_id)?;
        info!(patient_id = %patient_id, freed_beds = freed.len(), "deleted patient");
        Ok(freed)
    })
}

/// Registers a staff member at a hospital.
pub fn add_staff<P: TransactionProvider>(store: &P, staff: Staff) -> Result<Stored<Staff>> {
    write(store, |tx| -> Result<Stored<Staff>> {
        Hospital::get(tx, staff.hospital_id)?;
        if let Some(name) = &staff.specialization {
            Specialization::get(tx, name)?;
        }
        let staff = staff.insert(tx)?;
        info!(staff_id = %staff.id(), hospital_id = %staff.hospital_id, "added staff member");
        Ok(staff)
    })
}

/// Changes a staff member's details.
pub fn edit_staff<P: TransactionProvider>(
    store: &P,
    staff_id: StaffId,
    f: impl FnOnce(&mut Staff),
) -> Result<Stored<Staff>> {
    write(store, |tx| -> Result<Stored<Staff>> {
        let mut staff = Staff::get(tx, staff_id)?;
        f(staff.record_mut());
        Hospital::get(tx, staff.hospital_id)?;
        if let Some(name) = &staff.specialization {
            Specialization::get(tx, name)?;
        }
        Staff::update(&staff, tx)?;
        info!(staff_id = %staff_id, "updated staff member");
        Ok(staff)
    })
}

/// Removes a staff member. Their beds lose the nurse and their medical
/// records are deleted.
pub fn delete_staff<P: TransactionProvider>(store: &P, staff_id: StaffId) -> Result<()> {
    delete::<P, Staff>(store, staff_id)
}

/// Adds `count` free beds of a specialization the hospital offers.
pub fn provision_beds<P: TransactionProvider>(
    store: &P,
    hospital_id: HospitalId,
    specialization: &str,
    count: u32,
    nurse_id: Option<StaffId>,
) -> Result<Vec<BedId>> {
    ensure!(count > 0, "bed count must be at least 1");
    write(store, |tx| -> Result<Vec<BedId>> {
        Hospital::get(tx, hospital_id)?;
        Specialization::get(tx, specialization)?;
        if !HospitalSpecialty::for_hospital(tx, hospital_id)?
            .iter()
            .any(|name| name == specialization)
        {
            bail!(
                "hospital {} does not offer {}; add it with `medbed edit-hospital --hospital {} --add-specialty {}`",
                hospital_id,
                specialization,
                hospital_id,
                specialization
            );
        }
        if let Some(nurse_id) = nurse_id {
            let nurse = Staff::get(tx, nurse_id)?;
            ensure!(
                nurse.job_title == JobTitle::Nurse,
                "staff member {} is a {}, not a nurse",
                nurse_id,
                nurse.job_title
            );
        }
        let beds = BedRegistry::new(tx).provision(hospital_id, specialization, nurse_id, count)?;
        info!(hospital_id = %hospital_id, specialization, count, "provisioned beds");
        Ok(beds)
    })
}

/// Writes a doctor's medical record against a visit.
pub fn add_record<P: TransactionProvider>(
    store: &P,
    visit_id: VisitId,
    doctor_id: StaffId,
    details: RecordDetails,
) -> Result<Stored<MedicalRecord>> {
    write(store, |tx| -> Result<Stored<MedicalRecord>> {
        HospitalVisit::get(tx, visit_id)?;
        let doctor = Staff::get(tx, doctor_id)?;
        ensure!(
            doctor.job_title == JobTitle::Doctor,
            "staff member {} is a {}, not a doctor",
            doctor_id,
            doctor.job_title
        );
        let mut record = MedicalRecord::new(visit_id, doctor_id);
        details.apply(&mut record)?;
        let record = record.insert(tx)?;
        info!(record_id = %record.id(), visit_id = %visit_id, "added medical record");
        Ok(record)
    })
}

/// Changes a medical record.
pub fn edit_record<P: TransactionProvider>(
    store: &P,
    record_id: MedicalRecordId,
    details: RecordDetails,
) -> Result<Stored<MedicalRecord>> {
    edit(store, record_id, |record: &mut MedicalRecord| details.apply(record))
}

/// Opens a billing account for a patient.
pub fn create_billing_account<P: TransactionProvider>(
    store: &P,
    patient_id: PatientId,
    payment_info: Option<String>,
) -> Result<Stored<Billing>> {
    write(store, |tx| -> Result<Stored<Billing>> {
        Patient::get(tx, patient_id)?;
        let account = Billing {
            patient_id,
            payment_info,
        }
        .insert(tx)?;
        info!(billing_id = %account.id(), patient_id = %patient_id, "created billing account");
        Ok(account)
    })
}

/// Replaces a billing account's payment details.
pub fn update_billing_account<P: TransactionProvider>(
    store: &P,
    billing_id: BillingId,
    payment_info: Option<String>,
) -> Result<Stored<Billing>> {
    edit(store, billing_id, |account: &mut Billing| {
        account.payment_info = payment_info;
        Ok(())
    })
}

/// Closes a billing account.
pub fn delete_billing_account<P: TransactionProvider>(store: &P, billing_id: BillingId) -> Result<()> {
    delete::<P, Billing>(store, billing_id)
        .with_context(|| format!("cannot delete billing account {}", billing_id))
}
