//! Patient lifecycle hooks.
//!
//! `before_insert` attaches an MRN to a record that has none; `validate`
//! rejects a record whose MRN is held by someone else. `insert_patient` and
//! `save_patient` run them in order inside one write transaction, so any
//! failure aborts the whole write, sequence increment included.

use tracing::{info, warn};

use super::MrnAllocator;
use crate::error::{MrnError, MrnResult};
use crate::models::{normalize_mrn, Mrn, PatientRecord};

/// Insert/save driver for patient records carrying an MRN.
pub struct PatientHooks<'a> {
    allocator: MrnAllocator<'a>,
}

impl<'a> PatientHooks<'a> {
    pub fn new(allocator: MrnAllocator<'a>) -> Self {
        Self { allocator }
    }

    pub fn allocator(&self) -> &MrnAllocator<'a> {
        &self.allocator
    }

    /// Pre-insert hook: allocate an MRN unless the record already carries one.
    ///
    /// A preset MRN (migrated or typed in) is normalized and kept; it is only
    /// checked for uniqueness by [`validate`](Self::validate).
    pub fn before_insert(&self, record: &mut PatientRecord) -> MrnResult<()> {
        if let Some(preset) = record.mrn().map(normalize_mrn) {
            if Mrn::parse(&preset).is_err() {
                warn!(
                    patient_id = %record.patient_id,
                    mrn = %preset,
                    "preset MRN does not match YYYY-PREFIX-NNNNN"
                );
            }
            if let Some(facility_id) = record.facility_id.as_deref() {
                self.allocator.registry().resolve_facility(Some(facility_id))?;
            }
            record.mrn = Some(preset);
            return Ok(());
        }

        let allocation = self.allocator.allocate_for(record.facility_id.as_deref())?;
        record.facility_id = Some(allocation.facility_id);
        record.mrn = Some(allocation.mrn.to_string());
        Ok(())
    }

    /// Validate-on-save hook.
    pub fn validate(&self, record: &PatientRecord) -> MrnResult<()> {
        match record.mrn() {
            Some(mrn) => self.allocator.validate_uniqueness(mrn, &record.patient_id),
            None => Ok(()),
        }
    }

    /// Persist a new patient: allocate, validate, insert, commit.
    pub fn insert_patient(&self, mut record: PatientRecord) -> MrnResult<PatientRecord> {
        let db = self.allocator.db();

        db.write_transaction(|| {
            if db.get_patient(&record.patient_id)?.is_some() {
                return Err(MrnError::Validation(format!(
                    "Patient '{}' already exists",
                    record.patient_id
                )));
            }

            self.before_insert(&mut record)?;
            self.validate(&record)?;
            db.insert_patient(&record)?;
            Ok(())
        })?;

        info!(
            patient_id = %record.patient_id,
            mrn = record.mrn.as_deref().unwrap_or(""),
            "registered patient"
        );
        Ok(record)
    }

    /// Persist changes to an existing patient.
    ///
    /// The MRN may be attached once to a record that has none; after that it
    /// cannot change or be removed.
    pub fn save_patient(&self, record: &PatientRecord) -> MrnResult<()> {
        let db = self.allocator.db();

        db.write_transaction(|| {
            let stored = db.get_patient(&record.patient_id)?.ok_or_else(|| {
                MrnError::NotFound(format!("Patient '{}' not found", record.patient_id))
            })?;

            let stored_mrn = stored.mrn().map(normalize_mrn);
            let incoming_mrn = record.mrn().map(normalize_mrn);

            match (stored_mrn, incoming_mrn) {
                (Some(old), Some(new)) if old != new => {
                    return Err(MrnError::Validation(format!(
                        "MRN of patient '{}' is immutable ({} cannot become {})",
                        record.patient_id, old, new
                    )));
                }
                (Some(old), None) => {
                    return Err(MrnError::Validation(format!(
                        "MRN {} of patient '{}' cannot be removed",
                        old, record.patient_id
                    )));
                }
                (None, Some(new)) => {
                    self.allocator.validate_uniqueness(&new, &record.patient_id)?;
                    db.assign_patient_mrn(&record.patient_id, &new)?;
                }
                _ => {}
            }

            self.validate(record)?;
            db.update_patient(record)?;
            Ok(())
        })
    }
}
