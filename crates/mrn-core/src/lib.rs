//! MRN Core Library
//!
//! Medical Record Number allocation for multi-facility hospital deployments.
//!
//! # Architecture
//!
//! ```text
//! Patient registration (host app)
//!             │
//!             ▼
//!   ┌───────────────────────┐
//!   │  before_insert hook   │
//!   │  ┌─────────────────┐  │
//!   │  │ Facility lookup │──┼──► prefix  (KRB)
//!   │  └─────────────────┘  │
//!   │  ┌─────────────────┐  │
//!   │  │ Sequence store  │──┼──► next value for (KRB, 2025), under write lock
//!   │  └─────────────────┘  │
//!   │  format YYYY-PREFIX-NNNNN
//!   └───────────┬───────────┘
//!               ▼
//!   ┌───────────────────────┐
//!   │  validate hook        │  reject MRNs held by another record
//!   └───────────┬───────────┘
//!               ▼
//!        insert + commit   (any failure rolls the increment back)
//! ```
//!
//! # Core Principle
//!
//! **An MRN is issued once and never reused.** Counters only move forward,
//! and a failed registration never consumes a number.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer
//! - [`models`]: Domain types (Facility, FacilityCode, Mrn, PatientRecord, SequenceCounter)
//! - [`allocator`]: Facility registry, sequence store, allocator and patient hooks
//! - [`export`]: Sequence counter report
//! - [`config`]: Startup configuration
//! - [`clock`]: Calendar year source

pub mod allocator;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;

// Re-export commonly used types
pub use allocator::{Allocation, FacilityRegistry, MrnAllocator, PatientHooks, SequenceStore};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::CoreConfig;
pub use db::Database;
pub use error::{MrnError, MrnResult};
pub use export::{SequenceReport, SequenceReporter};
pub use models::{Facility, FacilityCode, Mrn, PatientRecord, SequenceCounter};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};
use std::time::Duration;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum MrnCoreError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Sequence overflow: {0}")]
    SequenceOverflow(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<MrnError> for MrnCoreError {
    fn from(e: MrnError) -> Self {
        let message = e.to_string();
        match e {
            MrnError::Configuration(_) => MrnCoreError::ConfigurationError(message),
            MrnError::NotFound(_) => MrnCoreError::NotFound(message),
            MrnError::Validation(_) => MrnCoreError::ValidationError(message),
            MrnError::StoreUnavailable(_) => MrnCoreError::StoreUnavailable(message),
            MrnError::SequenceOverflow { .. } => MrnCoreError::SequenceOverflow(message),
            MrnError::Duplicate { .. } => MrnCoreError::Duplicate(message),
            MrnError::Database(_) => MrnCoreError::DatabaseError(message),
        }
    }
}

impl From<db::DbError> for MrnCoreError {
    fn from(e: db::DbError) -> Self {
        MrnError::from(e).into()
    }
}

impl From<serde_json::Error> for MrnCoreError {
    fn from(e: serde_json::Error) -> Self {
        MrnCoreError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for MrnCoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        MrnCoreError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
///
/// `lock_timeout_ms` of 0 selects the default; `default_facility` overrides
/// the stored default facility.
#[uniffi::export]
pub fn open_database(
    path: String,
    lock_timeout_ms: u64,
    default_facility: Option<String>,
) -> Result<Arc<MrnCore>, MrnCoreError> {
    let lock_timeout = if lock_timeout_ms == 0 {
        config::DEFAULT_LOCK_TIMEOUT
    } else {
        Duration::from_millis(lock_timeout_ms)
    };
    let config = CoreConfig::new(lock_timeout, default_facility)?;
    let db = Database::open_with_config(&path, &config)?;
    Ok(Arc::new(MrnCore::new(db, config)))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<MrnCore>, MrnCoreError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(MrnCore::new(db, CoreConfig::default())))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct MrnCore {
    db: Arc<Mutex<Database>>,
    config: CoreConfig,
    clock: Arc<dyn Clock>,
}

impl MrnCore {
    fn new(db: Database, config: CoreConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            config,
            clock: Arc::new(SystemClock),
        }
    }
}

#[uniffi::export]
impl MrnCore {
    // =========================================================================
    // Facility Operations
    // =========================================================================

    /// Register a facility; the code is normalized to uppercase.
    pub fn register_facility(
        &self,
        facility_id: String,
        name: String,
        code: String,
    ) -> Result<FfiFacility, MrnCoreError> {
        let db = self.db.lock()?;
        let registry = FacilityRegistry::new(&db);
        let facility = registry.register_facility(Facility::new(facility_id, name, code))?;
        Ok(facility.into())
    }

    /// Get a facility by ID.
    pub fn get_facility(&self, facility_id: String) -> Result<Option<FfiFacility>, MrnCoreError> {
        let db = self.db.lock()?;
        let facility = FacilityRegistry::new(&db).get_facility(&facility_id)?;
        Ok(facility.map(|f| f.into()))
    }

    /// List facilities.
    pub fn list_facilities(&self, active_only: bool) -> Result<Vec<FfiFacility>, MrnCoreError> {
        let db = self.db.lock()?;
        let facilities = FacilityRegistry::new(&db).list_facilities(active_only)?;
        Ok(facilities.into_iter().map(|f| f.into()).collect())
    }

    /// Activate or deactivate a facility.
    pub fn set_facility_active(&self, facility_id: String, active: bool) -> Result<(), MrnCoreError> {
        let db = self.db.lock()?;
        FacilityRegistry::new(&db).set_facility_active(&facility_id, active)?;
        Ok(())
    }

    /// Store the facility used when a registration names none.
    pub fn set_default_facility(&self, facility_id: Option<String>) -> Result<(), MrnCoreError> {
        let db = self.db.lock()?;
        FacilityRegistry::new(&db).set_default_facility(facility_id.as_deref())?;
        Ok(())
    }

    /// Resolve a facility (or the default facility) to its MRN prefix.
    pub fn resolve_prefix(&self, facility_id: Option<String>) -> Result<String, MrnCoreError> {
        let db = self.db.lock()?;
        let registry = FacilityRegistry::new(&db).with_default_facility(self.config.default_facility());
        Ok(registry.resolve_prefix(facility_id.as_deref())?.to_string())
    }

    // =========================================================================
    // MRN Operations
    // =========================================================================

    /// Issue the next MRN without attaching it to a record.
    pub fn allocate_mrn(&self, facility_id: Option<String>) -> Result<String, MrnCoreError> {
        let db = self.db.lock()?;
        let allocator = MrnAllocator::with_config(&db, self.clock.as_ref(), &self.config);
        Ok(allocator.allocate(facility_id.as_deref())?.to_string())
    }

    /// Check that no record other than `owning_record_id` holds `mrn`.
    pub fn validate_mrn_uniqueness(
        &self,
        mrn: String,
        owning_record_id: String,
    ) -> Result<(), MrnCoreError> {
        let db = self.db.lock()?;
        let allocator = MrnAllocator::with_config(&db, self.clock.as_ref(), &self.config);
        allocator.validate_uniqueness(&mrn, &owning_record_id)?;
        Ok(())
    }

    /// Raise a counter past numbers issued elsewhere.
    pub fn seed_sequence(
        &self,
        facility_code: String,
        year: i32,
        value: u32,
    ) -> Result<u32, MrnCoreError> {
        let db = self.db.lock()?;
        let code = FacilityCode::parse(&facility_code)?;
        Ok(SequenceStore::new(&db).seed(&code, year, value)?)
    }

    /// Get the counter for a facility code and year.
    pub fn get_sequence(
        &self,
        facility_code: String,
        year: i32,
    ) -> Result<Option<FfiSequenceCounter>, MrnCoreError> {
        let db = self.db.lock()?;
        let code = FacilityCode::parse(&facility_code)?;
        let counter = SequenceStore::new(&db).counter(&code, year)?;
        Ok(counter.map(|c| c.into()))
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Register a patient, allocating an MRN unless `mrn` is given.
    pub fn register_patient(
        &self,
        patient_name: String,
        facility_id: Option<String>,
        mrn: Option<String>,
    ) -> Result<FfiPatient, MrnCoreError> {
        let db = self.db.lock()?;
        let hooks = PatientHooks::new(MrnAllocator::with_config(
            &db,
            self.clock.as_ref(),
            &self.config,
        ));

        let mut record = PatientRecord::new(patient_name, facility_id);
        record.mrn = mrn;
        let saved = hooks.insert_patient(record)?;
        Ok(saved.into())
    }

    /// Save changes to an existing patient.
    pub fn update_patient(&self, patient: FfiPatient) -> Result<(), MrnCoreError> {
        let db = self.db.lock()?;
        let hooks = PatientHooks::new(MrnAllocator::with_config(
            &db,
            self.clock.as_ref(),
            &self.config,
        ));

        let stored = db
            .get_patient(&patient.patient_id)?
            .ok_or_else(|| MrnCoreError::NotFound(format!("Patient '{}' not found", patient.patient_id)))?;
        let record = PatientRecord {
            patient_name: patient.patient_name,
            facility_id: patient.facility_id,
            mrn: patient.mrn,
            ..stored
        };
        hooks.save_patient(&record)?;
        Ok(())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: String) -> Result<Option<FfiPatient>, MrnCoreError> {
        let db = self.db.lock()?;
        let patient = db.get_patient(&patient_id)?;
        Ok(patient.map(|p| p.into()))
    }

    /// Get the patient holding an MRN.
    pub fn find_patient_by_mrn(&self, mrn: String) -> Result<Option<FfiPatient>, MrnCoreError> {
        let db = self.db.lock()?;
        let patient = db.get_patient_by_mrn(&models::normalize_mrn(&mrn))?;
        Ok(patient.map(|p| p.into()))
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// List all sequence counters.
    pub fn list_sequences(&self) -> Result<Vec<FfiSequenceCounter>, MrnCoreError> {
        let db = self.db.lock()?;
        let counters = SequenceStore::new(&db).counters()?;
        Ok(counters.into_iter().map(|c| c.into()).collect())
    }

    /// Export the sequence report as JSON.
    pub fn export_sequences_json(&self) -> Result<String, MrnCoreError> {
        let db = self.db.lock()?;
        let report = SequenceReporter::new(&db).export_all()?;
        Ok(report.to_json()?)
    }

    /// Export the sequence report as CSV.
    pub fn export_sequences_csv(&self) -> Result<String, MrnCoreError> {
        let db = self.db.lock()?;
        let report = SequenceReporter::new(&db).export_all()?;
        Ok(report.to_csv())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe facility.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFacility {
    pub facility_id: String,
    pub name: String,
    pub code: String,
    pub active: bool,
}

impl From<Facility> for FfiFacility {
    fn from(facility: Facility) -> Self {
        Self {
            facility_id: facility.facility_id,
            name: facility.name,
            code: facility.code,
            active: facility.active,
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub patient_id: String,
    pub patient_name: String,
    pub facility_id: Option<String>,
    pub mrn: Option<String>,
}

impl From<PatientRecord> for FfiPatient {
    fn from(patient: PatientRecord) -> Self {
        Self {
            patient_id: patient.patient_id,
            patient_name: patient.patient_name,
            facility_id: patient.facility_id,
            mrn: patient.mrn,
        }
    }
}

/// FFI-safe sequence counter.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSequenceCounter {
    pub facility_code: String,
    pub year: i32,
    pub current_value: u32,
}

impl From<SequenceCounter> for FfiSequenceCounter {
    fn from(counter: SequenceCounter) -> Self {
        Self {
            facility_code: counter.facility_code,
            year: counter.year,
            current_value: counter.current_value,
        }
    }
}
