//! Facility registry: prefix lookup and facility administration.

use tracing::{debug, info};

use crate::db::Database;
use crate::error::{MrnError, MrnResult};
use crate::models::{Facility, FacilityCode};

/// Resolves facility references to MRN prefixes.
pub struct FacilityRegistry<'a> {
    db: &'a Database,
    default_facility: Option<String>,
}

impl<'a> FacilityRegistry<'a> {
    /// Create a registry that falls back to the stored default facility.
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            default_facility: None,
        }
    }

    /// Prefer `facility_id` over the stored setting when no facility is named.
    pub fn with_default_facility(mut self, facility_id: Option<&str>) -> Self {
        self.default_facility = facility_id.map(Into::into);
        self
    }

    /// Resolve a facility reference to its normalized MRN prefix.
    pub fn resolve_prefix(&self, facility_id: Option<&str>) -> MrnResult<FacilityCode> {
        let facility = self.resolve_facility(facility_id)?;
        facility.prefix()
    }

    /// Resolve a facility reference, falling back to the default facility.
    ///
    /// Fallback order: configured default, stored default, first active
    /// facility by creation time.
    pub fn resolve_facility(&self, facility_id: Option<&str>) -> MrnResult<Facility> {
        if let Some(id) = facility_id.map(str::trim).filter(|id| !id.is_empty()) {
            return self
                .db
                .get_facility(id)?
                .ok_or_else(|| MrnError::NotFound(format!("Facility '{}' not found", id)));
        }

        let configured = match self.default_facility.clone() {
            Some(id) => Some(id),
            None => self.db.default_facility_id()?,
        };

        if let Some(id) = configured {
            debug!(facility_id = %id, "using default facility");
            return self.db.get_facility(&id)?.ok_or_else(|| {
                MrnError::Configuration(format!(
                    "Default facility '{}' does not exist",
                    id
                ))
            });
        }

        self.db.first_active_facility()?.ok_or_else(|| {
            MrnError::Configuration(
                "No facility configured. Please create a facility record first.".into(),
            )
        })
    }

    /// Register a new facility after normalizing and validating its code.
    pub fn register_facility(&self, mut facility: Facility) -> MrnResult<Facility> {
        let code = FacilityCode::parse(&facility.code)?;
        facility.code = code.to_string();

        if facility.facility_id.trim().is_empty() {
            return Err(MrnError::Validation("Facility id cannot be empty".into()));
        }

        self.db.write_transaction(|| {
            if self.db.get_facility(&facility.facility_id)?.is_some() {
                return Err(MrnError::Validation(format!(
                    "Facility '{}' already exists",
                    facility.facility_id
                )));
            }
            self.ensure_code_free(&code, &facility.facility_id)?;
            self.db.insert_facility(&facility)?;
            Ok(())
        })?;

        info!(facility_id = %facility.facility_id, code = %code, "registered facility");
        Ok(facility)
    }

    /// Update an existing facility's name, code and active flag.
    pub fn update_facility(&self, mut facility: Facility) -> MrnResult<Facility> {
        let code = FacilityCode::parse(&facility.code)?;
        facility.code = code.to_string();

        self.db.write_transaction(|| {
            self.ensure_code_free(&code, &facility.facility_id)?;
            if !self.db.update_facility(&facility)? {
                return Err(MrnError::NotFound(format!(
                    "Facility '{}' not found",
                    facility.facility_id
                )));
            }
            Ok(())
        })?;

        Ok(facility)
    }

    /// Activate or deactivate a facility.
    pub fn set_facility_active(&self, facility_id: &str, active: bool) -> MrnResult<()> {
        if !self.db.set_facility_active(facility_id, active)? {
            return Err(MrnError::NotFound(format!(
                "Facility '{}' not found",
                facility_id
            )));
        }
        Ok(())
    }

    /// Store the facility used when a registration names none (`None` clears it).
    pub fn set_default_facility(&self, facility_id: Option<&str>) -> MrnResult<()> {
        if let Some(id) = facility_id {
            if self.db.get_facility(id)?.is_none() {
                return Err(MrnError::NotFound(format!("Facility '{}' not found", id)));
            }
        }
        self.db.set_default_facility_id(facility_id)?;
        Ok(())
    }

    pub fn get_facility(&self, facility_id: &str) -> MrnResult<Option<Facility>> {
        Ok(self.db.get_facility(facility_id)?)
    }

    pub fn list_facilities(&self, active_only: bool) -> MrnResult<Vec<Facility>> {
        Ok(self.db.list_facilities(active_only)?)
    }

    fn ensure_code_free(&self, code: &FacilityCode, facility_id: &str) -> MrnResult<()> {
        match self.db.get_facility_by_code(code.as_str())? {
            Some(other) if other.facility_id != facility_id => Err(MrnError::Validation(format!(
                "Facility code '{}' is already used by '{}'",
                code, other.facility_id
            ))),
            _ => Ok(()),
        }
    }
}
