//! Patient models.

use serde::{Deserialize, Serialize};

/// The part of a patient record that crosses the allocator boundary.
///
/// The host maps its own patient shape onto these fields and back; the core
/// never reads anything else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientRecord {
    /// Stable record identifier
    pub patient_id: String,
    /// Patient display name
    pub patient_name: String,
    /// Registering facility; `None` means the default facility
    pub facility_id: Option<String>,
    /// Medical Record Number, set once before the first insert
    pub mrn: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl PatientRecord {
    /// Create a new, not yet persisted record with a generated id.
    pub fn new(patient_name: String, facility_id: Option<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), patient_name, facility_id)
    }

    /// Create a new record with a caller-chosen id.
    pub fn with_id(patient_id: String, patient_name: String, facility_id: Option<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            patient_id,
            patient_name,
            facility_id,
            mrn: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// MRN if one is attached and non-blank.
    pub fn mrn(&self) -> Option<&str> {
        self.mrn.as_deref().filter(|m| !m.trim().is_empty())
    }
}
