//! Facility models.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MrnError, MrnResult};

/// Longest code a facility may use as its MRN prefix.
pub const MAX_FACILITY_CODE_LEN: usize = 10;

/// A normalized facility code: uppercase ASCII alphanumerics, 1 to 10 chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FacilityCode(String);

impl FacilityCode {
    /// Trim, uppercase and validate a raw code.
    pub fn parse(raw: &str) -> MrnResult<Self> {
        let code = raw.trim().to_ascii_uppercase();

        if code.is_empty() {
            return Err(MrnError::Validation("Facility code cannot be empty".into()));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(MrnError::Validation(format!(
                "Facility code '{}' must contain only letters and numbers",
                code
            )));
        }
        if code.len() > MAX_FACILITY_CODE_LEN {
            return Err(MrnError::Validation(format!(
                "Facility code '{}' must be {} characters or less",
                code, MAX_FACILITY_CODE_LEN
            )));
        }

        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FacilityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for FacilityCode {
    type Error = MrnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FacilityCode> for String {
    fn from(code: FacilityCode) -> Self {
        code.0
    }
}

/// A hospital or clinic that issues MRNs.
///
/// `code` is stored as entered; lookups normalize it again before use, so
/// rows imported without validation are still caught.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Facility {
    /// Stable identifier
    pub facility_id: String,
    /// Display name
    pub name: String,
    /// MRN prefix
    pub code: String,
    /// Inactive facilities are never picked as the default
    pub active: bool,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Facility {
    /// Create a new active facility.
    pub fn new(facility_id: String, name: String, code: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            facility_id,
            name,
            code,
            active: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Normalized MRN prefix for this facility.
    pub fn prefix(&self) -> MrnResult<FacilityCode> {
        FacilityCode::parse(&self.code)
    }
}
