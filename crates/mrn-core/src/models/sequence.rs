//! Sequence counter models.

use serde::{Deserialize, Serialize};

/// Issuance count for one facility code in one calendar year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SequenceCounter {
    /// Normalized facility code
    pub facility_code: String,
    /// Calendar year
    pub year: i32,
    /// Number of MRNs issued so far (the last issued sequence value)
    pub current_value: u32,
    /// When the counter was first created
    pub created_at: String,
    /// When the counter last moved
    pub updated_at: String,
}

impl SequenceCounter {
    /// Whether any MRN has been issued under this key.
    pub fn has_issued(&self) -> bool {
        self.current_value > 0
    }
}
