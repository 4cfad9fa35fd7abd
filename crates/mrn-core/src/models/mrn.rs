//! Medical Record Number value type.
//!
//! Canonical layout is `YYYY-PREFIX-NNNNN`: four-digit year, facility code,
//! five-digit zero-padded sequence. The width never grows, so MRNs of one
//! facility-year sort lexicographically in issue order.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::facility::FacilityCode;
use crate::error::{MrnError, MrnResult};

/// Digits in the sequence part.
pub const MRN_SEQUENCE_WIDTH: usize = 5;

/// Highest sequence value that fits the fixed width.
pub const MAX_MRN_SEQUENCE: u32 = 99_999;

/// A formatted, validated Medical Record Number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mrn {
    year: i32,
    facility_code: FacilityCode,
    sequence: u32,
}

impl Mrn {
    /// Build an MRN, refusing values that do not fit the fixed layout.
    pub fn new(year: i32, facility_code: FacilityCode, sequence: u32) -> MrnResult<Self> {
        if !(1000..=9999).contains(&year) {
            return Err(MrnError::Validation(format!(
                "MRN year {} is not a four-digit year",
                year
            )));
        }
        if sequence == 0 {
            return Err(MrnError::Validation("MRN sequence starts at 1".into()));
        }
        if sequence > MAX_MRN_SEQUENCE {
            return Err(MrnError::SequenceOverflow {
                facility_code: facility_code.to_string(),
                year,
                max: MAX_MRN_SEQUENCE,
            });
        }

        Ok(Self {
            year,
            facility_code,
            sequence,
        })
    }

    /// Parse a canonical MRN string (case-insensitive, surrounding whitespace ignored).
    pub fn parse(raw: &str) -> MrnResult<Self> {
        let normalized = normalize_mrn(raw);
        let invalid = || {
            MrnError::Validation(format!(
                "MRN '{}' does not match YYYY-PREFIX-NNNNN (e.g., 2025-KRB-00001)",
                normalized
            ))
        };

        if normalized.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        let mut parts = normalized.split('-');
        let (year, code, sequence) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(y), Some(c), Some(s), None) => (y, c, s),
            _ => return Err(invalid()),
        };

        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if sequence.len() != MRN_SEQUENCE_WIDTH || !sequence.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let facility_code = FacilityCode::parse(code).map_err(|_| invalid())?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let sequence: u32 = sequence.parse().map_err(|_| invalid())?;

        Self::new(year, facility_code, sequence).map_err(|_| invalid())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn facility_code(&self) -> &FacilityCode {
        &self.facility_code
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for Mrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{}-{:0width$}",
            self.year,
            self.facility_code,
            self.sequence,
            width = MRN_SEQUENCE_WIDTH
        )
    }
}

impl TryFrom<String> for Mrn {
    type Error = MrnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Mrn> for String {
    fn from(mrn: Mrn) -> Self {
        mrn.to_string()
    }
}

/// Trim and uppercase an MRN as entered by a user or imported from elsewhere.
pub fn normalize_mrn(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}
