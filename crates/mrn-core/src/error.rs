//! Error taxonomy for MRN allocation.

use thiserror::Error;

use crate::db::DbError;

/// Errors raised by facility lookup, sequence allocation and MRN validation.
///
/// Every variant aborts the operation that raised it. Only
/// [`MrnError::StoreUnavailable`] is worth retrying.
#[derive(Error, Debug)]
pub enum MrnError {
    /// No facility configured; an operator has to create or select one.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A facility or patient reference did not resolve.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed facility code, MRN or record update.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The store was unreachable or its lock timed out.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("MRN sequence exhausted for {facility_code}/{year} (max {max})")]
    SequenceOverflow {
        facility_code: String,
        year: i32,
        max: u32,
    },

    #[error("MRN '{mrn}' is already assigned to {existing_record}")]
    Duplicate {
        mrn: String,
        existing_record: String,
    },

    #[error("Database error: {0}")]
    Database(DbError),
}

impl MrnError {
    /// Transient failures the caller may retry as a whole.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MrnError::StoreUnavailable(_))
    }
}

impl From<DbError> for MrnError {
    fn from(e: DbError) -> Self {
        if e.is_unavailable() {
            MrnError::StoreUnavailable(e.to_string())
        } else {
            MrnError::Database(e)
        }
    }
}

impl From<rusqlite::Error> for MrnError {
    fn from(e: rusqlite::Error) -> Self {
        DbError::from(e).into()
    }
}

pub type MrnResult<T> = Result<T, MrnError>;
