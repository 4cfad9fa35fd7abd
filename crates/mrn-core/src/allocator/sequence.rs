//! Sequence store: per (facility code, year) counters with atomic increment.

use tracing::debug;

use crate::db::Database;
use crate::error::{MrnError, MrnResult};
use crate::models::{FacilityCode, SequenceCounter, MAX_MRN_SEQUENCE};

/// Lockable counters keyed by facility code and calendar year.
pub struct SequenceStore<'a> {
    db: &'a Database,
}

impl<'a> SequenceStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Advance the counter and return the new value.
    ///
    /// Runs under the database write lock, joining the caller's transaction
    /// when there is one. Nothing is committed if the call fails.
    pub fn next_value(&self, facility_code: &FacilityCode, year: i32) -> MrnResult<u32> {
        self.db.write_transaction(|| {
            let value = self.db.bump_sequence(facility_code.as_str(), year)?;
            debug!(code = %facility_code, year, value, "advanced MRN sequence");
            Ok(value)
        })
    }

    /// Like [`next_value`](Self::next_value), but refuses to move past `max`.
    ///
    /// The bound is checked before writing, so an exhausted counter stays put.
    pub fn next_value_capped(
        &self,
        facility_code: &FacilityCode,
        year: i32,
        max: u32,
    ) -> MrnResult<u32> {
        self.db.write_transaction(|| {
            let current = self.db.sequence_value(facility_code.as_str(), year)?;
            if current >= max {
                return Err(MrnError::SequenceOverflow {
                    facility_code: facility_code.to_string(),
                    year,
                    max,
                });
            }
            self.next_value(facility_code, year)
        })
    }

    /// Number of values issued so far for the key.
    pub fn current_value(&self, facility_code: &FacilityCode, year: i32) -> MrnResult<u32> {
        Ok(self.db.sequence_value(facility_code.as_str(), year)?)
    }

    /// The stored counter for the key, if anything has been issued or seeded.
    pub fn counter(
        &self,
        facility_code: &FacilityCode,
        year: i32,
    ) -> MrnResult<Option<SequenceCounter>> {
        Ok(self.db.get_sequence(facility_code.as_str(), year)?)
    }

    /// Raise a counter so the next value follows previously issued numbers.
    ///
    /// Used when importing MRNs issued elsewhere. Never lowers a counter.
    pub fn seed(&self, facility_code: &FacilityCode, year: i32, value: u32) -> MrnResult<u32> {
        if value > MAX_MRN_SEQUENCE {
            return Err(MrnError::Validation(format!(
                "Seed value {} exceeds the MRN sequence maximum {}",
                value, MAX_MRN_SEQUENCE
            )));
        }
        self.db
            .write_transaction(|| Ok(self.db.seed_sequence(facility_code.as_str(), year, value)?))
    }

    /// All counters, ordered by facility code then year.
    pub fn counters(&self) -> MrnResult<Vec<SequenceCounter>> {
        Ok(self.db.list_sequences()?)
    }
}
