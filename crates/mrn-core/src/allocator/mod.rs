//! MRN allocation.
//!
//! Pipeline: Facility Lookup → Sequence Increment → Format → Uniqueness Check
//!
//! Allocation must happen before the owning patient record is first written,
//! so the MRN is part of its first persisted version. [`PatientHooks`] wires
//! that ordering for callers that persist through this crate.

mod hooks;
mod registry;
mod sequence;

pub use hooks::*;
pub use registry::*;
pub use sequence::*;

use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::db::Database;
use crate::error::{MrnError, MrnResult};
use crate::models::{normalize_mrn, Mrn, MAX_MRN_SEQUENCE};

/// Result of one allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// Facility the MRN was issued for (the default one if none was named)
    pub facility_id: String,
    /// The issued MRN
    pub mrn: Mrn,
}

/// Coordinates facility lookup, sequence increment and formatting.
pub struct MrnAllocator<'a> {
    db: &'a Database,
    registry: FacilityRegistry<'a>,
    sequences: SequenceStore<'a>,
    clock: &'a dyn Clock,
}

impl<'a> MrnAllocator<'a> {
    /// Create an allocator using the stored default facility.
    pub fn new(db: &'a Database, clock: &'a dyn Clock) -> Self {
        Self {
            db,
            registry: FacilityRegistry::new(db),
            sequences: SequenceStore::new(db),
            clock,
        }
    }

    /// Create an allocator honouring the configured default facility.
    pub fn with_config(db: &'a Database, clock: &'a dyn Clock, config: &CoreConfig) -> Self {
        Self {
            db,
            registry: FacilityRegistry::new(db).with_default_facility(config.default_facility()),
            sequences: SequenceStore::new(db),
            clock,
        }
    }

    /// Issue the next MRN for a facility (or the default facility).
    ///
    /// Every call consumes a sequence value; callers invoke it once per
    /// registration.
    pub fn allocate(&self, facility_id: Option<&str>) -> MrnResult<Mrn> {
        Ok(self.allocate_for(facility_id)?.mrn)
    }

    /// Issue the next MRN and report which facility it was issued for.
    pub fn allocate_for(&self, facility_id: Option<&str>) -> MrnResult<Allocation> {
        let allocation = self.db.write_transaction(|| {
            let facility = self.registry.resolve_facility(facility_id)?;
            let code = facility.prefix()?;
            let year = self.clock.current_year();

            let sequence = self
                .sequences
                .next_value_capped(&code, year, MAX_MRN_SEQUENCE)
                .map_err(|e| {
                    if let MrnError::SequenceOverflow { .. } = e {
                        warn!(code = %code, year, "MRN sequence exhausted");
                    }
                    e
                })?;

            Ok::<_, MrnError>(Allocation {
                facility_id: facility.facility_id,
                mrn: Mrn::new(year, code, sequence)?,
            })
        })?;

        info!(
            mrn = %allocation.mrn,
            facility_id = %allocation.facility_id,
            "allocated MRN"
        );
        Ok(allocation)
    }

    /// Fail with [`MrnError::Duplicate`] if any record other than
    /// `owning_record_id` already holds `mrn`.
    pub fn validate_uniqueness(&self, mrn: &str, owning_record_id: &str) -> MrnResult<()> {
        let mrn = normalize_mrn(mrn);
        if mrn.is_empty() {
            return Ok(());
        }

        match self.db.find_mrn_holder(&mrn, owning_record_id)? {
            Some(existing_record) => Err(MrnError::Duplicate {
                mrn,
                existing_record,
            }),
            None => Ok(()),
        }
    }

    pub fn registry(&self) -> &FacilityRegistry<'a> {
        &self.registry
    }

    pub fn sequences(&self) -> &SequenceStore<'a> {
        &self.sequences
    }

    pub(crate) fn db(&self) -> &'a Database {
        self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{Facility, FacilityCode, PatientRecord};

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.insert_facility(&Facility::new(
            "HOSP-KRB".into(),
            "Karbala Hospital".into(),
            "KRB".into(),
        ))
        .unwrap();
        db
    }

    #[test]
    fn test_first_and_second_allocation() {
        let db = setup_db();
        let clock = FixedClock(2025);
        let allocator = MrnAllocator::new(&db, &clock);

        assert_eq!(
            allocator.allocate(Some("HOSP-KRB")).unwrap().to_string(),
            "2025-KRB-00001"
        );
        assert_eq!(
            allocator.allocate(Some("HOSP-KRB")).unwrap().to_string(),
            "2025-KRB-00002"
        );
    }

    #[test]
    fn test_allocate_default_facility() {
        let db = setup_db();
        let clock = FixedClock(2025);
        let allocator = MrnAllocator::new(&db, &clock);

        let allocation = allocator.allocate_for(None).unwrap();
        assert_eq!(allocation.facility_id, "HOSP-KRB");
        assert_eq!(allocation.mrn.to_string(), "2025-KRB-00001");
    }

    #[test]
    fn test_year_rollover_restarts_sequence() {
        let db = setup_db();

        let clock = FixedClock(2025);
        let allocator = MrnAllocator::new(&db, &clock);
        allocator.allocate(Some("HOSP-KRB")).unwrap();
        allocator.allocate(Some("HOSP-KRB")).unwrap();

        let clock = FixedClock(2026);
        let allocator = MrnAllocator::new(&db, &clock);
        assert_eq!(
            allocator.allocate(Some("HOSP-KRB")).unwrap().to_string(),
            "2026-KRB-00001"
        );
    }

    #[test]
    fn test_overflow_leaves_counter_unchanged() {
        let db = setup_db();
        let clock = FixedClock(2025);
        let allocator = MrnAllocator::new(&db, &clock);
        let krb = FacilityCode::parse("KRB").unwrap();

        allocator.sequences().seed(&krb, 2025, MAX_MRN_SEQUENCE).unwrap();

        let err = allocator.allocate(Some("HOSP-KRB")).unwrap_err();
        assert!(matches!(
            err,
            MrnError::SequenceOverflow { year: 2025, max: MAX_MRN_SEQUENCE, .. }
        ));
        assert!(!err.is_retryable());
        assert_eq!(
            allocator.sequences().current_value(&krb, 2025).unwrap(),
            MAX_MRN_SEQUENCE
        );
    }

    #[test]
    fn test_last_value_before_overflow() {
        let db = setup_db();
        let clock = FixedClock(2025);
        let allocator = MrnAllocator::new(&db, &clock);
        let krb = FacilityCode::parse("KRB").unwrap();

        allocator
            .sequences()
            .seed(&krb, 2025, MAX_MRN_SEQUENCE - 1)
            .unwrap();
        assert_eq!(
            allocator.allocate(Some("HOSP-KRB")).unwrap().to_string(),
            "2025-KRB-99999"
        );
    }

    #[test]
    fn test_lookup_failure_consumes_nothing() {
        let db = setup_db();
        let clock = FixedClock(2025);
        let allocator = MrnAllocator::new(&db, &clock);

        assert!(matches!(
            allocator.allocate(Some("HOSP-NOPE")),
            Err(MrnError::NotFound(_))
        ));
        assert!(db.list_sequences().unwrap().is_empty());
    }

    #[test]
    fn test_validate_uniqueness() {
        let db = setup_db();
        let clock = FixedClock(2025);
        let allocator = MrnAllocator::new(&db, &clock);

        let mut pat1 = PatientRecord::with_id("PAT-1".into(), "One".into(), Some("HOSP-KRB".into()));
        pat1.mrn = Some("2025-KRB-00001".into());
        db.insert_patient(&pat1).unwrap();

        let err = allocator
            .validate_uniqueness("2025-KRB-00001", "PAT-2")
            .unwrap_err();
        match err {
            MrnError::Duplicate {
                mrn,
                existing_record,
            } => {
                assert_eq!(mrn, "2025-KRB-00001");
                assert_eq!(existing_record, "PAT-1");
            }
            other => panic!("expected Duplicate, got {:?}", other),
        }

        // The owner itself is not a conflict; comparison ignores case and padding
        assert!(allocator.validate_uniqueness("2025-KRB-00001", "PAT-1").is_ok());
        assert!(allocator
            .validate_uniqueness(" 2025-krb-00001 ", "PAT-3")
            .is_err());
        assert!(allocator.validate_uniqueness("2025-KRB-00002", "PAT-2").is_ok());
    }

    #[test]
    fn test_validate_uniqueness_catches_unnormalized_rows() {
        let db = setup_db();
        let clock = FixedClock(2025);
        let allocator = MrnAllocator::new(&db, &clock);

        // Imported straight into the table, bypassing normalization
        let mut imported =
            PatientRecord::with_id("PAT-1".into(), "One".into(), Some("HOSP-KRB".into()));
        imported.mrn = Some("2025-krb-00001".into());
        db.insert_patient(&imported).unwrap();

        let err = allocator
            .validate_uniqueness("2025-KRB-00001", "PAT-2")
            .unwrap_err();
        assert!(matches!(
            err,
            MrnError::Duplicate { ref existing_record, .. } if existing_record == "PAT-1"
        ));
    }
}
