//! SQLite schema definition.

/// Complete database schema for MRN allocation.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Facilities (hospitals / clinics issuing MRNs)
-- ============================================================================

CREATE TABLE IF NOT EXISTS facilities (
    facility_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    code TEXT NOT NULL,                          -- MRN prefix, uppercase alphanumeric
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_facilities_code ON facilities(code);
CREATE INDEX IF NOT EXISTS idx_facilities_active ON facilities(active, created_at);

-- ============================================================================
-- MRN Sequences (one counter per facility code per year, never deleted)
-- ============================================================================

CREATE TABLE IF NOT EXISTS mrn_sequences (
    facility_code TEXT NOT NULL,
    year INTEGER NOT NULL,
    current_value INTEGER NOT NULL DEFAULT 0 CHECK (current_value >= 0),
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    PRIMARY KEY (facility_code, year)
);

-- Counters only ever move forward
CREATE TRIGGER IF NOT EXISTS mrn_sequences_monotonic BEFORE UPDATE ON mrn_sequences
WHEN new.current_value < old.current_value
BEGIN
    SELECT RAISE(ABORT, 'MRN sequence counters cannot decrease');
END;

CREATE TRIGGER IF NOT EXISTS mrn_sequences_no_delete BEFORE DELETE ON mrn_sequences
BEGIN
    SELECT RAISE(ABORT, 'MRN sequence counters cannot be deleted');
END;

-- ============================================================================
-- Patients (only the fields the allocator reads or writes)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    patient_id TEXT PRIMARY KEY,
    patient_name TEXT NOT NULL,
    facility_id TEXT REFERENCES facilities(facility_id),
    mrn TEXT,                                    -- YYYY-PREFIX-NNNNN, immutable once set
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

-- MRNs compare trimmed and uppercased, so imported lowercase copies still collide
DROP INDEX IF EXISTS idx_patients_mrn;
CREATE UNIQUE INDEX IF NOT EXISTS idx_patients_mrn_normalized
    ON patients(upper(trim(mrn)))
    WHERE mrn IS NOT NULL AND trim(mrn) != '';
CREATE INDEX IF NOT EXISTS idx_patients_facility ON patients(facility_id);

-- ============================================================================
-- Settings
-- ============================================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

-- Facility used when a registration names none ('' = unset)
INSERT OR IGNORE INTO settings (key, value) VALUES ('default_facility', '');
"#;
