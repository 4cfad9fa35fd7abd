//! Sequence report: how many MRNs each facility issued per year.

use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::MrnResult;
use crate::models::{FacilityCode, Mrn, SequenceCounter, MAX_MRN_SEQUENCE};

/// One counter in the report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SequenceReportEntry {
    /// Facility code (MRN prefix)
    pub facility_code: String,
    /// Facility currently using the code, if any
    pub facility_id: Option<String>,
    /// Calendar year
    pub year: i32,
    /// MRNs issued so far
    pub issued: u32,
    /// Values left before the sequence is exhausted
    pub remaining: u32,
    /// Most recently issued MRN
    pub last_mrn: Option<String>,
    /// When the counter last moved
    pub updated_at: String,
}

impl SequenceReportEntry {
    /// Build an entry from a stored counter.
    pub fn from_counter(counter: &SequenceCounter, facility_id: Option<String>) -> Self {
        let last_mrn = FacilityCode::parse(&counter.facility_code)
            .ok()
            .filter(|_| counter.has_issued())
            .and_then(|code| Mrn::new(counter.year, code, counter.current_value).ok())
            .map(|mrn| mrn.to_string());

        Self {
            facility_code: counter.facility_code.clone(),
            facility_id,
            year: counter.year,
            issued: counter.current_value,
            remaining: MAX_MRN_SEQUENCE.saturating_sub(counter.current_value),
            last_mrn,
            updated_at: counter.updated_at.clone(),
        }
    }
}

/// Report over all counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceReport {
    /// Export timestamp
    pub exported_at: String,
    /// Counters ordered by facility code, then year
    pub entries: Vec<SequenceReportEntry>,
    /// Sum of issued values
    pub total_issued: u64,
}

impl SequenceReport {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV format.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        // Header
        csv.push_str("facility_code,facility_id,year,issued,remaining,last_mrn,updated_at\n");

        for entry in &self.entries {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                escape_csv(&entry.facility_code),
                escape_csv(entry.facility_id.as_deref().unwrap_or("")),
                entry.year,
                entry.issued,
                entry.remaining,
                entry.last_mrn.as_deref().unwrap_or(""),
                escape_csv(&entry.updated_at),
            ));
        }

        csv
    }
}

/// Sequence reporter.
pub struct SequenceReporter<'a> {
    db: &'a Database,
}

impl<'a> SequenceReporter<'a> {
    /// Create a new sequence reporter.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Report every counter.
    pub fn export_all(&self) -> MrnResult<SequenceReport> {
        self.export_filtered(|_| true)
    }

    /// Report the counters of one year.
    pub fn export_year(&self, year: i32) -> MrnResult<SequenceReport> {
        self.export_filtered(|counter| counter.year == year)
    }

    fn export_filtered<F>(&self, keep: F) -> MrnResult<SequenceReport>
    where
        F: Fn(&SequenceCounter) -> bool,
    {
        let mut entries = Vec::new();
        let mut total_issued = 0u64;

        for counter in self.db.list_sequences()?.iter().filter(|c| keep(c)) {
            let facility_id = self
                .db
                .get_facility_by_code(&counter.facility_code)?
                .map(|f| f.facility_id);
            total_issued += u64::from(counter.current_value);
            entries.push(SequenceReportEntry::from_counter(counter, facility_id));
        }

        Ok(SequenceReport {
            exported_at: chrono::Utc::now().to_rfc3339(),
            entries,
            total_issued,
        })
    }
}

/// Escape a value for CSV.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Facility;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.insert_facility(&Facility::new(
            "HOSP-KRB".into(),
            "Karbala Hospital".into(),
            "KRB".into(),
        ))
        .unwrap();
        db.bump_sequence("KRB", 2025).unwrap();
        db.bump_sequence("KRB", 2025).unwrap();
        db.bump_sequence("KRB", 2024).unwrap();
        // Code no longer attached to a facility
        db.bump_sequence("OLD", 2024).unwrap();
        db
    }

    #[test]
    fn test_export_all() {
        let db = setup_db();
        let report = SequenceReporter::new(&db).export_all().unwrap();

        assert_eq!(report.entries.len(), 3);
        assert_eq!(report.total_issued, 4);

        let krb_2025 = report
            .entries
            .iter()
            .find(|e| e.facility_code == "KRB" && e.year == 2025)
            .unwrap();
        assert_eq!(krb_2025.issued, 2);
        assert_eq!(krb_2025.remaining, MAX_MRN_SEQUENCE - 2);
        assert_eq!(krb_2025.last_mrn.as_deref(), Some("2025-KRB-00002"));
        assert_eq!(krb_2025.facility_id.as_deref(), Some("HOSP-KRB"));

        let old = report.entries.iter().find(|e| e.facility_code == "OLD").unwrap();
        assert_eq!(old.facility_id, None);
    }

    #[test]
    fn test_export_year() {
        let db = setup_db();
        let report = SequenceReporter::new(&db).export_year(2024).unwrap();
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.total_issued, 2);
    }

    #[test]
    fn test_csv_export() {
        let db = setup_db();
        let report = SequenceReporter::new(&db).export_all().unwrap();
        let csv = report.to_csv();

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4); // header + 3 counters
        assert!(lines[0].starts_with("facility_code,facility_id,year"));
        assert!(lines[1].starts_with("KRB,HOSP-KRB,2024,1,99998,2024-KRB-00001,"));
        assert!(lines[2].starts_with("KRB,HOSP-KRB,2025,2,99997,2025-KRB-00002,"));
        assert!(lines[3].starts_with("OLD,,2024,1,99998,2024-OLD-00001,"));
    }

    #[test]
    fn test_json_export() {
        let db = setup_db();
        let report = SequenceReporter::new(&db).export_all().unwrap();
        let json = report.to_json().unwrap();

        assert!(json.contains("\"last_mrn\": \"2025-KRB-00002\""));
        assert!(json.contains("\"total_issued\": 4"));
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
    }
}
