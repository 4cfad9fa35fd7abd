//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::PatientRecord;

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<PatientRecord> {
    Ok(PatientRecord {
        patient_id: row.get(0)?,
        patient_name: row.get(1)?,
        facility_id: row.get(2)?,
        mrn: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &PatientRecord) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                patient_id, patient_name, facility_id, mrn, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                patient.patient_id,
                patient.patient_name,
                patient.facility_id,
                patient.mrn,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing patient. The MRN column is left untouched.
    pub fn update_patient(&self, patient: &PatientRecord) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                patient_name = ?2,
                facility_id = ?3,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE patient_id = ?1
            "#,
            params![patient.patient_id, patient.patient_name, patient.facility_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Attach an MRN to a patient that has none. Returns false if the patient
    /// is missing or already has one.
    pub fn assign_patient_mrn(&self, patient_id: &str, mrn: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                mrn = ?2,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE patient_id = ?1 AND (mrn IS NULL OR trim(mrn) = '')
            "#,
            params![patient_id, mrn],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: &str) -> DbResult<Option<PatientRecord>> {
        self.conn
            .query_row(
                r#"
                SELECT patient_id, patient_name, facility_id, mrn, created_at, updated_at
                FROM patients
                WHERE patient_id = ?
                "#,
                [patient_id],
                patient_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get the patient holding an MRN, ignoring case and surrounding spaces.
    pub fn get_patient_by_mrn(&self, mrn: &str) -> DbResult<Option<PatientRecord>> {
        self.conn
            .query_row(
                r#"
                SELECT patient_id, patient_name, facility_id, mrn, created_at, updated_at
                FROM patients
                WHERE upper(trim(mrn)) = upper(trim(?1))
                "#,
                [mrn],
                patient_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// ID of any patient other than `exclude_patient_id` holding `mrn`.
    ///
    /// Stored values are compared trimmed and uppercased, so rows imported
    /// without normalization still count.
    pub fn find_mrn_holder(&self, mrn: &str, exclude_patient_id: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                r#"
                SELECT patient_id FROM patients
                WHERE upper(trim(mrn)) = upper(trim(?1)) AND patient_id != ?2
                LIMIT 1
                "#,
                params![mrn, exclude_patient_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// List patients registered at a facility, in MRN order.
    pub fn list_patients_by_facility(&self, facility_id: &str) -> DbResult<Vec<PatientRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT patient_id, patient_name, facility_id, mrn, created_at, updated_at
            FROM patients
            WHERE facility_id = ?
            ORDER BY mrn
            "#,
        )?;

        let rows = stmt.query_map([facility_id], patient_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
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
        db
    }

    fn patient(id: &str, mrn: Option<&str>) -> PatientRecord {
        let mut patient =
            PatientRecord::with_id(id.into(), format!("Patient {}", id), Some("HOSP-KRB".into()));
        patient.mrn = mrn.map(Into::into);
        patient
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();
        let record = patient("PAT-1", Some("2025-KRB-00001"));
        db.insert_patient(&record).unwrap();

        let retrieved = db.get_patient("PAT-1").unwrap().unwrap();
        assert_eq!(retrieved, record);

        let by_mrn = db.get_patient_by_mrn("2025-KRB-00001").unwrap().unwrap();
        assert_eq!(by_mrn.patient_id, "PAT-1");
    }

    #[test]
    fn test_update_keeps_mrn() {
        let db = setup_db();
        let mut record = patient("PAT-1", Some("2025-KRB-00001"));
        db.insert_patient(&record).unwrap();

        record.patient_name = "Renamed".into();
        record.mrn = Some("2025-KRB-09999".into());
        assert!(db.update_patient(&record).unwrap());

        let retrieved = db.get_patient("PAT-1").unwrap().unwrap();
        assert_eq!(retrieved.patient_name, "Renamed");
        assert_eq!(retrieved.mrn.as_deref(), Some("2025-KRB-00001"));
    }

    #[test]
    fn test_find_mrn_holder_excludes_self() {
        let db = setup_db();
        db.insert_patient(&patient("PAT-1", Some("2025-KRB-00001")))
            .unwrap();

        assert_eq!(
            db.find_mrn_holder("2025-KRB-00001", "PAT-2").unwrap(),
            Some("PAT-1".to_string())
        );
        assert_eq!(db.find_mrn_holder("2025-KRB-00001", "PAT-1").unwrap(), None);
        assert_eq!(db.find_mrn_holder("2025-KRB-00002", "PAT-2").unwrap(), None);
    }

    #[test]
    fn test_mrn_lookups_ignore_case() {
        let db = setup_db();
        db.insert_patient(&patient("PAT-1", Some("2025-krb-00001")))
            .unwrap();

        assert_eq!(
            db.find_mrn_holder("2025-KRB-00001", "PAT-2").unwrap(),
            Some("PAT-1".to_string())
        );
        let by_mrn = db.get_patient_by_mrn("2025-KRB-00001").unwrap().unwrap();
        assert_eq!(by_mrn.patient_id, "PAT-1");

        let err = db
            .insert_patient(&patient("PAT-2", Some("2025-KRB-00001")))
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_unknown_facility_rejected() {
        let db = setup_db();
        let mut record = patient("PAT-1", None);
        record.facility_id = Some("HOSP-NOPE".into());
        let err = db.insert_patient(&record).unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_list_by_facility() {
        let db = setup_db();
        db.insert_patient(&patient("PAT-2", Some("2025-KRB-00002")))
            .unwrap();
        db.insert_patient(&patient("PAT-1", Some("2025-KRB-00001")))
            .unwrap();

        let ids: Vec<String> = db
            .list_patients_by_facility("HOSP-KRB")
            .unwrap()
            .into_iter()
            .map(|p| p.patient_id)
            .collect();
        assert_eq!(ids, vec!["PAT-1", "PAT-2"]);
    }
}
