//! MRN sequence counter database operations.
//!
//! Writers are expected to hold the write lock (see
//! [`Database::write_transaction`]) so a read followed by a bump cannot
//! interleave with another connection.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::SequenceCounter;

fn counter_from_row(row: &Row<'_>) -> rusqlite::Result<SequenceCounter> {
    Ok(SequenceCounter {
        facility_code: row.get(0)?,
        year: row.get(1)?,
        current_value: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl Database {
    /// Advance the counter for (code, year) and return the new value.
    ///
    /// A missing row is created holding 1. The upsert is a single statement,
    /// so two connections racing on a brand-new key cannot both insert.
    pub fn bump_sequence(&self, facility_code: &str, year: i32) -> DbResult<u32> {
        self.conn
            .query_row(
                r#"
                INSERT INTO mrn_sequences (facility_code, year, current_value)
                VALUES (?1, ?2, 1)
                ON CONFLICT(facility_code, year) DO UPDATE SET
                    current_value = current_value + 1,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                RETURNING current_value
                "#,
                params![facility_code, year],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Raise the counter for (code, year) to at least `value`; never lowers it.
    ///
    /// Returns the counter value after the call.
    pub fn seed_sequence(&self, facility_code: &str, year: i32, value: u32) -> DbResult<u32> {
        self.conn
            .query_row(
                r#"
                INSERT INTO mrn_sequences (facility_code, year, current_value)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(facility_code, year) DO UPDATE SET
                    current_value = max(current_value, excluded.current_value),
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                RETURNING current_value
                "#,
                params![facility_code, year, value],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Current counter value; 0 when nothing has been issued for the key.
    pub fn sequence_value(&self, facility_code: &str, year: i32) -> DbResult<u32> {
        let value: Option<u32> = self
            .conn
            .query_row(
                "SELECT current_value FROM mrn_sequences WHERE facility_code = ?1 AND year = ?2",
                params![facility_code, year],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.unwrap_or(0))
    }

    /// Get a counter row.
    pub fn get_sequence(&self, facility_code: &str, year: i32) -> DbResult<Option<SequenceCounter>> {
        self.conn
            .query_row(
                r#"
                SELECT facility_code, year, current_value, created_at, updated_at
                FROM mrn_sequences
                WHERE facility_code = ?1 AND year = ?2
                "#,
                params![facility_code, year],
                counter_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// All counters ordered by facility code, then year.
    pub fn list_sequences(&self) -> DbResult<Vec<SequenceCounter>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT facility_code, year, current_value, created_at, updated_at
            FROM mrn_sequences
            ORDER BY facility_code, year
            "#,
        )?;
        let rows = stmt.query_map([], counter_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_bump_creates_then_increments() {
        let db = setup_db();

        assert_eq!(db.sequence_value("KRB", 2025).unwrap(), 0);
        assert_eq!(db.bump_sequence("KRB", 2025).unwrap(), 1);
        assert_eq!(db.bump_sequence("KRB", 2025).unwrap(), 2);
        assert_eq!(db.bump_sequence("KRB", 2025).unwrap(), 3);
        assert_eq!(db.sequence_value("KRB", 2025).unwrap(), 3);
    }

    #[test]
    fn test_keys_are_independent() {
        let db = setup_db();

        db.bump_sequence("KRB", 2025).unwrap();
        db.bump_sequence("KRB", 2025).unwrap();

        assert_eq!(db.bump_sequence("KRB", 2026).unwrap(), 1);
        assert_eq!(db.bump_sequence("NJF", 2025).unwrap(), 1);
        assert_eq!(db.sequence_value("KRB", 2025).unwrap(), 2);
    }

    #[test]
    fn test_seed_never_lowers() {
        let db = setup_db();

        assert_eq!(db.seed_sequence("KRB", 2025, 120).unwrap(), 120);
        assert_eq!(db.seed_sequence("KRB", 2025, 50).unwrap(), 120);
        assert_eq!(db.bump_sequence("KRB", 2025).unwrap(), 121);
    }

    #[test]
    fn test_get_and_list() {
        let db = setup_db();

        db.bump_sequence("NJF", 2025).unwrap();
        db.bump_sequence("KRB", 2026).unwrap();
        db.bump_sequence("KRB", 2025).unwrap();

        let counter = db.get_sequence("KRB", 2025).unwrap().unwrap();
        assert_eq!(counter.current_value, 1);
        assert!(counter.has_issued());
        assert!(db.get_sequence("BAG", 2025).unwrap().is_none());

        let keys: Vec<(String, i32)> = db
            .list_sequences()
            .unwrap()
            .into_iter()
            .map(|c| (c.facility_code, c.year))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("KRB".to_string(), 2025),
                ("KRB".to_string(), 2026),
                ("NJF".to_string(), 2025),
            ]
        );
    }

    #[test]
    fn test_bump_rolled_back_with_transaction() {
        let db = setup_db();
        db.bump_sequence("KRB", 2025).unwrap();

        {
            let _tx = db.immediate_transaction().unwrap();
            assert_eq!(db.bump_sequence("KRB", 2025).unwrap(), 2);
            // dropped without commit
        }

        assert_eq!(db.sequence_value("KRB", 2025).unwrap(), 1);
    }
}
