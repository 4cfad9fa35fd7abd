//! Facility database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::Facility;

const FACILITY_COLUMNS: &str = "facility_id, name, code, active, created_at, updated_at";

fn facility_from_row(row: &Row<'_>) -> rusqlite::Result<Facility> {
    Ok(Facility {
        facility_id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        active: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl Database {
    /// Insert a new facility. The code is stored exactly as given.
    pub fn insert_facility(&self, facility: &Facility) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO facilities (facility_id, name, code, active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                facility.facility_id,
                facility.name,
                facility.code,
                facility.active,
                facility.created_at,
                facility.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update name, code and active flag of an existing facility.
    pub fn update_facility(&self, facility: &Facility) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE facilities SET
                name = ?2,
                code = ?3,
                active = ?4,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE facility_id = ?1
            "#,
            params![
                facility.facility_id,
                facility.name,
                facility.code,
                facility.active,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Activate or deactivate a facility.
    pub fn set_facility_active(&self, facility_id: &str, active: bool) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE facilities SET active = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE facility_id = ?1",
            params![facility_id, active],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a facility by ID.
    pub fn get_facility(&self, facility_id: &str) -> DbResult<Option<Facility>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM facilities WHERE facility_id = ?",
                    FACILITY_COLUMNS
                ),
                [facility_id],
                facility_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get a facility by its (normalized) code.
    pub fn get_facility_by_code(&self, code: &str) -> DbResult<Option<Facility>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM facilities WHERE upper(trim(code)) = upper(trim(?))",
                    FACILITY_COLUMNS
                ),
                [code],
                facility_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// First active facility by creation time.
    pub fn first_active_facility(&self) -> DbResult<Option<Facility>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM facilities WHERE active = 1 ORDER BY created_at, rowid LIMIT 1",
                    FACILITY_COLUMNS
                ),
                [],
                facility_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List facilities ordered by creation time.
    pub fn list_facilities(&self, active_only: bool) -> DbResult<Vec<Facility>> {
        let sql = if active_only {
            format!(
                "SELECT {} FROM facilities WHERE active = 1 ORDER BY created_at, rowid",
                FACILITY_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM facilities ORDER BY created_at, rowid",
                FACILITY_COLUMNS
            )
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], facility_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
