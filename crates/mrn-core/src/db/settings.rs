//! Key/value settings.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};

/// Settings key holding the default facility id.
pub const DEFAULT_FACILITY_KEY: &str = "default_facility";

impl Database {
    /// Read a setting; empty values count as unset.
    pub fn get_setting(&self, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value.filter(|v| !v.trim().is_empty()))
    }

    /// Write a setting.
    pub fn set_setting(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO settings (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// Default facility id stored in settings.
    pub fn default_facility_id(&self) -> DbResult<Option<String>> {
        self.get_setting(DEFAULT_FACILITY_KEY)
    }

    /// Store (or clear, with `None`) the default facility id.
    pub fn set_default_facility_id(&self, facility_id: Option<&str>) -> DbResult<()> {
        self.set_setting(DEFAULT_FACILITY_KEY, facility_id.unwrap_or(""))
    }
}
