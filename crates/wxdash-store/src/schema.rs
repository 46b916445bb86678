//! SQLite layout of the `weather_history` table
//!
//! Timestamps are stored as RFC 3339 text with nine fractional digits and a
//! `Z` suffix, so lexical order in SQL equals chronological order.

use crate::{StorageError, StorageResult};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::info;
use wxdash_core::{Observation, TemperatureUnit, Timestamp};

pub const TABLE_NAME: &str = "weather_history";

/// Stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: i32 = 1;

const CREATE_V1: &str = r#"
CREATE TABLE IF NOT EXISTS weather_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    city TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    temperature REAL NOT NULL,
    unit TEXT NOT NULL,
    condition TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_weather_history_city_ts
    ON weather_history (city COLLATE NOCASE, timestamp);
"#;

/// Bring `conn` up to [`SCHEMA_VERSION`]
pub fn migrate(conn: &Connection) -> StorageResult<()> {
    let found: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if found > SCHEMA_VERSION {
        return Err(StorageError::UnsupportedSchema {
            found,
            supported: SCHEMA_VERSION,
        });
    }

    if found < 1 {
        conn.execute_batch(CREATE_V1)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        info!(version = SCHEMA_VERSION, "Initialized {} schema", TABLE_NAME);
    }

    Ok(())
}

pub fn format_timestamp(timestamp: &Timestamp) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Raw `weather_history` row, before validation
#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub id: i64,
    pub city: String,
    pub timestamp: String,
    pub temperature: f64,
    pub unit: String,
    pub condition: String,
}

impl HistoryRow {
    /// Column order: id, city, timestamp, temperature, unit, condition
    pub const COLUMNS: &'static str = "id, city, timestamp, temperature, unit, condition";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            city: row.get(1)?,
            timestamp: row.get(2)?,
            temperature: row.get(3)?,
            unit: row.get(4)?,
            condition: row.get(5)?,
        })
    }

    pub fn into_observation(self) -> StorageResult<Observation> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| {
                StorageError::Corrupt(format!(
                    "row {}: bad timestamp {:?}: {}",
                    self.id, self.timestamp, e
                ))
            })?
            .with_timezone(&Utc);

        let unit: TemperatureUnit = self.unit.parse().map_err(|_| {
            StorageError::Corrupt(format!("row {}: bad unit {:?}", self.id, self.unit))
        })?;

        Ok(Observation {
            city: self.city,
            timestamp,
            temperature: self.temperature,
            unit,
            condition: self.condition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format_sorts_lexically() {
        let a = Utc.timestamp_opt(1_700_000_000, 5).unwrap();
        let b = Utc.timestamp_opt(1_700_000_000, 40_000_000).unwrap();
        let c = Utc.timestamp_opt(1_700_000_001, 0).unwrap();

        let (fa, fb, fc) = (format_timestamp(&a), format_timestamp(&b), format_timestamp(&c));
        assert_eq!(fa, "2023-11-14T22:13:20.000000005Z");
        assert!(fa < fb && fb < fc);
    }

    #[test]
    fn test_migrate_sets_version_and_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();

        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_migrate_refuses_newer_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        assert!(matches!(
            migrate(&conn),
            Err(StorageError::UnsupportedSchema { .. })
        ));
    }

    #[test]
    fn test_corrupt_row() {
        let row = HistoryRow {
            id: 7,
            city: "Oslo".into(),
            timestamp: "yesterday".into(),
            temperature: 1.0,
            unit: "metric".into(),
            condition: "Snow".into(),
        };
        match row.into_observation() {
            Err(StorageError::Corrupt(msg)) => assert!(msg.contains("row 7")),
            other => panic!("expected Corrupt, got {:?}", other),
        }
    }
}
