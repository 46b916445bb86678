use crate::schema::{self, format_timestamp, HistoryRow};
use crate::{validate, HistoryQuery, HistoryStore, StorageError, StorageResult};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, instrument};
use wxdash_core::{Observation, ObservationSet, Timestamp};

const INSERT: &str = "INSERT INTO weather_history (city, timestamp, temperature, unit, condition)
     VALUES (?1, ?2, ?3, ?4, ?5)";

/// SQLite-backed observation history
///
/// `rusqlite::Connection` is not `Sync`, so every call goes through a mutex.
pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    /// Open or create the database at `path`, creating parent directories
    #[instrument(skip_all)]
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::migrate(&conn)?;

        info!(path = %path.display(), "Opened observation history");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }
}

fn insert(conn: &Connection, observation: &Observation) -> StorageResult<()> {
    let mut stmt = conn.prepare_cached(INSERT)?;
    stmt.execute(params![
        observation.city,
        format_timestamp(&observation.timestamp),
        observation.temperature,
        observation.unit.as_str(),
        observation.condition,
    ])?;
    Ok(())
}

impl HistoryStore for SqliteHistory {
    #[instrument(skip(self, observation), fields(city = %observation.city))]
    fn append(&self, observation: &Observation) -> StorageResult<()> {
        validate(observation)?;
        let conn = self.lock()?;
        insert(&conn, observation)?;
        debug!(timestamp = %observation.timestamp, "Appended observation");
        Ok(())
    }

    #[instrument(skip_all, fields(count = observations.len()))]
    fn append_all(&self, observations: &[Observation]) -> StorageResult<usize> {
        for observation in observations {
            validate(observation)?;
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for observation in observations {
            insert(&tx, observation)?;
        }
        tx.commit()?;

        debug!("Appended observation batch");
        Ok(observations.len())
    }

    #[instrument(skip(self))]
    fn query(&self, query: &HistoryQuery) -> StorageResult<ObservationSet> {
        // LIMIT -1 is unbounded in SQLite
        let limit = query
            .limit
            .map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let since = query.since.as_ref().map(format_timestamp);

        let sql = format!(
            "SELECT {cols} FROM (
                SELECT {cols} FROM weather_history
                WHERE (?1 IS NULL OR city = ?1 COLLATE NOCASE)
                  AND (?2 IS NULL OR timestamp >= ?2)
                ORDER BY timestamp DESC, id DESC
                LIMIT ?3
            )
            ORDER BY timestamp ASC, id ASC",
            cols = HistoryRow::COLUMNS
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params![query.city, since, limit], HistoryRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let observations = rows
            .into_iter()
            .map(HistoryRow::into_observation)
            .collect::<StorageResult<Vec<_>>>()?;

        debug!(returned = observations.len(), "Queried history");
        Ok(ObservationSet::from_unordered(observations))
    }

    fn count(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM weather_history", [], |row| {
            row.get(0)
        })?;
        Ok(count as u64)
    }

    fn cities(&self) -> StorageResult<Vec<String>> {
        let conn = self.lock()?;
        // One row per case-folded name, spelled as first appended
        let mut stmt = conn.prepare_cached(
            "SELECT city FROM weather_history
             WHERE id IN (SELECT MIN(id) FROM weather_history GROUP BY city COLLATE NOCASE)
             ORDER BY city COLLATE NOCASE",
        )?;
        let cities = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(cities)
    }

    #[instrument(skip(self))]
    fn clear(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM weather_history", [])?;
        info!(deleted, "Cleared observation history");
        Ok(deleted as u64)
    }

    #[instrument(skip(self))]
    fn delete_before(&self, cutoff: Timestamp) -> StorageResult<u64> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM weather_history WHERE timestamp < ?1",
            params![format_timestamp(&cutoff)],
        )?;
        info!(deleted, "Pruned observation history");
        Ok(deleted as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::{self, obs};

    #[test]
    fn test_conformance() {
        conformance::run_all(|| SqliteHistory::in_memory().unwrap());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("data").join("weather_app.db");

        {
            let store = SqliteHistory::open(&db_path).unwrap();
            store.append(&obs("Seattle", 0, 60.0)).unwrap();
            store.append(&obs("Seattle", 60, 62.0)).unwrap();
        }

        assert!(db_path.exists());
        let reopened = SqliteHistory::open(&db_path).unwrap();
        assert_eq!(reopened.count().unwrap(), 2);
        let set = reopened.query(&HistoryQuery::new().city("Seattle")).unwrap();
        assert_eq!(set.temperatures(), vec![60.0, 62.0]);
    }

    #[test]
    fn test_corrupt_row_surfaces() {
        let store = SqliteHistory::in_memory().unwrap();
        store.append(&obs("Seattle", 0, 60.0)).unwrap();
        store
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO weather_history (city, timestamp, temperature, unit, condition)
                 VALUES ('Seattle', '2024-01-01T00:00:00.000000000Z', 61.0, 'kelvin', 'Clear')",
                [],
            )
            .unwrap();

        assert!(matches!(
            store.query(&HistoryQuery::new()),
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn test_concurrent_appends() {
        let store = std::sync::Arc::new(SqliteHistory::in_memory().unwrap());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store.append(&obs("Seattle", t * 100 + i, i as f64)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.count().unwrap(), 100);
    }
}
