//! Durable history of weather observations
//!
//! [`HistoryStore`] is the seam between the analysis layer and whatever keeps
//! the observations. Two backends ship with the crate: [`SqliteHistory`]
//! (behind the default `sqlite` feature) and [`MemoryHistory`].

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryHistory;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteHistory;

use chrono::Datelike;
use thiserror::Error;
use wxdash_core::{Observation, ObservationSet, Timestamp};

#[derive(Debug, Error)]
pub enum StorageError {
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt history data: {0}")]
    Corrupt(String),

    #[error("Invalid observation: {0}")]
    InvalidObservation(String),

    #[error("Unsupported schema version {found} (this build supports up to {supported})")]
    UnsupportedSchema { found: i32, supported: i32 },

    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Filters for [`HistoryStore::query`]; `None` means no restriction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryQuery {
    /// Matched case-insensitively (ASCII folding)
    pub city: Option<String>,
    /// Keep only the most recent `limit` matches
    pub limit: Option<usize>,
    /// Inclusive lower bound on timestamp
    pub since: Option<Timestamp>,
}

impl HistoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn since(mut self, since: Timestamp) -> Self {
        self.since = Some(since);
        self
    }

    /// Whether `observation` passes the city and `since` filters
    pub fn matches(&self, observation: &Observation) -> bool {
        let city_ok = self
            .city
            .as_deref()
            .map_or(true, |city| city.eq_ignore_ascii_case(&observation.city));
        let since_ok = self.since.map_or(true, |since| observation.timestamp >= since);
        city_ok && since_ok
    }
}

/// Append-only observation history
///
/// Results of [`query`](HistoryStore::query) are ordered by timestamp
/// ascending, ties broken by insertion order.
pub trait HistoryStore: Send + Sync {
    fn append(&self, observation: &Observation) -> StorageResult<()>;

    /// Append a batch; either every observation is stored or none is
    fn append_all(&self, observations: &[Observation]) -> StorageResult<usize>;

    fn query(&self, query: &HistoryQuery) -> StorageResult<ObservationSet>;

    fn count(&self) -> StorageResult<u64>;

    /// Distinct city names, sorted
    fn cities(&self) -> StorageResult<Vec<String>>;

    /// Remove everything, returning the number of observations deleted
    fn clear(&self) -> StorageResult<u64>;

    /// Remove observations strictly older than `cutoff`
    fn delete_before(&self, cutoff: Timestamp) -> StorageResult<u64>;
}

/// Reject observations that could not be read back faithfully
pub(crate) fn validate(observation: &Observation) -> StorageResult<()> {
    if !observation.temperature.is_finite() {
        return Err(StorageError::InvalidObservation(format!(
            "temperature for {} at {} is not finite",
            observation.city, observation.timestamp
        )));
    }
    let year = observation.timestamp.year();
    if !(0..=9999).contains(&year) {
        return Err(StorageError::InvalidObservation(format!(
            "timestamp {} is outside years 0000-9999",
            observation.timestamp
        )));
    }
    if observation.city.trim().is_empty() {
        return Err(StorageError::InvalidObservation(
            "city must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Behaviour every backend must share
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use wxdash_core::TemperatureUnit;

    pub fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    pub fn obs(city: &str, secs: i64, temp: f64) -> Observation {
        Observation::new(city, at(secs), temp, TemperatureUnit::Imperial, "Clear")
    }

    fn temps(set: &ObservationSet) -> Vec<f64> {
        set.temperatures()
    }

    pub fn round_trip(store: &dyn HistoryStore) {
        let original = Observation::new(
            "Reykjavík",
            Utc.timestamp_opt(1_705_320_000, 123_456_789).unwrap(),
            -7.3,
            TemperatureUnit::Metric,
            "Snow",
        );
        store.append(&original).unwrap();

        let result = store.query(&HistoryQuery::new().city("Reykjavík")).unwrap();
        assert_eq!(result.len(), 1);
        let stored = &result.as_slice()[0];
        assert_eq!(stored, &original);
        assert_eq!(stored.temperature.to_bits(), original.temperature.to_bits());
    }

    pub fn ordered_by_timestamp(store: &dyn HistoryStore) {
        store.append(&obs("Seattle", 30, 3.0)).unwrap();
        store.append(&obs("Seattle", 10, 1.0)).unwrap();
        store.append(&obs("Seattle", 20, 2.0)).unwrap();
        store.append(&obs("Seattle", 20, 2.5)).unwrap();

        let all = store.query(&HistoryQuery::new()).unwrap();
        assert_eq!(temps(&all), vec![1.0, 2.0, 2.5, 3.0]);
    }

    pub fn city_filter(store: &dyn HistoryStore) {
        store.append(&obs("Seattle", 1, 60.0)).unwrap();
        store.append(&obs("Boston", 2, 40.0)).unwrap();
        store.append(&obs("SEATTLE", 3, 62.0)).unwrap();

        let seattle = store.query(&HistoryQuery::new().city("seattle")).unwrap();
        assert_eq!(temps(&seattle), vec![60.0, 62.0]);

        let nowhere = store.query(&HistoryQuery::new().city("Atlantis")).unwrap();
        assert!(nowhere.is_empty());
    }

    pub fn limit_keeps_most_recent(store: &dyn HistoryStore) {
        for i in 0..5 {
            store.append(&obs("Seattle", i * 60, i as f64)).unwrap();
        }

        let last_two = store.query(&HistoryQuery::new().limit(2)).unwrap();
        assert_eq!(temps(&last_two), vec![3.0, 4.0]);

        let none = store.query(&HistoryQuery::new().limit(0)).unwrap();
        assert!(none.is_empty());

        let more = store.query(&HistoryQuery::new().limit(50)).unwrap();
        assert_eq!(more.len(), 5);
    }

    pub fn since_is_inclusive(store: &dyn HistoryStore) {
        for i in 0..4 {
            store.append(&obs("Seattle", i * 60, i as f64)).unwrap();
        }

        let result = store.query(&HistoryQuery::new().since(at(120))).unwrap();
        assert_eq!(temps(&result), vec![2.0, 3.0]);

        let combined = store
            .query(&HistoryQuery::new().city("Seattle").since(at(60)).limit(1))
            .unwrap();
        assert_eq!(temps(&combined), vec![3.0]);
    }

    pub fn rejects_invalid(store: &dyn HistoryStore) {
        assert!(matches!(
            store.append(&obs("Seattle", 0, f64::NAN)),
            Err(StorageError::InvalidObservation(_))
        ));
        assert!(matches!(
            store.append(&obs("  ", 0, 1.0)),
            Err(StorageError::InvalidObservation(_))
        ));

        let batch = vec![obs("Seattle", 0, 1.0), obs("Seattle", 1, f64::INFINITY)];
        assert!(store.append_all(&batch).is_err());
        assert_eq!(store.count().unwrap(), 0);

        // Years that RFC 3339 cannot represent must not reach the table
        store.append(&obs("Seattle", 0, 1.0)).unwrap();
        for year in [-1, 10_000] {
            let mut far = obs("Seattle", 0, 2.0);
            far.timestamp = Utc.with_ymd_and_hms(year, 6, 1, 0, 0, 0).unwrap();
            assert!(matches!(
                store.append(&far),
                Err(StorageError::InvalidObservation(_))
            ));
        }
        let mut edge = obs("Seattle", 0, 3.0);
        edge.timestamp = Utc.with_ymd_and_hms(0, 1, 1, 0, 0, 0).unwrap();
        store.append(&edge).unwrap();
        assert_eq!(
            temps(&store.query(&HistoryQuery::new()).unwrap()),
            vec![3.0, 1.0]
        );
    }

    pub fn cities_fold_case(store: &dyn HistoryStore) {
        store.append(&obs("Seattle", 0, 1.0)).unwrap();
        store.append(&obs("SEATTLE", 60, 2.0)).unwrap();
        store.append(&obs("austin", 120, 3.0)).unwrap();
        store.append(&obs("Austin", 180, 4.0)).unwrap();

        assert_eq!(store.cities().unwrap(), vec!["austin", "Seattle"]);
        assert_eq!(
            store.query(&HistoryQuery::new().city("seattle")).unwrap().len(),
            2
        );
    }

    pub fn batch_append(store: &dyn HistoryStore) {
        let batch: Vec<_> = (0..3).map(|i| obs("Oslo", i, i as f64)).collect();
        assert_eq!(store.append_all(&batch).unwrap(), 3);
        assert_eq!(store.count().unwrap(), 3);
    }

    pub fn maintenance(store: &dyn HistoryStore) {
        store.append(&obs("Seattle", 0, 1.0)).unwrap();
        store.append(&obs("Boston", 60, 2.0)).unwrap();
        store.append(&obs("Austin", 120, 3.0)).unwrap();
        store.append(&obs("Boston", 180, 4.0)).unwrap();

        assert_eq!(store.cities().unwrap(), vec!["Austin", "Boston", "Seattle"]);

        let cutoff = at(0) + Duration::seconds(120);
        assert_eq!(store.delete_before(cutoff).unwrap(), 2);
        assert_eq!(temps(&store.query(&HistoryQuery::new()).unwrap()), vec![3.0, 4.0]);

        assert_eq!(store.clear().unwrap(), 2);
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.cities().unwrap().is_empty());
    }

    pub fn run_all<S: HistoryStore>(make: impl Fn() -> S) {
        round_trip(&make());
        ordered_by_timestamp(&make());
        city_filter(&make());
        limit_keeps_most_recent(&make());
        since_is_inclusive(&make());
        rejects_invalid(&make());
        batch_append(&make());
        maintenance(&make());
        cities_fold_case(&make());
    }
}
