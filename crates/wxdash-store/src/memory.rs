//! In-memory history backend
//!
//! Useful for tests and runs that do not need to survive a restart.

use crate::{validate, HistoryQuery, HistoryStore, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use wxdash_core::{Observation, ObservationSet, Timestamp};

#[derive(Debug, Default)]
pub struct MemoryHistory {
    observations: RwLock<Vec<Observation>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, Vec<Observation>>> {
        self.observations
            .read()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, Vec<Observation>>> {
        self.observations
            .write()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&self, observation: &Observation) -> StorageResult<()> {
        validate(observation)?;
        self.write()?.push(observation.clone());
        Ok(())
    }

    fn append_all(&self, observations: &[Observation]) -> StorageResult<usize> {
        for observation in observations {
            validate(observation)?;
        }
        self.write()?.extend_from_slice(observations);
        Ok(observations.len())
    }

    fn query(&self, query: &HistoryQuery) -> StorageResult<ObservationSet> {
        let matched: Vec<Observation> = self
            .read()?
            .iter()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();

        // Stable sort keeps insertion order among equal timestamps
        let mut set = ObservationSet::from_unordered(matched).into_vec();
        if let Some(limit) = query.limit {
            let excess = set.len().saturating_sub(limit);
            set.drain(..excess);
        }
        Ok(ObservationSet::from_unordered(set))
    }

    fn count(&self) -> StorageResult<u64> {
        Ok(self.read()?.len() as u64)
    }

    fn cities(&self) -> StorageResult<Vec<String>> {
        // Keyed case-insensitively; the first spelling appended wins
        let mut cities: BTreeMap<String, String> = BTreeMap::new();
        for o in self.read()?.iter() {
            cities
                .entry(o.city.to_ascii_lowercase())
                .or_insert_with(|| o.city.clone());
        }
        Ok(cities.into_values().collect())
    }

    fn clear(&self) -> StorageResult<u64> {
        let mut observations = self.write()?;
        let deleted = observations.len() as u64;
        observations.clear();
        Ok(deleted)
    }

    fn delete_before(&self, cutoff: Timestamp) -> StorageResult<u64> {
        let mut observations = self.write()?;
        let before = observations.len();
        observations.retain(|o| o.timestamp >= cutoff);
        Ok((before - observations.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;

    #[test]
    fn test_conformance() {
        conformance::run_all(MemoryHistory::new);
    }
}
