//! Store-backed statistics and trend analysis

use crate::{AnalyzerResult, HistoryReport, TrendOutcome};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use wxdash_core::{
    normalize, summarize, AnalysisError, Observation, ObservationSet, StatisticsSummary,
    TemperatureUnit, Timestamp, TrendDetector, TrendResult, MIN_TREND_OBSERVATIONS,
};
use wxdash_store::{HistoryQuery, HistoryStore};

/// Records observations and answers statistics/trend questions about them
pub struct HistoryAnalyzer {
    store: Arc<dyn HistoryStore>,
    detector: TrendDetector,
    default_window: usize,
}

impl HistoryAnalyzer {
    /// Create an analyzer; `default_window` is used when a trend request does
    /// not name a window and must be at least 2
    pub fn new(
        store: Arc<dyn HistoryStore>,
        detector: TrendDetector,
        default_window: usize,
    ) -> AnalyzerResult<Self> {
        if default_window < MIN_TREND_OBSERVATIONS {
            return Err(AnalysisError::InvalidParameter(format!(
                "default trend window must be at least {}, got {}",
                MIN_TREND_OBSERVATIONS, default_window
            ))
            .into());
        }
        Ok(Self {
            store,
            detector,
            default_window,
        })
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    pub fn detector(&self) -> &TrendDetector {
        &self.detector
    }

    pub fn default_window(&self) -> usize {
        self.default_window
    }

    #[instrument(skip(self, observation), fields(city = %observation.city))]
    pub fn record(&self, observation: &Observation) -> AnalyzerResult<()> {
        self.store.append(observation)?;
        debug!(temperature = observation.temperature, "Recorded observation");
        Ok(())
    }

    pub fn record_all(&self, observations: &[Observation]) -> AnalyzerResult<usize> {
        Ok(self.store.append_all(observations)?)
    }

    pub fn history(&self, query: &HistoryQuery) -> AnalyzerResult<ObservationSet> {
        Ok(self.store.query(query)?)
    }

    pub fn cities(&self) -> AnalyzerResult<Vec<String>> {
        Ok(self.store.cities()?)
    }

    /// Summarize the observations selected by `query`
    ///
    /// Mixed units are an error unless `normalize_to` names a target unit.
    #[instrument(skip(self))]
    pub fn statistics(
        &self,
        query: &HistoryQuery,
        normalize_to: Option<TemperatureUnit>,
    ) -> AnalyzerResult<StatisticsSummary> {
        let set = self.load(query, normalize_to)?;
        Ok(summarize(&set)?)
    }

    /// Trend over the most recent `window` observations for `city`
    #[instrument(skip(self))]
    pub fn trend(
        &self,
        city: &str,
        window: Option<usize>,
        normalize_to: Option<TemperatureUnit>,
    ) -> AnalyzerResult<TrendResult> {
        let window = window.unwrap_or(self.default_window);
        let query = HistoryQuery::new().city(city).limit(window);
        let set = self.load(&query, normalize_to)?;

        let result = self.detector.detect(&set, window)?;
        info!(
            slope = result.slope,
            label = %result.label,
            window_size = result.window_size,
            "Detected trend"
        );
        Ok(result)
    }

    /// Statistics over the whole history of `city` plus the trend over its
    /// most recent `window` observations
    #[instrument(skip(self))]
    pub fn report(
        &self,
        city: &str,
        window: Option<usize>,
        normalize_to: Option<TemperatureUnit>,
    ) -> AnalyzerResult<HistoryReport> {
        let window = window.unwrap_or(self.default_window);
        let set = self.load(&HistoryQuery::new().city(city), normalize_to)?;
        let summary = summarize(&set)?;

        let trend = match self.detector.detect(&set, window) {
            Ok(result) => TrendOutcome::Detected(result),
            Err(AnalysisError::InsufficientData {
                required,
                available,
                ..
            }) => TrendOutcome::InsufficientData {
                available,
                required,
            },
            Err(e) => return Err(e.into()),
        };

        Ok(HistoryReport {
            city: city.to_string(),
            summary,
            trend,
        })
    }

    #[instrument(skip(self))]
    pub fn clear(&self) -> AnalyzerResult<u64> {
        Ok(self.store.clear()?)
    }

    #[instrument(skip(self))]
    pub fn prune_before(&self, cutoff: Timestamp) -> AnalyzerResult<u64> {
        Ok(self.store.delete_before(cutoff)?)
    }

    fn load(
        &self,
        query: &HistoryQuery,
        normalize_to: Option<TemperatureUnit>,
    ) -> AnalyzerResult<ObservationSet> {
        let set = self.store.query(query)?;
        Ok(match normalize_to {
            Some(unit) => normalize(&set, unit),
            None => set,
        })
    }
}
