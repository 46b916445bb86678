//! Statistics aggregation over observation sets

use crate::types::{ConditionCount, Observation, ObservationSet, StatisticsSummary, TemperatureUnit};
use crate::{AnalysisError, AnalysisResult};
use std::collections::HashMap;

/// Single-pass accumulator for temperature extremes, mean and condition tally
#[derive(Debug, Clone, Default)]
pub struct StatsAccumulator {
    unit: Option<TemperatureUnit>,
    min: f64,
    max: f64,
    sum: f64,
    count: usize,
    conditions: Vec<ConditionCount>,
    positions: HashMap<String, usize>,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observation into the running totals
    pub fn add(&mut self, observation: &Observation) -> AnalysisResult<()> {
        if !observation.temperature.is_finite() {
            return Err(AnalysisError::NonFiniteTemperature { index: self.count });
        }

        match self.unit {
            None => {
                self.unit = Some(observation.unit);
                self.min = observation.temperature;
                self.max = observation.temperature;
            }
            Some(expected) if expected != observation.unit => {
                return Err(AnalysisError::UnitMismatch {
                    expected,
                    found: observation.unit,
                });
            }
            Some(_) => {
                self.min = self.min.min(observation.temperature);
                self.max = self.max.max(observation.temperature);
            }
        }

        self.sum += observation.temperature;
        self.count += 1;

        match self.positions.get(&observation.condition) {
            Some(&pos) => self.conditions[pos].count += 1,
            None => {
                self.positions
                    .insert(observation.condition.clone(), self.conditions.len());
                self.conditions.push(ConditionCount {
                    condition: observation.condition.clone(),
                    count: 1,
                });
            }
        }

        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn finish(self) -> AnalysisResult<StatisticsSummary> {
        let unit = match self.unit {
            Some(unit) if self.count > 0 => unit,
            _ => {
                return Err(AnalysisError::InsufficientData {
                    operation: "summarize",
                    required: 1,
                    available: 0,
                })
            }
        };

        Ok(StatisticsSummary {
            min_temp: self.min,
            max_temp: self.max,
            avg_temp: self.sum / self.count as f64,
            unit,
            count: self.count,
            condition_counts: self.conditions,
        })
    }
}

/// Summarize an observation set
///
/// Fails with [`AnalysisError::InsufficientData`] on an empty set and with
/// [`AnalysisError::UnitMismatch`] when the set mixes metric and imperial
/// readings. Normalize with [`crate::units::normalize`] first if mixing is
/// intended.
pub fn summarize(observations: &ObservationSet) -> AnalysisResult<StatisticsSummary> {
    let mut acc = StatsAccumulator::new();
    for observation in observations {
        acc.add(observation)?;
    }
    acc.finish()
}
