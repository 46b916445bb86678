//! Core data types for recorded weather observations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::units::UnitError;
use crate::{AnalysisError, AnalysisResult};

/// Observation timestamp (UTC)
pub type Timestamp = DateTime<Utc>;

/// Temperature unit system, named after the upstream API's `units` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    /// Degrees Celsius
    Metric,
    /// Degrees Fahrenheit
    #[default]
    Imperial,
}

impl TemperatureUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemperatureUnit::Metric => "metric",
            TemperatureUnit::Imperial => "imperial",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Metric => "°C",
            TemperatureUnit::Imperial => "°F",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemperatureUnit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" | "c" | "celsius" => Ok(TemperatureUnit::Metric),
            "imperial" | "f" | "fahrenheit" => Ok(TemperatureUnit::Imperial),
            other => Err(UnitError::UnknownUnit(other.to_string())),
        }
    }
}

/// A single recorded weather reading for a city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// City name as reported by the weather service
    pub city: String,

    /// When the reading was taken
    pub timestamp: Timestamp,

    /// Temperature in `unit`
    pub temperature: f64,

    /// Unit system of `temperature`
    pub unit: TemperatureUnit,

    /// Weather-state label ("Rain", "Clear", ...)
    pub condition: String,
}

impl Observation {
    pub fn new(
        city: impl Into<String>,
        timestamp: Timestamp,
        temperature: f64,
        unit: TemperatureUnit,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            city: city.into(),
            timestamp,
            temperature,
            unit,
            condition: condition.into(),
        }
    }
}

/// Observations ordered by timestamp ascending
///
/// The ordering invariant is checked on construction, so analysis code can
/// rely on position order matching time order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Observation>", into = "Vec<Observation>")]
pub struct ObservationSet {
    observations: Vec<Observation>,
}

impl ObservationSet {
    /// Build a set, rejecting sequences that go backwards in time
    pub fn new(observations: Vec<Observation>) -> AnalysisResult<Self> {
        if let Some(index) = observations
            .windows(2)
            .position(|pair| pair[1].timestamp < pair[0].timestamp)
        {
            return Err(AnalysisError::OutOfOrder { index: index + 1 });
        }
        Ok(Self { observations })
    }

    /// Build a set from observations in any order (stable sort by timestamp)
    pub fn from_unordered(mut observations: Vec<Observation>) -> Self {
        observations.sort_by_key(|o| o.timestamp);
        Self { observations }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn as_slice(&self) -> &[Observation] {
        &self.observations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    pub fn into_vec(self) -> Vec<Observation> {
        self.observations
    }

    pub fn first(&self) -> Option<&Observation> {
        self.observations.first()
    }

    pub fn last(&self) -> Option<&Observation> {
        self.observations.last()
    }

    /// The most recent `n` observations (all of them if fewer)
    pub fn recent(&self, n: usize) -> &[Observation] {
        let start = self.observations.len().saturating_sub(n);
        &self.observations[start..]
    }

    /// Temperature values in order
    pub fn temperatures(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.temperature).collect()
    }

    /// The single unit shared by every observation, `None` for an empty set
    pub fn unit(&self) -> AnalysisResult<Option<TemperatureUnit>> {
        common_unit(&self.observations)
    }
}

impl TryFrom<Vec<Observation>> for ObservationSet {
    type Error = AnalysisError;

    fn try_from(observations: Vec<Observation>) -> Result<Self, Self::Error> {
        Self::new(observations)
    }
}

impl From<ObservationSet> for Vec<Observation> {
    fn from(set: ObservationSet) -> Self {
        set.observations
    }
}

impl<'a> IntoIterator for &'a ObservationSet {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}

impl IntoIterator for ObservationSet {
    type Item = Observation;
    type IntoIter = std::vec::IntoIter<Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.into_iter()
    }
}

/// Check that every observation in `observations` uses the same unit
pub(crate) fn common_unit(observations: &[Observation]) -> AnalysisResult<Option<TemperatureUnit>> {
    let mut iter = observations.iter();
    let expected = match iter.next() {
        Some(first) => first.unit,
        None => return Ok(None),
    };
    match iter.find(|o| o.unit != expected) {
        Some(other) => Err(AnalysisError::UnitMismatch {
            expected,
            found: other.unit,
        }),
        None => Ok(Some(expected)),
    }
}

/// Count of one weather condition within a summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionCount {
    pub condition: String,
    pub count: usize,
}

/// Aggregate temperature statistics over an observation set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    pub min_temp: f64,
    pub max_temp: f64,
    pub avg_temp: f64,
    pub unit: TemperatureUnit,
    /// Number of observations summarized
    pub count: usize,
    /// Condition tallies in first-occurrence order
    pub condition_counts: Vec<ConditionCount>,
}

impl StatisticsSummary {
    /// Most frequent condition; ties go to the one seen first
    pub fn most_common_condition(&self) -> Option<&str> {
        let mut best: Option<&ConditionCount> = None;
        for entry in &self.condition_counts {
            if best.map_or(true, |b| entry.count > b.count) {
                best = Some(entry);
            }
        }
        best.map(|b| b.condition.as_str())
    }

    pub fn count_for(&self, condition: &str) -> usize {
        self.condition_counts
            .iter()
            .find(|c| c.condition == condition)
            .map_or(0, |c| c.count)
    }
}

/// Direction of temperature change over a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    Rising,
    Falling,
    Stable,
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendLabel::Rising => f.write_str("rising"),
            TrendLabel::Falling => f.write_str("falling"),
            TrendLabel::Stable => f.write_str("stable"),
        }
    }
}

/// Outcome of a trend fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    /// Least-squares slope in temperature units per observation
    pub slope: f64,
    pub label: TrendLabel,
    /// Number of observations the fit actually used
    pub window_size: usize,
    pub unit: TemperatureUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_note: Option<String>,
}
