//! Combined statistics and trend view for one city

use serde::{Deserialize, Serialize};
use wxdash_core::{StatisticsSummary, TrendResult};

/// Trend half of a [`HistoryReport`]
///
/// A city with a single observation still has statistics, so a missing trend
/// is part of the report rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrendOutcome {
    Detected(TrendResult),
    InsufficientData { available: usize, required: usize },
}

impl TrendOutcome {
    pub fn result(&self) -> Option<&TrendResult> {
        match self {
            TrendOutcome::Detected(result) => Some(result),
            TrendOutcome::InsufficientData { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryReport {
    pub city: String,
    pub summary: StatisticsSummary,
    pub trend: TrendOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wxdash_core::{TemperatureUnit, TrendLabel};

    #[test]
    fn test_outcome_serialization() {
        let detected = TrendOutcome::Detected(TrendResult {
            slope: 2.0,
            label: TrendLabel::Rising,
            window_size: 4,
            unit: TemperatureUnit::Imperial,
            confidence_note: None,
        });
        let json = serde_json::to_value(&detected).unwrap();
        assert_eq!(json["status"], "detected");
        assert_eq!(json["label"], "rising");
        assert_eq!(json["slope"], 2.0);

        let missing = TrendOutcome::InsufficientData {
            available: 1,
            required: 2,
        };
        let json = serde_json::to_value(&missing).unwrap();
        assert_eq!(json["status"], "insufficient_data");
        assert_eq!(json["available"], 1);
        assert!(missing.result().is_none());
    }
}
