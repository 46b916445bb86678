//! Temperature trend detection by ordinary least squares
//!
//! Each observation's position in the window is the independent variable and
//! its temperature the dependent one, so the slope is measured in temperature
//! units per observation.

use crate::types::{common_unit, ObservationSet, TrendLabel, TrendResult};
use crate::{AnalysisError, AnalysisResult};

/// Slopes within ±this many units per observation count as stable
pub const DEFAULT_SENSITIVITY: f64 = 0.1;

/// Observations considered when the caller does not pick a window
pub const DEFAULT_WINDOW: usize = 10;

/// A line needs two points
pub const MIN_TREND_OBSERVATIONS: usize = 2;

/// Classifies the slope of recent temperatures as rising, falling or stable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendDetector {
    sensitivity: f64,
}

impl Default for TrendDetector {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
        }
    }
}

impl TrendDetector {
    /// Create a detector with sensitivity `epsilon` (finite, non-negative)
    pub fn new(sensitivity: f64) -> AnalysisResult<Self> {
        if !sensitivity.is_finite() || sensitivity < 0.0 {
            return Err(AnalysisError::InvalidParameter(format!(
                "trend sensitivity must be a finite non-negative number, got {}",
                sensitivity
            )));
        }
        Ok(Self { sensitivity })
    }

    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    pub fn classify(&self, slope: f64) -> TrendLabel {
        if slope > self.sensitivity {
            TrendLabel::Rising
        } else if slope < -self.sensitivity {
            TrendLabel::Falling
        } else {
            TrendLabel::Stable
        }
    }

    /// Fit the most recent `window` observations (all of them if fewer)
    pub fn detect(&self, observations: &ObservationSet, window: usize) -> AnalysisResult<TrendResult> {
        let recent = observations.recent(window);

        if recent.len() < MIN_TREND_OBSERVATIONS {
            return Err(AnalysisError::InsufficientData {
                operation: "detect",
                required: MIN_TREND_OBSERVATIONS,
                available: recent.len(),
            });
        }

        let unit = common_unit(recent)?.ok_or(AnalysisError::InsufficientData {
            operation: "detect",
            required: MIN_TREND_OBSERVATIONS,
            available: 0,
        })?;

        if let Some(index) = recent.iter().position(|o| !o.temperature.is_finite()) {
            return Err(AnalysisError::NonFiniteTemperature {
                index: observations.len() - recent.len() + index,
            });
        }

        let temperatures: Vec<f64> = recent.iter().map(|o| o.temperature).collect();
        let window_note = (recent.len() < window).then(|| {
            format!(
                "window of {} requested, only {} observations available",
                window,
                recent.len()
            )
        });

        let result = match least_squares_slope(&temperatures) {
            Some(slope) => TrendResult {
                slope,
                label: self.classify(slope),
                window_size: recent.len(),
                unit,
                confidence_note: window_note,
            },
            None => TrendResult {
                slope: 0.0,
                label: TrendLabel::Stable,
                window_size: recent.len(),
                unit,
                confidence_note: Some(match window_note {
                    Some(note) => format!("degenerate fit (zero variance in x); {}", note),
                    None => "degenerate fit (zero variance in x)".to_string(),
                }),
            },
        };

        Ok(result)
    }
}

/// OLS slope of `values` against their indices 0, 1, 2, ...
///
/// `slope = (n·Σxy − Σx·Σy) / (n·Σx² − (Σx)²)`. Returns `None` when the
/// denominator vanishes.
///
/// y is taken relative to the first value; the slope is unchanged and a
/// constant series sums to exactly zero.
pub fn least_squares_slope(values: &[f64]) -> Option<f64> {
    let n = values.len() as f64;
    let origin = values.first().copied().unwrap_or(0.0);
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;

    for (i, &value) in values.iter().enumerate() {
        let x = i as f64;
        let y = value - origin;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return None;
    }

    Some((n * sum_xy - sum_x * sum_y) / denominator)
}
