//! Temperature unit conversion
//!
//! Aggregation never converts on its own; callers that want to combine
//! readings taken in different unit systems normalize them here first.

use crate::types::{Observation, ObservationSet, TemperatureUnit};

/// Unit conversion error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnitError {
    #[error("Unknown temperature unit: {0}")]
    UnknownUnit(String),
}

/// F = C × 9/5 + 32
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// C = (F − 32) × 5/9
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Convert a temperature between unit systems
pub fn convert_temperature(value: f64, from: TemperatureUnit, to: TemperatureUnit) -> f64 {
    match (from, to) {
        (TemperatureUnit::Metric, TemperatureUnit::Imperial) => celsius_to_fahrenheit(value),
        (TemperatureUnit::Imperial, TemperatureUnit::Metric) => fahrenheit_to_celsius(value),
        _ => value,
    }
}

/// Copy of `observation` expressed in `target`
pub fn convert_observation(observation: &Observation, target: TemperatureUnit) -> Observation {
    Observation {
        temperature: convert_temperature(observation.temperature, observation.unit, target),
        unit: target,
        ..observation.clone()
    }
}

/// Express every observation in `target`, preserving order
pub fn normalize(observations: &ObservationSet, target: TemperatureUnit) -> ObservationSet {
    let converted: Vec<Observation> = observations
        .iter()
        .map(|o| convert_observation(o, target))
        .collect();
    // Conversion never touches timestamps, so the ordering invariant still holds.
    ObservationSet::from_unordered(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_temperature_conversion() {
        // F to C: 32F = 0C
        let result = convert_temperature(32.0, TemperatureUnit::Imperial, TemperatureUnit::Metric);
        assert!((result - 0.0).abs() < 0.001);

        // C to F: 0C = 32F
        let result = convert_temperature(0.0, TemperatureUnit::Metric, TemperatureUnit::Imperial);
        assert!((result - 32.0).abs() < 0.001);

        // C to F: 100C = 212F
        let result = convert_temperature(100.0, TemperatureUnit::Metric, TemperatureUnit::Imperial);
        assert!((result - 212.0).abs() < 0.001);

        // -40 is the same on both scales
        let result = convert_temperature(-40.0, TemperatureUnit::Imperial, TemperatureUnit::Metric);
        assert!((result + 40.0).abs() < 0.001);
    }

    #[test]
    fn test_same_unit_conversion() {
        let result = convert_temperature(25.0, TemperatureUnit::Metric, TemperatureUnit::Metric);
        assert_eq!(result, 25.0);
    }

    #[test]
    fn test_normalize_mixed_set() {
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let t1 = Utc.timestamp_opt(1_700_000_600, 0).unwrap();
        let set = ObservationSet::new(vec![
            Observation::new("Paris", t0, 10.0, TemperatureUnit::Metric, "Clouds"),
            Observation::new("Paris", t1, 59.0, TemperatureUnit::Imperial, "Clouds"),
        ])
        .unwrap();

        let normalized = normalize(&set, TemperatureUnit::Imperial);
        assert_eq!(normalized.unit(), Ok(Some(TemperatureUnit::Imperial)));
        assert!((normalized.as_slice()[0].temperature - 50.0).abs() < 1e-9);
        assert_eq!(normalized.as_slice()[1].temperature, 59.0);
        assert_eq!(normalized.as_slice()[0].timestamp, t0);
    }
}
