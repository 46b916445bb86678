//! Simulated weather source for offline runs and testing

use crate::{IngestError, IngestResult, WeatherSource};
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use wxdash_core::{convert_temperature, Observation, TemperatureUnit};

/// Forecast spacing, matching the upstream 3-hour forecast steps
const FORECAST_STEP_HOURS: i64 = 3;
const FORECAST_ENTRIES: usize = 8;

/// Generates synthetic observations
///
/// Values depend only on the city name and how many current readings the
/// source has produced, so two simulators fed the same requests agree.
#[derive(Debug, Default)]
pub struct SimulatedSource {
    calls: AtomicU64,
}

impl SimulatedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Temperature in °C for `city` at step `n`
    fn celsius_at(city: &str, n: u64) -> f64 {
        let seed = city_seed(city);
        let base = 5.0 + (seed % 200) as f64 / 10.0;
        let phase = (seed % 7) as f64;
        let swing = 3.0 * ((n as f64 + phase) * 0.5).sin();
        ((base + swing) * 100.0).round() / 100.0
    }

    fn condition_for(city: &str, n: u64) -> &'static str {
        const CONDITIONS: [&str; 4] = ["Clear", "Clouds", "Rain", "Mist"];
        CONDITIONS[(city_seed(city).wrapping_add(n) % CONDITIONS.len() as u64) as usize]
    }

    fn reading(city: &str, n: u64, unit: TemperatureUnit, at: chrono::DateTime<Utc>) -> Observation {
        let celsius = Self::celsius_at(city, n);
        let temperature = convert_temperature(celsius, TemperatureUnit::Metric, unit);
        Observation::new(
            city.trim(),
            at,
            (temperature * 100.0).round() / 100.0,
            unit,
            Self::condition_for(city, n),
        )
    }
}

/// FNV-1a over the lowercased name, stable across runs and platforms
fn city_seed(city: &str) -> u64 {
    city.trim()
        .to_lowercase()
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
            (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
        })
}

fn require_city(city: &str) -> IngestResult<()> {
    if city.trim().is_empty() {
        return Err(IngestError::CityNotFound(city.to_string()));
    }
    Ok(())
}

#[async_trait::async_trait]
impl WeatherSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn current(&self, city: &str, unit: TemperatureUnit) -> IngestResult<Observation> {
        require_city(city)?;
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        let obs = Self::reading(city, n, unit, Utc::now());
        tracing::debug!(city = %obs.city, temperature = obs.temperature, "Simulated reading");
        Ok(obs)
    }

    async fn forecast(&self, city: &str, unit: TemperatureUnit) -> IngestResult<Vec<Observation>> {
        require_city(city)?;
        let now = Utc::now();
        Ok((0..FORECAST_ENTRIES)
            .map(|i| {
                let at = now + Duration::hours(FORECAST_STEP_HOURS * (i as i64 + 1));
                Self::reading(city, i as u64, unit, at)
            })
            .collect())
    }
}
