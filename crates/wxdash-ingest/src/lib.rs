//! Weather sources
//!
//! A [`WeatherSource`] turns a city name into [`Observation`]s. The
//! OpenWeatherMap client is the production source; the simulator stands in
//! when no API key is configured.

pub mod cache;
pub mod openweather;
pub mod simulator;

pub use cache::*;
pub use openweather::*;
pub use simulator::*;

use thiserror::Error;
use wxdash_core::{Observation, TemperatureUnit};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("City not found: {0}")]
    CityNotFound(String),

    #[error("Rate limited by weather service")]
    RateLimited { retry_after: Option<u64> },

    #[error("Request timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected HTTP status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Anything that can report current and forecast weather for a city
#[async_trait::async_trait]
pub trait WeatherSource: Send + Sync {
    /// Source name/identifier
    fn name(&self) -> &str;

    /// Current conditions for `city`
    async fn current(&self, city: &str, unit: TemperatureUnit) -> IngestResult<Observation>;

    /// Forecast entries for `city`, oldest first
    async fn forecast(&self, city: &str, unit: TemperatureUnit) -> IngestResult<Vec<Observation>>;
}
