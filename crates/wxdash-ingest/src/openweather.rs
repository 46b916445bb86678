//! OpenWeatherMap client with caching and timeout retries

use crate::cache::{CacheKey, RequestKind, ResponseCache, DEFAULT_CACHE_TTL};
use crate::{IngestError, IngestResult, WeatherSource};
use chrono::{TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;
use wxdash_core::{Observation, TemperatureUnit};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/";

/// Connection settings for [`OpenWeatherClient`]
#[derive(Debug, Clone)]
pub struct OpenWeatherSettings {
    pub api_key: String,
    pub base_url: String,
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Total attempts when a request times out
    pub max_retries: u32,
    pub cache_ttl: Duration,
}

impl OpenWeatherSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

pub struct OpenWeatherClient {
    http: Client,
    api_key: String,
    base_url: Url,
    max_retries: u32,
    cache: ResponseCache,
}

impl OpenWeatherClient {
    pub fn new(settings: OpenWeatherSettings) -> IngestResult<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(IngestError::Config("API key must not be empty".to_string()));
        }
        if settings.max_retries == 0 {
            return Err(IngestError::Config(
                "max_retries must be at least 1".to_string(),
            ));
        }

        // Url::join drops the last path segment unless it ends in a slash
        let mut base = settings.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| IngestError::Config(format!("invalid base URL {:?}: {}", base, e)))?;

        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| IngestError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: settings.api_key,
            base_url,
            max_retries: settings.max_retries,
            cache: ResponseCache::new(settings.cache_ttl),
        })
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Fetch `endpoint` for `city`, serving from the cache while fresh
    async fn fetch(
        &self,
        kind: RequestKind,
        city: &str,
        unit: TemperatureUnit,
    ) -> IngestResult<Value> {
        let key = CacheKey::new(kind, city, unit);
        if let Some(cached) = self.cache.get(&key) {
            debug!(?kind, city, "Serving cached response");
            return Ok(cached);
        }

        let endpoint = match kind {
            RequestKind::Current => "weather",
            RequestKind::Forecast => "forecast",
        };
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| IngestError::Config(e.to_string()))?;

        let mut attempt = 0;
        let value = loop {
            attempt += 1;
            match self.send(url.clone(), city, unit).await {
                Ok(value) => break value,
                Err(IngestError::Timeout { .. }) if attempt < self.max_retries => {
                    warn!(attempt, city, "Weather request timed out, retrying");
                }
                Err(IngestError::Timeout { .. }) => {
                    warn!(attempt, city, "Weather request timed out, giving up");
                    return Err(IngestError::Timeout { attempts: attempt });
                }
                Err(e) => return Err(e),
            }
        };

        self.cache.insert(key, value.clone());
        Ok(value)
    }

    async fn send(&self, url: Url, city: &str, unit: TemperatureUnit) -> IngestResult<Value> {
        let response = self
            .http
            .get(url)
            .query(&[("q", city), ("appid", self.api_key.as_str()), ("units", unit.as_str())])
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await.map_err(classify_transport_error)?;
            return serde_json::from_slice(&body)
                .map_err(|e| IngestError::InvalidResponse(format!("JSON parse error: {}", e)));
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(IngestError::InvalidApiKey),
            StatusCode::NOT_FOUND => Err(IngestError::CityNotFound(city.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok());
                Err(IngestError::RateLimited { retry_after })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                warn!(status = status.as_u16(), "Unexpected weather service response");
                Err(IngestError::Http {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

fn classify_transport_error(err: reqwest::Error) -> IngestError {
    if err.is_timeout() {
        IngestError::Timeout { attempts: 1 }
    } else if err.is_decode() {
        IngestError::InvalidResponse(err.to_string())
    } else {
        IngestError::Network(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionBlock {
    main: String,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    name: String,
    dt: i64,
    main: MainBlock,
    weather: Vec<ConditionBlock>,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    dt: i64,
    main: MainBlock,
    weather: Vec<ConditionBlock>,
}

#[derive(Debug, Deserialize)]
struct ForecastCity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    city: ForecastCity,
    list: Vec<ForecastEntry>,
}

fn to_observation(
    city: &str,
    dt: i64,
    main: MainBlock,
    weather: Vec<ConditionBlock>,
    unit: TemperatureUnit,
) -> IngestResult<Observation> {
    let timestamp = Utc
        .timestamp_opt(dt, 0)
        .single()
        .ok_or_else(|| IngestError::InvalidResponse(format!("timestamp {} out of range", dt)))?;
    let condition = weather
        .into_iter()
        .next()
        .map(|w| w.main)
        .ok_or_else(|| IngestError::InvalidResponse("missing weather condition".to_string()))?;
    if !main.temp.is_finite() {
        return Err(IngestError::InvalidResponse(
            "temperature is not a finite number".to_string(),
        ));
    }
    Ok(Observation::new(city, timestamp, main.temp, unit, condition))
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> IngestResult<T> {
    serde_json::from_value(value)
        .map_err(|e| IngestError::InvalidResponse(format!("unexpected payload: {}", e)))
}

#[async_trait::async_trait]
impl WeatherSource for OpenWeatherClient {
    fn name(&self) -> &str {
        "openweather"
    }

    #[instrument(skip(self))]
    async fn current(&self, city: &str, unit: TemperatureUnit) -> IngestResult<Observation> {
        let raw = self.fetch(RequestKind::Current, city, unit).await?;
        let resp: CurrentResponse = parse(raw)?;
        to_observation(&resp.name, resp.dt, resp.main, resp.weather, unit)
    }

    #[instrument(skip(self))]
    async fn forecast(&self, city: &str, unit: TemperatureUnit) -> IngestResult<Vec<Observation>> {
        let raw = self.fetch(RequestKind::Forecast, city, unit).await?;
        let resp: ForecastResponse = parse(raw)?;
        let name = resp.city.name;
        let mut entries = resp
            .list
            .into_iter()
            .map(|e| to_observation(&name, e.dt, e.main, e.weather, unit))
            .collect::<IngestResult<Vec<_>>>()?;
        entries.sort_by_key(|o| o.timestamp);
        debug!(entries = entries.len(), "Parsed forecast");
        Ok(entries)
    }
}
