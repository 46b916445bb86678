use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wxdash_core::{TemperatureUnit, DEFAULT_SENSITIVITY, DEFAULT_WINDOW, MIN_TREND_OBSERVATIONS};

pub const DEFAULT_CONFIG_PATH: &str = "wxdash.toml";
pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/";
pub const DEFAULT_DATABASE_PATH: &str = "data/weather_app.db";
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub trend_sensitivity: Option<f64>,
    pub default_window: Option<usize>,
    pub default_unit: Option<TemperatureUnit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub api: Option<ApiConfig>,
    pub storage: Option<StorageConfig>,
    pub analysis: Option<AnalysisConfig>,
    pub logging: Option<LoggingConfig>,
    pub server: Option<ServerConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Load configuration from the WXDASH_CONFIG path (TOML) if present, then
    /// apply environment overrides and validate
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("WXDASH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = Self::from_path_or_default(&path)?;
        cfg.apply_env(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse `path` if it exists, else start from defaults
    pub fn from_path_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let s = fs::read_to_string(path)?;
            Self::from_toml_str(&s)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str::<AppConfig>(s)?)
    }

    /// Override file values with environment variables read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api = self.api.get_or_insert_with(Default::default);
        if let Some(key) = lookup("WEATHER_API_KEY").filter(|k| !k.trim().is_empty()) {
            api.key = Some(key);
        }
        if let Some(url) = lookup("WEATHER_API_BASE_URL") {
            api.base_url = Some(url);
        }
        if let Some(v) = lookup("REQUEST_TIMEOUT") {
            api.timeout_secs = Some(parse_value("REQUEST_TIMEOUT", &v)?);
        }
        if let Some(v) = lookup("MAX_RETRIES") {
            api.max_retries = Some(parse_value("MAX_RETRIES", &v)?);
        }
        if let Some(v) = lookup("CACHE_TTL") {
            api.cache_ttl_secs = Some(parse_value("CACHE_TTL", &v)?);
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            self.storage.get_or_insert_with(Default::default).database_path = Some(path.into());
        }

        let logging = self.logging.get_or_insert_with(Default::default);
        if let Some(level) = lookup("LOG_LEVEL") {
            logging.level = Some(level);
        }
        if let Some(v) = lookup("LOG_JSON") {
            logging.json = Some(parse_bool("LOG_JSON", &v)?);
        }

        let analysis = self.analysis.get_or_insert_with(Default::default);
        if let Some(v) = lookup("WXDASH_TREND_SENSITIVITY") {
            analysis.trend_sensitivity = Some(parse_value("WXDASH_TREND_SENSITIVITY", &v)?);
        }
        if let Some(v) = lookup("WXDASH_DEFAULT_WINDOW") {
            analysis.default_window = Some(parse_value("WXDASH_DEFAULT_WINDOW", &v)?);
        }
        if let Some(v) = lookup("WXDASH_DEFAULT_UNIT") {
            analysis.default_unit = Some(parse_value("WXDASH_DEFAULT_UNIT", &v)?);
        }

        if let Some(bind) = lookup("WXDASH_BIND") {
            self.server.get_or_insert_with(Default::default).bind = Some(bind);
        }

        Ok(())
    }

    /// Reject settings the rest of the system cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sensitivity = self.trend_sensitivity();
        if !sensitivity.is_finite() || sensitivity < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "trend sensitivity must be finite and non-negative, got {}",
                sensitivity
            )));
        }
        if self.default_window() < MIN_TREND_OBSERVATIONS {
            return Err(ConfigError::Invalid(format!(
                "default trend window must be at least {}, got {}",
                MIN_TREND_OBSERVATIONS,
                self.default_window()
            )));
        }
        if self.max_retries() == 0 {
            return Err(ConfigError::Invalid("max_retries must be at least 1".into()));
        }
        if self.request_timeout().is_zero() {
            return Err(ConfigError::Invalid("request timeout must be positive".into()));
        }
        if self.http_bind().parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                key: "server.bind".into(),
                value: self.http_bind(),
            });
        }
        Ok(())
    }

    /// OpenWeatherMap API key; `None` means run on the simulator
    pub fn api_key(&self) -> Option<String> {
        self.api.as_ref().and_then(|a| a.key.clone())
    }

    /// API base URL (default https://api.openweathermap.org/data/2.5/)
    pub fn api_base_url(&self) -> String {
        self.api
            .as_ref()
            .and_then(|a| a.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Per-request timeout (default 10s)
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.as_ref().and_then(|a| a.timeout_secs).unwrap_or(10))
    }

    /// Attempts per request when it times out (default 3)
    pub fn max_retries(&self) -> u32 {
        self.api.as_ref().and_then(|a| a.max_retries).unwrap_or(3)
    }

    /// Response cache lifetime (default 600s)
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.api.as_ref().and_then(|a| a.cache_ttl_secs).unwrap_or(600))
    }

    /// SQLite database path (default data/weather_app.db)
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .as_ref()
            .and_then(|s| s.database_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH))
    }

    /// Log level filter (default "info")
    pub fn log_level(&self) -> String {
        self.logging
            .as_ref()
            .and_then(|l| l.level.clone())
            .unwrap_or_else(|| "info".to_string())
    }

    pub fn log_json(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }

    pub fn trend_sensitivity(&self) -> f64 {
        self.analysis
            .as_ref()
            .and_then(|a| a.trend_sensitivity)
            .unwrap_or(DEFAULT_SENSITIVITY)
    }

    pub fn default_window(&self) -> usize {
        self.analysis
            .as_ref()
            .and_then(|a| a.default_window)
            .unwrap_or(DEFAULT_WINDOW)
    }

    /// Unit used when a request does not name one (default imperial)
    pub fn default_unit(&self) -> TemperatureUnit {
        self.analysis
            .as_ref()
            .and_then(|a| a.default_unit)
            .unwrap_or_default()
    }

    /// Get HTTP bind address (default 0.0.0.0:8080)
    pub fn http_bind(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.http_bind(), "0.0.0.0:8080");
        assert_eq!(cfg.api_key(), None);
        assert_eq!(cfg.api_base_url(), DEFAULT_BASE_URL);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.max_retries(), 3);
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(600));
        assert_eq!(cfg.database_path(), PathBuf::from("data/weather_app.db"));
        assert_eq!(cfg.log_level(), "info");
        assert!(!cfg.log_json());
        assert_eq!(cfg.trend_sensitivity(), 0.1);
        assert_eq!(cfg.default_window(), 10);
        assert_eq!(cfg.default_unit(), TemperatureUnit::Imperial);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parses_toml() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [api]
            key = "abc123"
            timeout_secs = 5

            [storage]
            database_path = "/var/lib/wxdash/history.db"

            [analysis]
            trend_sensitivity = 0.25
            default_window = 6
            default_unit = "metric"

            [server]
            bind = "127.0.0.1:9000"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.api_key().as_deref(), Some("abc123"));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.max_retries(), 3);
        assert_eq!(cfg.database_path(), PathBuf::from("/var/lib/wxdash/history.db"));
        assert_eq!(cfg.trend_sensitivity(), 0.25);
        assert_eq!(cfg.default_window(), 6);
        assert_eq!(cfg.default_unit(), TemperatureUnit::Metric);
        assert_eq!(cfg.http_bind(), "127.0.0.1:9000");
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(matches!(
            AppConfig::from_toml_str("[api\nkey = 1"),
            Err(ConfigError::Toml(_))
        ));
        assert!(AppConfig::from_toml_str("[analysis]\ndefault_unit = \"kelvin\"").is_err());
    }

    #[test]
    fn env_overrides_file() {
        let mut cfg = AppConfig::from_toml_str("[api]\nkey = \"from-file\"\nmax_retries = 5").unwrap();
        cfg.apply_env(env(&[
            ("WEATHER_API_KEY", "from-env"),
            ("REQUEST_TIMEOUT", "30"),
            ("DATABASE_PATH", "/tmp/w.db"),
            ("LOG_LEVEL", "debug"),
            ("LOG_JSON", "true"),
            ("WXDASH_TREND_SENSITIVITY", "0.5"),
            ("WXDASH_DEFAULT_WINDOW", "4"),
            ("WXDASH_DEFAULT_UNIT", "celsius"),
            ("WXDASH_BIND", "127.0.0.1:3000"),
        ]))
        .unwrap();

        assert_eq!(cfg.api_key().as_deref(), Some("from-env"));
        assert_eq!(cfg.max_retries(), 5);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.database_path(), PathBuf::from("/tmp/w.db"));
        assert_eq!(cfg.log_level(), "debug");
        assert!(cfg.log_json());
        assert_eq!(cfg.trend_sensitivity(), 0.5);
        assert_eq!(cfg.default_window(), 4);
        assert_eq!(cfg.default_unit(), TemperatureUnit::Metric);
        assert_eq!(cfg.http_bind(), "127.0.0.1:3000");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_api_key_is_ignored() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("WEATHER_API_KEY", "  ")])).unwrap();
        assert_eq!(cfg.api_key(), None);
    }

    #[test]
    fn invalid_env_values() {
        let mut cfg = AppConfig::default();
        match cfg.apply_env(env(&[("MAX_RETRIES", "lots")])) {
            Err(ConfigError::InvalidValue { key, value }) => {
                assert_eq!(key, "MAX_RETRIES");
                assert_eq!(value, "lots");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }

        let mut cfg = AppConfig::default();
        assert!(cfg.apply_env(env(&[("LOG_JSON", "maybe")])).is_err());
    }

    #[test]
    fn validation() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("WXDASH_TREND_SENSITIVITY", "-1")])).unwrap();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("WXDASH_TREND_SENSITIVITY", "NaN")])).unwrap();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("WXDASH_DEFAULT_WINDOW", "1")])).unwrap();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("MAX_RETRIES", "0")])).unwrap();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("REQUEST_TIMEOUT", "0")])).unwrap();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("WXDASH_BIND", "not-an-address")])).unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = AppConfig::from_path_or_default("/nonexistent/wxdash.toml").unwrap();
        assert_eq!(cfg.http_bind(), DEFAULT_BIND);
    }
}
