use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    routing::{get, post},
    Router,
};
use opentelemetry::metrics::{Counter, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_prometheus::exporter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use wxdash_analysis::HistoryAnalyzer;
use wxdash_core::TemperatureUnit;
use wxdash_ingest::WeatherSource;

pub mod error;
mod routes;

pub use error::ApiError;

pub struct AppState {
    ready: AtomicBool,
    registry: Registry,
    #[allow(dead_code)]
    provider: SdkMeterProvider,
    requests_total: Counter<u64>,
    observations_recorded: Counter<u64>,
    analyzer: Arc<HistoryAnalyzer>,
    source: Arc<dyn WeatherSource>,
    default_unit: TemperatureUnit,
}

impl AppState {
    pub fn analyzer(&self) -> &Arc<HistoryAnalyzer> {
        &self.analyzer
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub(crate) fn count_request(&self, route: &'static str) {
        self.requests_total.add(1, &[KeyValue::new("route", route)]);
    }

    pub(crate) fn count_recorded(&self, n: u64) {
        self.observations_recorded.add(n, &[]);
    }
}

/// Build the HTTP router over an analyzer and a weather source
///
/// `default_unit` applies to fetch and forecast requests that omit `unit`.
pub fn build_app(
    analyzer: Arc<HistoryAnalyzer>,
    source: Arc<dyn WeatherSource>,
    default_unit: TemperatureUnit,
) -> Result<(Router, Arc<AppState>)> {
    // Prometheus exporter via OpenTelemetry
    let registry = Registry::new();
    let reader = exporter()
        .with_registry(registry.clone())
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build prometheus exporter: {}", e))?;
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    let meter = provider.meter("wxdash-server");

    let requests_total = meter
        .u64_counter("wxdash_requests_total")
        .with_description("Total HTTP requests served")
        .init();
    let observations_recorded = meter
        .u64_counter("wxdash_observations_recorded_total")
        .with_description("Observations appended to the history store")
        .init();

    let state = Arc::new(AppState {
        ready: AtomicBool::new(false),
        registry,
        provider,
        requests_total,
        observations_recorded,
        analyzer,
        source,
        default_unit,
    });

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/fetch", post(routes::fetch))
        .route("/api/v1/forecast", get(routes::forecast))
        .route("/api/v1/observations", post(routes::record))
        .route(
            "/api/v1/history",
            get(routes::history).delete(routes::clear_history),
        )
        .route("/api/v1/cities", get(routes::cities))
        .route("/api/v1/stats", get(routes::stats))
        .route("/api/v1/trend", get(routes::trend))
        .route("/api/v1/report", get(routes::report))
        .with_state(Arc::clone(&state));

    Ok((router, state))
}

pub fn set_ready(state: &Arc<AppState>, is_ready: bool) {
    state.ready.store(is_ready, Ordering::Relaxed);
}

async fn healthz(State(state): State<Arc<AppState>>) -> StatusCode {
    state.count_request("healthz");
    StatusCode::OK
}

async fn readyz(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(
    State(state): State<Arc<AppState>>,
) -> (
    [(axum::http::header::HeaderName, axum::http::HeaderValue); 1],
    String,
) {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!(error=?e, "failed to encode metrics");
    }
    let body = String::from_utf8(buf).unwrap_or_default();
    let header = (
        header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    ([header], body)
}
