use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use wxdash_analysis::HistoryAnalyzer;
use wxdash_config::AppConfig;
use wxdash_core::TrendDetector;
use wxdash_ingest::{OpenWeatherClient, OpenWeatherSettings, SimulatedSource, WeatherSource};
use wxdash_store::SqliteHistory;

#[tokio::main]
async fn main() -> Result<()> {
    // Config
    let cfg = AppConfig::load().context("failed to load configuration")?;

    // Observability
    wxdash_obs::init("wxdashd", &cfg.log_level(), cfg.log_json())
        .context("failed to initialize logging")?;

    // Storage and analysis
    let db_path = cfg.database_path();
    let store = SqliteHistory::open(&db_path)
        .with_context(|| format!("failed to open history at {}", db_path.display()))?;
    let detector = TrendDetector::new(cfg.trend_sensitivity())?;
    let analyzer = Arc::new(HistoryAnalyzer::new(
        Arc::new(store),
        detector,
        cfg.default_window(),
    )?);

    let source = weather_source(&cfg)?;

    // Build app and state
    let (app, state) = wxdash_server::build_app(analyzer, source, cfg.default_unit())?;

    // Start HTTP server
    let addr: SocketAddr = cfg
        .http_bind()
        .parse()
        .with_context(|| format!("invalid HTTP bind address {}", cfg.http_bind()))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    // Mark ready just before serving
    wxdash_server::set_ready(&state, true);

    info!(%addr, source = state.source_name(), "HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

fn weather_source(cfg: &AppConfig) -> Result<Arc<dyn WeatherSource>> {
    match cfg.api_key() {
        Some(key) => {
            let settings = OpenWeatherSettings {
                api_key: key,
                base_url: cfg.api_base_url(),
                timeout: cfg.request_timeout(),
                max_retries: cfg.max_retries(),
                cache_ttl: cfg.cache_ttl(),
            };
            let client =
                OpenWeatherClient::new(settings).context("failed to build weather client")?;
            Ok(Arc::new(client))
        }
        None => {
            warn!("WEATHER_API_KEY not set, serving simulated weather");
            Ok(Arc::new(SimulatedSource::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = ?e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
