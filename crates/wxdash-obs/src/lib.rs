use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging for the process.
/// - RUST_LOG wins when set, otherwise `level` (e.g. "info" or "debug")
/// - JSON lines when `json` is true, human-readable otherwise
///
/// Fails if a global subscriber is already installed.
pub fn init(service_name: &str, level: &str, json: bool) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::new(filter_directive(std::env::var("RUST_LOG").ok(), level));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }

    tracing::info!(service = %service_name, "Logging initialized");
    Ok(())
}

fn filter_directive(rust_log: Option<String>, level: &str) -> String {
    match rust_log {
        Some(directive) if !directive.trim().is_empty() => directive,
        _ => level.trim().to_ascii_lowercase(),
    }
}
