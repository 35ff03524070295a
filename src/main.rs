#![cfg(not(tarpaulin_include))]

use anyhow::Context;
use benefits_dashboard::{DashboardConfig, app};
use std::env;
use std::path::PathBuf;

/// Main entry point for the dashboard server
///
/// Reads the optional configuration file given as first argument, applies
/// environment overrides and serves the dashboard until interrupted.
///
/// # Usage
/// * `benefits-dashboard [config.json]`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = DashboardConfig::load(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("failed to load configuration from {}", path.display()),
        None => "invalid configuration".to_string(),
    })?;

    log::info!(
        "Benefits sheet: {}",
        config
            .benefits
            .location()
            .map(|location| location.to_string())
            .unwrap_or_default()
    );

    app::run(config).await
}
