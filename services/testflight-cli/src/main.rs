//! TestFlight CLI
//!
//! Signs in with an App Store Connect API key, then lists and edits
//! TestFlight data. Every request is authenticated with a freshly minted
//! ES256 token; the key itself lives in a local credential file.

mod cli;
mod commands;
mod config;
mod error;
mod metrics;
mod resources;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use asc_auth::FileCredentialStore;
use asc_client::ApiClient;
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        config,
        json_logs,
        metrics_file,
        command,
    } = Cli::parse();
    init_tracing(json_logs);

    let metrics_handle = match &metrics_file {
        Some(_) => Some(metrics::install_recorder()?),
        None => None,
    };

    let config = Config::load(config.as_deref()).context("failed to load configuration")?;

    let credentials_path = config.credentials_path();
    let store = FileCredentialStore::load(credentials_path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open credential store at {}",
                credentials_path.display()
            )
        })?;
    debug!(path = %credentials_path.display(), "credential store ready");

    let mut http = reqwest::Client::builder();
    if let Some(secs) = config.api.timeout_secs {
        http = http.timeout(Duration::from_secs(secs));
    }
    let http = http.build().context("failed to build HTTP client")?;

    let client = ApiClient::new(http, Arc::new(store)).with_base_url(&config.api.base_url);

    let result = commands::execute(&client, command, &mut std::io::stdout()).await;

    if let (Some(handle), Some(path)) = (&metrics_handle, &metrics_file) {
        if let Err(e) = metrics::write_snapshot(handle, path) {
            warn!(error = %e, "metrics snapshot not written");
        }
    }
    result
}

/// Logs go to stderr so command output on stdout stays pipeable.
/// LOG_LEVEL wins over RUST_LOG; the default is `warn`.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
