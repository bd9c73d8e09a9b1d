//! # cdevents-provider
//!
//! Entry point. Loads configuration, installs tracing, wires the adapter and
//! runs one command.
//!
//! ## Startup
//!
//! 1. **Configuration** - config file, then `CDP_*` environment overrides
//! 2. **Validation** - a bad sink or zero attempts stops startup here
//! 3. **Registry** - opens the SQLite store under `data_dir`
//! 4. **Command** - `observe` or `markers`
//!
//! Ctrl-C cancels in-flight deliveries; nothing is marked for them.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cdevents_provider::cli::{Cli, Commands, LogFormat};
use cdevents_provider::{Provider, ProviderConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = ProviderConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let provider = Provider::from_config(&config)
        .await
        .context("Failed to initialize provider")?;

    match cli.command {
        Commands::Observe { files } => observe(&provider, &files).await,
        Commands::Markers => markers(&provider).await,
    }
}

async fn observe(provider: &Provider, files: &[std::path::PathBuf]) -> Result<()> {
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let reports = provider.observe_files(files, &cancel).await;
    for report in &reports {
        println!(
            "{}",
            serde_json::to_string(report).context("Failed to encode observe report")?
        );
    }

    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    info!(total = reports.len(), failed, "Observe complete");

    if failed > 0 {
        anyhow::bail!("{failed} of {} observe(s) failed", reports.len());
    }
    Ok(())
}

async fn markers(provider: &Provider) -> Result<()> {
    let markers = provider
        .markers()
        .await
        .context("Failed to read registry")?;

    for (key, value) in &markers {
        println!("{key}\t{value}");
    }
    Ok(())
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling deliveries");
            cancel.cancel();
        }
    });
}

/// Initialize tracing subscriber. Logs go to stderr; stdout carries results.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
