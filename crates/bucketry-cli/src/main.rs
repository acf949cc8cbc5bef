#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod command;
mod config;
mod shutdown;

use std::process;

use anyhow::Context;
use bucketry_gcs::GcsBucket;
use bucketry_runtime::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "bucketry_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "bucketry_cli::shutdown";
pub const TRACING_TARGET_COMMAND: &str = "bucketry_cli::command";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %error,
            "command failed"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    init_tracing();
    log_startup_info(&cli);

    let bucket = GcsBucket::new(&cli.gcs).context("invalid storage configuration")?;

    let token = CancellationToken::new();
    let watcher = tokio::spawn(shutdown::cancel_on_signal(token.clone()));

    let result = command::execute(cli.command, bucket, &token).await;
    watcher.abort();
    result
}

/// Initializes tracing with environment-based filtering.
///
/// Logs go to stderr so that command output on stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Logs startup information.
fn log_startup_info(cli: &Cli) {
    tracing::debug!(
        target: TRACING_TARGET_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        command = cli.command.name(),
        bucket = %cli.gcs.bucket,
        endpoint = %cli.gcs.endpoint,
        authenticated = cli.gcs.access_token.is_some(),
        features = ?enabled_features(),
        "starting bucketry"
    );
}

/// Returns a list of enabled compile-time features.
fn enabled_features() -> Vec<&'static str> {
    [cfg!(feature = "dotenv").then_some("dotenv")]
        .into_iter()
        .flatten()
        .collect()
}
