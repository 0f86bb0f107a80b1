use anyhow::{Context, Result};
use etcetera::{choose_app_strategy, AppStrategy};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use txsage::config::APP_STRATEGY;

const DEFAULT_FILTER: &str = "txsage=info,txsage_cli=info,mcp_client=info";

/// Returns the directory where CLI logs are kept, creating it when needed.
///
/// Falls back to the data directory on platforms without a state directory.
fn log_directory() -> Result<PathBuf> {
    let strategy =
        choose_app_strategy(APP_STRATEGY.clone()).context("txsage requires a home dir")?;
    let base = strategy.state_dir().unwrap_or_else(|| strategy.data_dir());
    let dir = base.join("logs").join("cli");
    std::fs::create_dir_all(&dir).context("Failed to create log directory")?;
    Ok(dir)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber: JSON lines to a daily file, warnings and
/// errors to stderr.
///
/// The file level follows `RUST_LOG`, defaulting to `info` for the txsage crates.
pub fn setup_logging() -> Result<()> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("txsage")
        .filename_suffix("log")
        .build(log_directory()?)
        .context("Failed to create log file")?;

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_filter(env_filter());

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .with_filter(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to set global subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        let filter = EnvFilter::try_new(DEFAULT_FILTER).unwrap();
        assert!(filter.to_string().contains("txsage=info"));
    }
}
