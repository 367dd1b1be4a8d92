//! Collects comdirect account and depot values into a time-series store.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use comdirect_rs::config::Settings;
use comdirect_rs::shutdown::{join_listener, spawn_signal_listener};
use comdirect_rs::{logging, Collector, TanConfirmation};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "comdirect-collector", version)]
#[command(about = "Poll comdirect balances, depot positions and quotes into InfluxDB")]
struct Cli {
    /// Settings file; searched in the default locations when absent
    #[arg(short, long, env = "COMDIRECT_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter directive (overrides config; RUST_LOG wins over both)
    #[arg(long)]
    log_level: Option<String>,

    /// Seconds to wait for the TAN confirmation (overrides config)
    #[arg(long)]
    tan_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("comdirect-collector: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }
    if let Some(secs) = cli.tan_timeout {
        settings.schedule.tan_timeout = secs;
    }

    if let Err(err) = logging::init(&settings.logging()) {
        eprintln!("comdirect-collector: failed to initialise logging: {err}");
        return ExitCode::FAILURE;
    }

    let shutdown = CancellationToken::new();
    let confirmation = TanConfirmation::new();
    let signals = match spawn_signal_listener(shutdown.clone(), confirmation.clone()) {
        Ok(handle) => handle,
        Err(err) => {
            error!(error = %err, "failed to install signal handlers");
            return ExitCode::FAILURE;
        }
    };
    info!("approve the TAN on your device, then send SIGHUP to continue");

    let result = Collector::new(settings).run(confirmation, shutdown.clone()).await;
    shutdown.cancel();
    join_listener(signals).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, fatal = err.is_fatal(), "collector failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "comdirect-collector",
            "--config",
            "/tmp/collector.toml",
            "--tan-timeout",
            "90",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/collector.toml")));
        assert_eq!(cli.tan_timeout, Some(90));
        assert!(cli.log_level.is_none());
    }
}
