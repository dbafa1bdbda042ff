//! `cabmap` binary entry point
//!
//! Parses arguments, initializes logging and hands off to the library.

use anyhow::Result;
use cabmap_cli::CliConfig;

fn main() -> Result<()> {
    let config = CliConfig::from_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level())),
        )
        .init();

    tracing::info!("cabmap {} starting", env!("CARGO_PKG_VERSION"));

    cabmap_cli::run(&config)
}
