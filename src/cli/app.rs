use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::output::OutputFormat;
use super::runtime::{init_logging, load_config, load_local_env_overrides, LoadedConfig};

pub async fn run() -> Result<()> {
    // Loaded before logging so the file can set RUST_LOG.
    let env_file = load_local_env_overrides();
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug, cli.output == OutputFormat::Json)?;
    if let Some(load) = &env_file {
        load.log();
    }

    info!("Starting {}", version_line());

    let LoadedConfig { config, path } = load_config(cli.config.as_ref()).await?;
    let cli_context = CliContext::new(config, path, cli.output);

    match dispatch(&cli, &cli_context).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}

fn version_line() -> String {
    format!(
        "flowcheck v{} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("FLOWCHECK_GIT_HASH"),
        env!("FLOWCHECK_BUILD_DATE")
    )
}
