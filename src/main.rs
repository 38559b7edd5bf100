//! Mayfly server binary.
//!
//! Provisions bare-metal and virtual hosts over the network: boot firmware
//! fetches its files over TFTP (or chainloads over HTTP) while operators
//! manage hosts, groups and boot templates through the admin API.

use clap::Parser;
use color_eyre::eyre::Result;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mayfly", version, about = "Network boot provisioning server")]
struct Cli {
    /// Config file path (defaults to ./config.toml when present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    let config = mayfly_server::Config::load(cli.config.as_deref())
        .map_err(|e| color_eyre::eyre::eyre!(e))?;
    debug!(?config, "configuration loaded");

    mayfly_server::run(config)
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e))?;
    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
