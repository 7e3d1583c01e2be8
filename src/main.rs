use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use loot_tally_lib::services::config::ConfigManager;

/// Tally loot screenshots into item counts and values
#[derive(Debug, Parser)]
#[command(name = "loot-tally", version, about)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, env = "LOOT_TALLY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind, overrides `server.host`
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on, overrides `server.port`
    #[arg(short, long)]
    port: Option<u16>,

    /// Write the default configuration to the config path and exit
    #[arg(long)]
    write_default_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };

    if cli.write_default_config {
        manager.save(&Default::default())?;
        println!("{}", manager.config_file_path().display());
        return Ok(());
    }

    let mut config = manager
        .load()
        .with_context(|| format!("loading {}", manager.config_file_path().display()))?;

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    loot_tally_lib::init_logging(&config.logging);
    tracing::info!("Config: {}", manager.config_file_path().display());

    loot_tally_lib::run(config).await
}
