use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use log::info;
use std::fs;
use std::io::Write;
use tokio_util::sync::CancellationToken;

use ferroftpd::core_cli::Cli;
use ferroftpd::{server, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    // Initialize the logger with a custom format
    let default_level = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    let default_config_path = "/etc/ferroftpd.conf";

    // Load configuration from the TOML file; a missing default file falls
    // back to built-in defaults so the server can run out of the box
    let mut config = if args.config.is_empty() {
        match load_config(default_config_path) {
            Ok(config) => config,
            Err(_) => {
                info!("No configuration file found, using defaults");
                Config::default()
            }
        }
    } else {
        load_config(&args.config)?
    };

    // Override the listen port from the CLI if provided
    if let Some(port) = args.port {
        config.server.listen_port = port;
    }

    // A Ctrl-C asks every connection to drain and close
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            signal_token.cancel();
        }
    });

    // Run the FTP server
    server::run(config, shutdown).await?;

    Ok(())
}

fn load_config(path: &str) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path))?;
    let config = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse configuration file: {}", path))?;
    Ok(config)
}
