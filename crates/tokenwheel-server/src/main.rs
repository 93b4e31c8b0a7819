//! Token Wheel command line.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokenwheel_infrastructure::ConfigService;
use tokenwheel_server::TokenWheelServer;
use tokenwheel_server::logging::init_tracing;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "tokenwheel")]
#[command(about = "Token Wheel - build text one token at a time from a model's next-token distribution", long_about = None)]
struct Cli {
    /// Configuration file (defaults to $TOKENWHEEL_CONFIG, then ~/.config/tokenwheel/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,

        /// Override server.port
        #[arg(long)]
        port: Option<u16>,

        /// Log one JSON object per line
        #[arg(long)]
        log_json: bool,
    },
    /// List configured models
    Models,
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_service = ConfigService::new(cli.config);

    match cli.command {
        Commands::Serve {
            host,
            port,
            log_json,
        } => {
            let mut config = config_service.get_config()?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            init_tracing(&config.logging, log_json || config.logging.json)?;
            tracing::info!(source = %config_service.source(), "Using configuration");

            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                    return;
                }
                tracing::info!("Received Ctrl-C, shutting down");
                signal.cancel();
            });

            TokenWheelServer::new(config).start(shutdown).await?;
        }
        Commands::Models => {
            let config = config_service.get_config()?;
            for model in config.model_infos() {
                let marker = if model.default { " (default)" } else { "" };
                println!("{}{} - {} [{}]", model.id, marker, model.name, model.parameters);
                if !model.description.is_empty() {
                    println!("    {}", model.description);
                }
            }
        }
        Commands::Config => {
            let config = config_service.get_config()?;
            println!("# source: {}", config_service.source());
            print!("{}", ConfigService::to_toml(&config)?);
        }
    }

    Ok(())
}
