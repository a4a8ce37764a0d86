// rest_api/src/main.rs

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use tokio::sync::oneshot;

use rest_api::config::{ClinicApiConfig, DEFAULT_CONFIG_PATH};
use rest_api::start_server;

#[derive(Parser, Debug)]
#[command(name = "clinic-api")]
#[command(version = "0.1.0")]
#[command(about = "Clinic queue, visit, pharmacy and cashier API")]
struct CliArgs {
    /// YAML file with `rest_api:` and `storage:` sections
    #[arg(short = 'c', long = "config", value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    port: Option<u16>,
    #[arg(short = 'd', long = "data-dir", value_name = "DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CliArgs::parse();
    let mut config = ClinicApiConfig::load(&args.config)?;
    if let Some(port) = args.port {
        config.rest_api.port = port;
    }
    if let Some(dir) = args.data_dir {
        config.storage.data_directory = dir;
    }

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
        let _ = shutdown_tx.send(());
    });

    start_server(config, shutdown_rx).await
}
