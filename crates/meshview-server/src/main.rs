//! Meshview Server - Main entry point
//!
//! Accepts model uploads, serves stored models and hosts the WASM viewer.

mod api;
mod config;
mod server;
mod state;
mod storage;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "meshview")]
#[command(about = "Upload backend and web host for the Meshview STL/OBJ viewer")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "meshview.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Directory uploaded models are stored in
    #[arg(short, long)]
    upload_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Meshview v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(upload_dir) = args.upload_dir {
        config.storage.upload_dir = upload_dir;
    }

    info!(
        upload_dir = %config.storage.upload_dir,
        max_upload_bytes = config.storage.max_upload_bytes,
        "Configuration loaded"
    );

    let state = state::AppState::new(config.clone()).await?;
    server::run(state, &config.server.bind).await
}
