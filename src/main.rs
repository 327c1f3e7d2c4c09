//! spatialscene server - depth maps and disocclusion inpainting over HTTP.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spatialscene::config::AppConfig;
use spatialscene::model::Device;

/// Serve depth estimation and inpainting for uploaded photos.
#[derive(Parser, Debug)]
#[command(name = "spatialscene")]
#[command(version, about, long_about = None)]
struct Args {
    /// Optional TOML configuration file.
    #[arg(short, long, value_name = "PATH", env = "SPATIALSCENE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind.
    #[arg(long, value_name = "HOST", env = "SPATIALSCENE_HOST")]
    host: Option<String>,

    /// Port to bind.
    #[arg(short, long, value_name = "PORT", env = "SPATIALSCENE_PORT")]
    port: Option<u16>,

    /// Directory scenes are saved in.
    #[arg(long, value_name = "DIR", env = "SPATIALSCENE_GALLERY_DIR")]
    gallery_dir: Option<PathBuf>,

    /// Directory model weights are cached in.
    #[arg(long, value_name = "DIR", env = "SPATIALSCENE_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Inference device.
    #[arg(long, value_enum, env = "SPATIALSCENE_DEVICE")]
    device: Option<Device>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("spatialscene={log_level},tower_http={log_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(args).await {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn run(args: Args) -> Result<()> {
    let mut config = AppConfig::load(args.config.as_deref())
        .await
        .context("Failed to load configuration")?;

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(dir) = args.gallery_dir {
        config.gallery.dir = dir;
    }
    if let Some(dir) = args.model_dir {
        config.models.cache_dir = Some(dir);
    }
    if let Some(device) = args.device {
        config.models.device = device;
    }

    spatialscene::run(config).await.context("Server failed")
}
