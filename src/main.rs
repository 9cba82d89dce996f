use std::path::PathBuf;

use anyhow::Context;
use caremap::config::CareMapConfig;
use caremap::normalizer::{self, NormalizeOptions};
use caremap::offline::{OfflineCache, StaticOrigin};
use caremap::{logging, web};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "caremap")]
#[command(about = "Clinic locator backend", version)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, env = "CAREMAP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the clinic API, the assistant proxy and the widget assets
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Convert a raw HRSA export into the clinic list
    Normalize {
        /// Raw dataset (.json or .csv)
        #[arg(short, long)]
        input: PathBuf,

        /// Destination clinic list (defaults to the configured data path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// State abbreviation to keep
        #[arg(long)]
        region: Option<String>,

        /// Keep only sites whose status is Active
        #[arg(long)]
        active_only: bool,
    },
    /// Fill the offline cache with the configured asset list
    Precache,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CareMapConfig::load_from_path(cli.config)?;
    logging::init(&config.logging)?;

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            web::run(&config).await
        }
        Command::Normalize {
            input,
            output,
            region,
            active_only,
        } => {
            let options = NormalizeOptions {
                region: region.unwrap_or_else(|| config.normalizer.region.clone()),
                active_only: active_only || config.normalizer.active_only,
                ..NormalizeOptions::default()
            };
            let output = output.unwrap_or_else(|| config.server.data_path.clone());

            let report = normalizer::run(&input, &output, &options)?;
            println!(
                "✅ Saved {} of {} sites to {} ({} without coordinates)",
                report.written,
                report.read,
                report.output.display(),
                report.unmappable
            );
            Ok(())
        }
        Command::Precache => {
            let cache = OfflineCache::open(&config.offline.location, &config.offline.cache_name)?;
            let origin = StaticOrigin::new(&config.server.static_dir)?.with_remote_assets();

            let count = cache
                .install(&origin, config.offline.precache.as_slice())
                .await
                .context("Precache failed")?;
            let removed = cache.activate().await?;
            info!("Removed {} old cache generations", removed.len());
            println!("✅ Cached {} assets into {}", count, cache.name());
            Ok(())
        }
    }
}
