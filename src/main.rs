use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use favicon_atlas::{
    acquisition::{AcquisitionOrchestrator, HttpIconFetcher},
    config::Config,
    tiles::TileCompositor,
};

#[derive(Parser)]
#[command(name = "favicon-atlas")]
#[command(version)]
#[command(about = "Fetch, normalize and tile the favicons of a ranked site catalogue")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path (falls back to $CONFIG_FILE, then favicon-atlas.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch or revalidate favicons and update the catalogue state
    Acquire(AcquireArgs),
    /// Composite downloaded favicons into tiles and the preview
    Tile(TileArgs),
    /// Acquire, then tile
    Run {
        #[command(flatten)]
        acquire: AcquireArgs,
        #[command(flatten)]
        tile: TileArgs,
    },
}

#[derive(Args)]
struct AcquireArgs {
    /// Maximum number of catalogue entries to process this run
    #[arg(long, value_name = "N")]
    max_entries: Option<usize>,
}

#[derive(Args)]
struct TileArgs {
    /// Regenerate every tile regardless of staleness
    #[arg(long)]
    force: bool,

    /// Regenerate the preview regardless of staleness
    #[arg(long)]
    force_preview: bool,

    /// Append N synthetic tile references to the manifest
    #[arg(long, value_name = "N")]
    synthetic_tiles: Option<usize>,
}

impl AcquireArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(max_entries) = self.max_entries {
            config.acquisition.max_entries = max_entries;
        }
    }
}

impl TileArgs {
    fn apply(&self, config: &mut Config) {
        config.tiles.force |= self.force;
        config.tiles.force_preview |= self.force_preview;
        if let Some(synthetic_tiles) = self.synthetic_tiles {
            config.tiles.synthetic_tiles = synthetic_tiles;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("favicon_atlas={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting favicon-atlas v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load()?,
    };

    match &cli.command {
        Command::Acquire(args) => args.apply(&mut config),
        Command::Tile(args) => args.apply(&mut config),
        Command::Run { acquire, tile } => {
            acquire.apply(&mut config);
            tile.apply(&mut config);
        }
    }
    config.validate()?;

    match cli.command {
        Command::Acquire(_) => acquire(&config).await?,
        Command::Tile(_) => tile(&config).await?,
        Command::Run { .. } => {
            acquire(&config).await?;
            tile(&config).await?;
        }
    }

    Ok(())
}

async fn acquire(config: &Config) -> Result<()> {
    let fetcher = HttpIconFetcher::from_config(&config.acquisition)?;
    let orchestrator = AcquisitionOrchestrator::new(fetcher, config);
    orchestrator
        .run(&config.paths.catalogue, &config.paths.state)
        .await?;
    Ok(())
}

async fn tile(config: &Config) -> Result<()> {
    let compositor = TileCompositor::new(config);
    compositor.run(&config.paths.state).await?;
    Ok(())
}
