use clap::Parser;
use gridline::{Config, GridlineBuilder};
use gridline_server::startup::spawn_cache_maintenance;
use gridline_server::{PlantSource, load_config, load_lines, load_plants, run_server};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Config file (.json or .toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL serving `<tile>.geojson` files
    #[arg(long)]
    origin_url: Option<String>,

    /// Local tile directory, used when no origin URL is set
    #[arg(long)]
    tiles_dir: Option<PathBuf>,

    /// Keep durable cache tiers on disk here
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Plant records as <source>=<path>; source is gppd, eia or a mapping .json
    #[arg(long = "plants", value_name = "SOURCE=PATH")]
    plants: Vec<PlantSource>,

    /// GeoJSON lines for the proximity index
    #[arg(long)]
    lines: Option<PathBuf>,

    /// Seconds between sweeps of expired memory cache entries
    #[arg(long, default_value_t = 300)]
    cleanup_interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridline_server=info,gridline=info,info".into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            load_config(path)?
        }
        None => Config::default(),
    };

    let mut builder = GridlineBuilder::new().config(config);
    if let Some(url) = args.origin_url {
        builder = builder.origin_url(url);
    }
    if let Some(dir) = args.tiles_dir {
        builder = builder.tiles_dir(dir);
    }
    if let Some(dir) = args.cache_dir {
        builder = builder.cache_dir(dir);
    }
    let gridline = Arc::new(builder.build()?);

    if !args.plants.is_empty() {
        let inputs = load_plants(&args.plants).await?;
        let report = gridline.plants().refresh(&inputs);
        info!(
            plants = report.output,
            merged = report.merged,
            dropped = report.dropped,
            malformed = report.malformed,
            "Plant dataset ready"
        );
    }
    if let Some(path) = &args.lines {
        let version = load_lines(gridline.proximity(), path).await?;
        info!(version, "Proximity index ready");
    }

    if args.cleanup_interval > 0 {
        spawn_cache_maintenance(
            Arc::clone(gridline.cache()),
            Duration::from_secs(args.cleanup_interval),
        );
    }

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl_c signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    run_server(listener, gridline, shutdown).await?;

    Ok(())
}
