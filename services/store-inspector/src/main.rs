//! Forecast store inspector.
//!
//! Opens one dataset of a catalog as a virtual Zarr store and lists its
//! keys, prints its metadata, reads single keys or warms a local chunk
//! cache.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forecast_dataset::{load_catalog, OpenOptions};
use netcdf_parser::NetCdfDecoder;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "store-inspector")]
#[command(about = "Inspect the virtual Zarr stores of forecast dataset catalogs")]
struct Args {
    /// Catalog file path
    #[arg(short, long, env = "FORECAST_CATALOG")]
    catalog: PathBuf,

    /// Dataset name within the catalog
    #[arg(short, long)]
    dataset: String,

    /// Accept the dataset's license
    #[arg(long)]
    accept_license: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List store keys in enumeration order
    Keys {
        /// Stop after this many keys
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print the consolidated metadata document
    Metadata,

    /// Print dimension sizes, data variables and coordinates
    Schema,

    /// Read one key
    Get {
        key: String,

        /// Write the value here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Materialize chunks into a local cache directory
    Warm {
        /// Cache directory
        #[arg(long, default_value = "./chunk-cache")]
        cache_dir: PathBuf,

        /// Chunks read at once
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Keys to warm; every data chunk when empty
        keys: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
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
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let catalog = load_catalog(&args.catalog)
        .with_context(|| format!("Failed to load catalog {}", args.catalog.display()))?;
    let options =
        OpenOptions::new(Arc::new(NetCdfDecoder::new())).license_accepted(args.accept_license);
    let dataset = catalog
        .open(&args.dataset, &options)
        .with_context(|| format!("Failed to open dataset {}", args.dataset))?;
    info!(dataset = %dataset.name(), keys = dataset.store().len(), "Dataset ready");

    let mut stdout = std::io::stdout().lock();
    match args.command {
        Command::Keys { limit } => commands::list_keys(&dataset, limit, &mut stdout)?,
        Command::Metadata => commands::print_metadata(&dataset, &mut stdout)?,
        Command::Schema => commands::print_schema(&dataset, &mut stdout)?,
        Command::Get { key, output } => match output {
            Some(path) => commands::get_to_file(&dataset, &key, &path).await?,
            None => commands::get_to_writer(&dataset, &key, &mut stdout).await?,
        },
        Command::Warm {
            cache_dir,
            concurrency,
            keys,
        } => {
            let report = commands::warm(&dataset, &cache_dir, concurrency, keys).await?;
            info!(
                warmed = report.warmed,
                failed = report.failed,
                bytes = report.bytes,
                cache_dir = %cache_dir.display(),
                "Warm complete"
            );
            if report.failed > 0 {
                anyhow::bail!("{} of {} chunks failed", report.failed, report.total());
            }
        }
    }

    Ok(())
}
