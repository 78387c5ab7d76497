//! Batch CLI: augment a CSV of zone-level trips with concrete coordinates.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use trip_augmenter::batch::{self, AugmentedTable, TripColumns, TripTable};
use trip_augmenter::cache::CachePaths;
use trip_augmenter::config::AppConfig;
use trip_augmenter::haversine::HaversineRouter;
use trip_augmenter::nominatim::NominatimClient;
use trip_augmenter::osrm::OsrmClient;
use trip_augmenter::traits::{GeocodingService, RouteService, ZoneLookup};
use trip_augmenter::{AugmentationEngine, ZoneTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RouterKind {
    Osrm,
    Haversine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

/// Attach concrete pickup/dropoff coordinates to zone-level trip records
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Trip table (CSV with a header row)
    #[arg(short, long)]
    trips: PathBuf,

    /// Zone table (location_id, zone, borough, bounds, optional centroid)
    #[arg(short, long)]
    zones: PathBuf,

    /// Output file
    #[arg(short, long)]
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Candidates per zone; 1 means centroid only
    #[arg(long, default_value_t = 3)]
    max_samples: usize,

    /// Accepted relative distance error, as a fraction
    #[arg(long, default_value_t = 0.30)]
    tolerance: f64,

    #[arg(long, value_enum, default_value_t = RouterKind::Osrm)]
    router: RouterKind,

    /// Directory for geocode_cache.json / route_cache.json (overrides env)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Process trips on the rayon pool
    #[arg(long)]
    parallel: bool,

    #[arg(long, default_value = "PULocationID")]
    pickup_column: String,

    #[arg(long, default_value = "DOLocationID")]
    dropoff_column: String,

    #[arg(long, default_value = "trip_distance")]
    distance_column: String,
}

const DEFAULT_LOG_FILTER: &str = "info,trip_augmenter=debug";

fn log_filter() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_filter()))
        .init();
}

/// Ctrl-C handler body: ask the batch to stop after the trip in flight.
fn interrupt_handler(stop: Arc<AtomicBool>) -> impl FnMut() + Send + 'static {
    move || {
        tracing::warn!("Interrupt received; finishing current trip");
        stop.store(true, Ordering::Relaxed);
    }
}

/// Persist caches, then write the augmented table. Caches go first so a bad
/// output path never discards the run's external-call results.
fn write_results<Z, G, R>(
    engine: &AugmentationEngine<Z, G, R>,
    augmented: &AugmentedTable,
    output: &Path,
    format: OutputFormat,
) -> Result<()>
where
    Z: ZoneLookup,
    G: GeocodingService,
    R: RouteService,
{
    engine.save_caches().context("saving caches")?;

    let writer = BufWriter::new(
        File::create(output).with_context(|| format!("creating {}", output.display()))?,
    );
    match format {
        OutputFormat::Csv => augmented.write_csv(writer)?,
        OutputFormat::Json => augmented.write_json(writer)?,
    }
    tracing::info!("Augmented trips written to {}", output.display());
    Ok(())
}

fn main() -> Result<()> {
    // `.env` may carry RUST_LOG, so it is read before the subscriber starts.
    dotenvy::dotenv().ok();
    init_logging();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    config.engine.search.tolerance = cli.tolerance;
    if let Some(dir) = &cli.cache_dir {
        config.engine.cache_paths = CachePaths::in_dir(dir);
    }

    let zones = ZoneTable::from_csv(&cli.zones)
        .with_context(|| format!("loading zones from {}", cli.zones.display()))?;
    tracing::info!("Loaded {} zones", zones.len());

    let columns = TripColumns {
        pickup_zone: cli.pickup_column.clone(),
        dropoff_zone: cli.dropoff_column.clone(),
        distance_miles: cli.distance_column.clone(),
    };
    let table = TripTable::from_csv(&cli.trips, &columns)
        .with_context(|| format!("loading trips from {}", cli.trips.display()))?;
    tracing::info!("Loaded {} trips", table.len());

    let geocoder = NominatimClient::new(config.nominatim.clone())?;
    let router: Box<dyn RouteService + Send + Sync> = match cli.router {
        RouterKind::Osrm => Box::new(OsrmClient::new(config.osrm.clone())?),
        RouterKind::Haversine => Box::new(HaversineRouter::default()),
    };

    let engine = AugmentationEngine::new(zones, geocoder, router, config.engine);
    engine.load_caches().context("loading caches")?;

    let stop = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler(interrupt_handler(Arc::clone(&stop)))
        .context("installing interrupt handler")?;

    let augmented = if cli.parallel {
        batch::augment_table_parallel(&engine, &table, cli.max_samples, &stop)
    } else {
        batch::augment_table(&engine, &table, cli.max_samples, &stop)
    };

    write_results(&engine, &augmented, &cli.output, cli.format)?;

    tracing::info!("{}", augmented.summary());
    println!("{}", engine.snapshot());

    Ok(())
}
