use std::io;
use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use decor_predictor::dataset::DatasetPreparer;
use decor_predictor::io::{write_rows, JsonReportSink, JsonRowSource, ReportSink, RowSource};
use decor_predictor::location::Coordinate;
use decor_predictor::reconcile::reconcile;
use decor_predictor::row::parse_observation_date;
use decor_predictor::{server, Config, Credentials, EnrichmentPipeline, Error, Provider, Result};

/// Decor predictor: find out which place tags make which decor spawn.
///
/// Geocodes each sighting, looks the place up in OpenStreetMap and, when keyed,
/// Foursquare, Google Places and Yelp, then scores per-provider tag rules
/// against the recorded decor. All lookups are cached under the cache dir.
///
/// Examples:
///   decor run --input sightings.json --output report.json
///   decor predict --lat -37.7986 --lon 144.9784 --radius 200
///   decor serve --port 8080
///   decor purge --cache yelp --key "Fitzroy, Victoria, Australia, Burger Barn"
#[derive(Parser)]
#[command(name = "decor", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Cache directory. Defaults to ~/.decor/caches.
    #[arg(long, global = true, env = "DECOR_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Contact email for Nominatim.
    #[arg(long, global = true, env = "DECOR_EMAIL")]
    email: Option<String>,

    /// Enables Foursquare.
    #[arg(long, global = true, env = "FOURSQUARE_API_KEY", hide_env_values = true)]
    foursquare_api_key: Option<String>,

    /// Enables Google Places.
    #[arg(long, global = true, env = "GOOGLE_PLACES_API_KEY", hide_env_values = true)]
    google_places_api_key: Option<String>,

    /// Enables Yelp.
    #[arg(long, global = true, env = "YELP_API_KEY", hide_env_values = true)]
    yelp_api_key: Option<String>,

    /// Date (m/d/Y) from which fast food reads as Hamburger Shop.
    #[arg(long, global = true, value_parser = parse_date)]
    cutoff: Option<NaiveDate>,

    /// Offline mode: answer from caches only.
    #[arg(long, global = true)]
    offline: bool,

    /// Debug logging (RUST_LOG takes precedence).
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Enrich a batch of sightings, classify them and report.
    Run {
        /// JSON array of sightings.
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Report file. Defaults to stdout.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Also write the enriched rows here.
        #[arg(long)]
        enriched: Option<PathBuf>,
    },

    /// Classify every place around a point.
    Predict {
        #[arg(long, allow_hyphen_values = true, value_parser = parse_lat)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true, value_parser = parse_lon)]
        lon: f64,

        /// Search radius in metres.
        #[arg(long, default_value_t = server::DEFAULT_RADIUS_M)]
        radius: u32,

        /// Sighting date (m/d/Y). Defaults to today.
        #[arg(long, short = 'd', value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// Serve point predictions over HTTP.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, short = 'p', default_value_t = 8080)]
        port: u16,
    },

    /// Delete every cache file and start from scratch.
    InvalidateCaches,

    /// Remove one cache entry so it is queried again.
    Purge {
        /// `gps`, `osm`, `foursquare`, `google_places` or `yelp`.
        #[arg(long)]
        cache: String,

        /// Location key or row key, e.g. "Fitzroy, Victoria, Australia".
        #[arg(long)]
        key: String,
    },
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    parse_observation_date(s).ok_or_else(|| format!("Invalid date '{}'. Use m/d/Y, e.g. 12/18/2021.", s))
}

fn parse_lat(s: &str) -> std::result::Result<f64, String> {
    parse_ranged(s, -90.0, 90.0)
}

fn parse_lon(s: &str) -> std::result::Result<f64, String> {
    parse_ranged(s, -180.0, 180.0)
}

fn parse_ranged(s: &str, min: f64, max: f64) -> std::result::Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("'{}' is not a number: {}", s, e))?;
    if (min..=max).contains(&v) {
        Ok(v)
    } else {
        Err(format!("{} is outside {}..{}", v, min, max))
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "decor_predictor=debug,decor=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

fn build_config(args: &GlobalArgs) -> Result<Config> {
    let cache_dir = match &args.cache_dir {
        Some(dir) => dir.clone(),
        None => Config::default_cache_dir()?,
    };
    let mut config = Config::new(cache_dir).with_credentials(Credentials {
        email: args.email.clone(),
        foursquare: args.foursquare_api_key.clone(),
        google_places: args.google_places_api_key.clone(),
        yelp: args.yelp_api_key.clone(),
    });
    if let Some(cutoff) = args.cutoff {
        config.cutoff = cutoff;
    }
    config.offline = args.offline;
    Ok(config)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.debug);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli.global)?;
    tracing::debug!(cache_dir = %config.cache_dir.display(), providers = ?config.enabled_providers(), "configured");

    match cli.command {
        Command::Run { input, output, enriched } => run_batch(&config, input, output, enriched),
        Command::Predict { lat, lon, radius, date } => {
            let pipeline = EnrichmentPipeline::from_config(&config);
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let result = pipeline.predict_point(Coordinate::new(lat, lon), radius, date);
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Serve { host, port } => {
            let pipeline = EnrichmentPipeline::from_config(&config);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::start(&host, port, pipeline))
        }
        Command::InvalidateCaches => {
            let removed = config.invalidate_caches()?;
            tracing::info!(removed, dir = %config.cache_dir.display(), "caches invalidated");
            Ok(())
        }
        Command::Purge { cache, key } => {
            let mut pipeline = EnrichmentPipeline::from_config(&config);
            if pipeline.purge(&cache, &key)? {
                tracing::info!(%cache, %key, "entry purged");
            } else {
                tracing::warn!(%cache, %key, "no such entry");
            }
            Ok(())
        }
    }
}

fn run_batch(config: &Config, input: PathBuf, output: Option<PathBuf>, enriched: Option<PathBuf>) -> Result<()> {
    let mut rows = JsonRowSource::new(input).read_rows()?;
    if rows.is_empty() {
        return Err(Error::Config("input holds no rows".into()));
    }

    let mut pipeline = EnrichmentPipeline::from_config(config);
    let summary = pipeline.enrich(&mut rows)?;
    tracing::debug!(?summary, "enrichment done");
    if let Some(path) = enriched {
        write_rows(path, &rows)?;
    }

    let prepared = DatasetPreparer::new(config.excluded.clone()).prepare(rows);
    let result = reconcile(&prepared.rows, config.cutoff);

    for provider in Provider::ORDER {
        tracing::info!(
            %provider,
            samples = result.coverage.with_evidence.get(&provider).copied().unwrap_or(0),
            percent = result.coverage.percent(provider).round(),
            unique = result.coverage.only.get(&provider).copied().unwrap_or(0),
            hits = result.usage.total(provider),
            "provider coverage"
        );
    }

    let mut sink: Box<dyn ReportSink> = match output {
        Some(path) => Box::new(JsonReportSink::create(path)?),
        None => Box::new(JsonReportSink::new(io::stdout().lock())),
    };
    sink.record_dropped(&prepared.dropped)?;
    sink.record_predictions(&result.rows)?;
    sink.record_usage(&result.usage)?;
    sink.record_coverage(&result.coverage)?;
    sink.finish()
}
