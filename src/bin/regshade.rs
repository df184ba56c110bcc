//! regshade CLI: registration accuracy batches and hillshade z-factor search.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use regshade::accuracy::{read_identifier_list, summarize, AccuracyAggregator, NpyMatchStore};
use regshade::fit::RansacHomographyFitter;
use regshade::shading::{
    Footprint, GdalHillshadeRenderer, GdalSurfaceProvider, OptimizationState, ShadingOptimizer,
    SunGeometry,
};
use regshade::Config;

#[derive(Parser)]
#[command(name = "regshade")]
#[command(about = "Registration accuracy evaluation and hillshade z-factor tuning")]
#[command(version)]
struct Cli {
    /// JSON configuration file; missing sections keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory that receives runlog.log.
    #[arg(long, global = true, default_value = "Results")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every identifier of a list into an accuracy table.
    Batch {
        /// Accuracy table to create or extend.
        #[arg(long)]
        out: PathBuf,

        /// Newline-delimited identifier list.
        #[arg(long)]
        ids: PathBuf,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print the mean reprojection distance of one identifier.
    Single {
        identifier: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Summarise an existing accuracy table.
    Show {
        #[arg(long, default_value = "Results/accuracy.csv")]
        table: PathBuf,
    },

    /// Search the hillshade z-factor that maximises contrast for one footprint.
    Zfactor(ZfactorArgs),
}

#[derive(Debug, Clone, Args)]
struct SourceArgs {
    /// Directory holding `{id}/{id}_MATCHES.npy`; overrides the config.
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Fixed RANSAC seed for reproducible fits.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Args)]
struct ZfactorArgs {
    #[arg(long)]
    id: String,

    /// Global elevation model in lunar longitude/latitude.
    #[arg(long)]
    dem: PathBuf,

    /// Where clipped, reprojected and shaded rasters are written.
    #[arg(long)]
    workdir: PathBuf,

    #[arg(long, allow_hyphen_values = true)]
    min_lon: f64,
    #[arg(long, allow_hyphen_values = true)]
    min_lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    max_lon: f64,
    #[arg(long, allow_hyphen_values = true)]
    max_lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    center_lon: f64,

    /// Sun azimuth in degrees.
    #[arg(long)]
    azimuth: f64,

    /// Solar incidence angle in degrees.
    #[arg(long)]
    incidence: f64,

    /// Starting z-factor; overrides the config.
    #[arg(long)]
    initial: Option<f64>,
}

fn setup_logging(log_dir: &Path) -> Result<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid log filter")?;

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::never(log_dir, "runlog.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // stdout carries command results only.
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("logger initialization failed")?;
    Ok(guard)
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn aggregator(
    config: &Config,
    source: &SourceArgs,
) -> AccuracyAggregator<NpyMatchStore, RansacHomographyFitter> {
    let root = source
        .results_dir
        .clone()
        .unwrap_or_else(|| config.accuracy.results_dir.clone());
    let mut settings = config.ransac.clone();
    if let Some(seed) = source.seed {
        settings.seed = Some(seed);
    }
    let threshold = settings.inlier_threshold;
    AccuracyAggregator::with_fitter(NpyMatchStore::new(root), RansacHomographyFitter::new(settings))
        .with_threshold(threshold)
}

fn run_batch(config: &Config, out: &Path, ids: &Path, source: &SourceArgs) -> Result<()> {
    let identifiers = read_identifier_list(ids)?;
    tracing::info!(
        count = identifiers.len(),
        table = %out.display(),
        "CHECKING ACCURACY"
    );
    aggregator(config, source)
        .evaluate_batch(&identifiers, out)
        .with_context(|| format!("batch aborted; {} holds every completed record", out.display()))?;
    Ok(())
}

fn run_single(config: &Config, identifier: &str, source: &SourceArgs) -> Result<()> {
    let record = aggregator(config, source).evaluate_one(identifier);
    tracing::info!(
        status = %record.outcome.status(),
        "Mean Dist for {identifier}: {}",
        record.mean_distance()
    );
    println!("{}", record.mean_distance());
    Ok(())
}

fn run_show(table: &Path) -> Result<()> {
    match summarize(table)? {
        Some(summary) => println!("{summary}"),
        None => println!("no computable records in {}", table.display()),
    }
    Ok(())
}

fn run_zfactor(config: &Config, args: &ZfactorArgs) -> Result<()> {
    let mut settings = config.shading.clone();
    if let Some(initial) = args.initial {
        settings.initial_guess = initial;
    }
    let footprint = Footprint {
        identifier: args.id.clone(),
        min_lon: args.min_lon,
        min_lat: args.min_lat,
        max_lon: args.max_lon,
        max_lat: args.max_lat,
        center_lon: args.center_lon,
    };
    let sun = SunGeometry::new(args.azimuth, args.incidence);

    let provider = GdalSurfaceProvider::new(&args.dem, &args.workdir).with_nodata(settings.nodata);
    let renderer = GdalHillshadeRenderer::new(&args.workdir);
    let outcome = ShadingOptimizer::new(renderer, settings)
        .optimize(&provider, &footprint, &sun)
        .with_context(|| format!("z-factor search for {}", args.id))?;

    if let OptimizationState::BudgetExhausted(z) = outcome.state {
        tracing::warn!(
            iterations = outcome.iterations(),
            "no fixed point reached; using last z-factor {z}"
        );
    }
    println!("{}", outcome.zfactor());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(&cli.log_dir)?;
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Batch { out, ids, source } => run_batch(&config, out, ids, source),
        Commands::Single { identifier, source } => run_single(&config, identifier, source),
        Commands::Show { table } => run_show(table),
        Commands::Zfactor(args) => run_zfactor(&config, args),
    }
}
