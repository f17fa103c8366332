//! Precipitation forecast converter.
//!
//! Resolves one ICON-D2 total-precipitation directory listing, downloads
//! the regular lat/lon GRIB2 files and writes one WGF4 grid of hourly
//! precipitation per forecast hour.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use ingestion::{ExistingOutputPolicy, GribReader, Pipeline, PipelineConfig, DIRECTORY_URL_VAR};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "prate-converter")]
#[command(about = "Convert ICON-D2 precipitation forecasts to WGF4")]
struct Args {
    /// Directory listing URL
    #[arg(long, env = DIRECTORY_URL_VAR)]
    url: Option<String>,

    /// YAML configuration file (replaces PRATE_* environment settings)
    #[arg(short, long, env = "PRATE_CONFIG")]
    config: Option<PathBuf>,

    /// Root directory for WGF4 output
    #[arg(long)]
    output_root: Option<PathBuf>,

    /// Directory for decompressed files (default: a temporary directory)
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Maximum concurrent downloads
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// What to do with existing output files (overwrite | skip)
    #[arg(long)]
    existing_output: Option<ExistingOutputPolicy>,

    /// HTTP request timeout in seconds
    #[arg(long)]
    request_timeout_secs: Option<u64>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

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
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting precipitation converter");

    let config = load_config(&args)?;
    config.validate().context("Invalid configuration")?;
    info!(
        url = %config.directory_url,
        output_root = %config.output_root.display(),
        max_concurrent = config.max_concurrent_downloads,
        existing_output = %config.existing_output,
        "Loaded configuration"
    );

    let pipeline = Pipeline::new(&config, GribReader).context("Failed to create pipeline")?;
    let report = pipeline
        .run()
        .await
        .with_context(|| format!("Run against {} failed", config.directory_url))?;

    println!("{}", serde_json::to_string_pretty(&report.summary())?);

    if let Some(e) = &report.aborted {
        error!(
            error = %e,
            converted = report.converted,
            not_converted = report.not_converted.len(),
            "Conversion aborted"
        );
        bail!("conversion aborted after {} files: {}", report.converted, e);
    }

    info!(converted = report.converted, failed = report.failures.len(), "Done");
    Ok(())
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => read_config_file(path)?,
        None => PipelineConfig::from_env().context("Failed to read configuration from environment")?,
    };
    apply_overrides(&mut config, args);
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Command-line values take precedence over file and environment settings.
fn apply_overrides(config: &mut PipelineConfig, args: &Args) {
    if let Some(url) = &args.url {
        config.directory_url = url.clone();
    }
    if let Some(root) = &args.output_root {
        config.output_root = root.clone();
    }
    if let Some(dir) = &args.staging_dir {
        config.staging_dir = Some(dir.clone());
    }
    if let Some(n) = args.max_concurrent {
        config.max_concurrent_downloads = n;
    }
    if let Some(policy) = args.existing_output {
        config.existing_output = policy;
    }
    if let Some(secs) = args.request_timeout_secs {
        config.request_timeout_secs = secs;
    }
}
