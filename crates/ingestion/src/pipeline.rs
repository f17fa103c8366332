//! One ingestion run: discover, fetch concurrently, convert sequentially.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use metrics::counter;
use reqwest::Client;
use serde::Serialize;
use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};
use wgf4::Wgf4Header;

use crate::config::{ExistingOutputPolicy, PipelineConfig};
use crate::delta::DeltaEngine;
use crate::error::{IngestionError, Result};
use crate::extract::{GridExtractor, GridReader};
use crate::fetch::{Fetcher, StagedFile};
use crate::listing::{LinkFilter, ListingResolver};
use crate::metadata::{ForecastFileName, ForecastLocator};
use crate::output::{ensure_output_dir, OutputKey};

/// A locator that could not be staged.
#[derive(Debug)]
pub struct LocatorFailure {
    pub url: String,
    pub error: IngestionError,
}

/// Outcome of one run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub discovered: usize,
    pub fetched: usize,
    pub converted: usize,
    pub skipped_existing: usize,
    pub failures: Vec<LocatorFailure>,
    /// Output files written, in conversion order
    pub outputs: Vec<PathBuf>,
    /// Conversion error that stopped the run
    pub aborted: Option<IngestionError>,
    /// URLs of staged files left without output by an abort, starting
    /// with the file that failed
    pub not_converted: Vec<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.aborted.is_none()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            discovered: self.discovered,
            fetched: self.fetched,
            converted: self.converted,
            skipped_existing: self.skipped_existing,
            failed: self.failures.len(),
            failures: self
                .failures
                .iter()
                .map(|f| FailureSummary {
                    url: f.url.clone(),
                    error: f.error.to_string(),
                })
                .collect(),
            aborted: self.aborted.as_ref().map(|e| e.to_string()),
            not_converted: self.not_converted.clone(),
        }
    }
}

/// Serializable view of a [`RunReport`].
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub discovered: usize,
    pub fetched: usize,
    pub converted: usize,
    pub skipped_existing: usize,
    pub failed: usize,
    pub failures: Vec<FailureSummary>,
    pub aborted: Option<String>,
    pub not_converted: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    pub url: String,
    pub error: String,
}

/// Runs the ingestion stages for one directory listing.
pub struct Pipeline<'a, R> {
    config: &'a PipelineConfig,
    client: Client,
    extractor: GridExtractor<R>,
}

impl<'a, R: GridReader> Pipeline<'a, R> {
    pub fn new(config: &'a PipelineConfig, reader: R) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(config.max_concurrent_downloads)
            .tcp_nodelay(true)
            .build()?;

        Ok(Self {
            config,
            client,
            extractor: GridExtractor::new(reader, config.single_field_offsets.clone()),
        })
    }

    /// Execute one full run.
    ///
    /// Fails only when the listing cannot be resolved or the staging
    /// directory cannot be prepared. Per-file fetch failures and a
    /// conversion abort are reported in the returned [`RunReport`].
    #[instrument(skip(self), fields(url = %self.config.directory_url))]
    pub async fn run(&self) -> Result<RunReport> {
        let resolver = ListingResolver::new(
            self.client.clone(),
            LinkFilter::new(&self.config.link_suffix, &self.config.variant_token),
        );
        let locators = resolver.resolve(&self.config.directory_url).await?;
        counter!("prate_files_discovered_total").increment(locators.len() as u64);

        let (_temp_dir, staging_dir) = self.staging_dir()?;
        let fetcher = Fetcher::new(self.client.clone(), staging_dir);

        let mut report = RunReport {
            discovered: locators.len(),
            ..Default::default()
        };

        if locators.is_empty() {
            info!("No forecast files listed");
            return Ok(report);
        }

        let staged = self.fetch_all(&fetcher, locators, &mut report).await;
        report.fetched = staged.len();

        self.convert_all(staged, &mut report).await;

        info!(
            discovered = report.discovered,
            fetched = report.fetched,
            converted = report.converted,
            skipped_existing = report.skipped_existing,
            failed = report.failures.len(),
            aborted = report.aborted.is_some(),
            "Run finished"
        );

        Ok(report)
    }

    fn staging_dir(&self) -> Result<(Option<TempDir>, PathBuf)> {
        match &self.config.staging_dir {
            Some(dir) => Ok((None, dir.clone())),
            None => {
                let temp = tempfile::Builder::new().prefix("prate-staging-").tempdir()?;
                let path = temp.path().to_path_buf();
                Ok((Some(temp), path))
            }
        }
    }

    /// Fetch every locator with bounded concurrency.
    ///
    /// Locators whose staging name is already claimed are rejected before
    /// any request is made.
    async fn fetch_all(
        &self,
        fetcher: &Fetcher,
        locators: Vec<ForecastLocator>,
        report: &mut RunReport,
    ) -> Vec<StagedFile> {
        let mut claimed: HashMap<PathBuf, String> = HashMap::new();
        let mut accepted = Vec::with_capacity(locators.len());

        for locator in locators {
            let target = match fetcher.staged_path(&locator) {
                Ok(target) => target,
                Err(e) => {
                    record_failure(report, &locator, e);
                    continue;
                }
            };
            if let Some(claimed_by) = claimed.get(&target) {
                let error = IngestionError::DuplicateTarget {
                    name: target.display().to_string(),
                    claimed_by: claimed_by.clone(),
                };
                record_failure(report, &locator, error);
                continue;
            }
            claimed.insert(target, locator.url().to_string());
            accepted.push(locator);
        }

        let results: Vec<(ForecastLocator, Result<StagedFile>)> = stream::iter(accepted)
            .map(|locator| async move {
                let result = fetcher.fetch_and_decompress(&locator).await;
                (locator, result)
            })
            .buffer_unordered(self.config.max_concurrent_downloads)
            .collect()
            .await;

        let mut staged = Vec::with_capacity(results.len());
        for (locator, result) in results {
            match result {
                Ok(file) => {
                    counter!("prate_files_fetched_total").increment(1);
                    staged.push(file);
                }
                Err(e) => record_failure(report, &locator, e),
            }
        }
        staged
    }

    /// Convert staged files one at a time in name order.
    ///
    /// Name order groups files by issuance. Accumulation restarts at each
    /// new issuance so the first hour of a run is never differenced
    /// against another run's last hour.
    async fn convert_all(&self, mut staged: Vec<StagedFile>, report: &mut RunReport) {
        staged.sort_by(|a, b| a.file_name().cmp(b.file_name()));

        let mut delta = DeltaEngine::new();
        let mut issuance = None;
        let mut remaining = staged.into_iter();

        while let Some(file) = remaining.next() {
            let result = match ForecastFileName::parse(file.file_name()) {
                Ok(forecast) => {
                    if issuance != Some(forecast.issuance) {
                        if let Some(previous) = issuance {
                            info!(%previous, issuance = %forecast.issuance, "New issuance, restarting accumulation");
                        }
                        delta.reset();
                        issuance = Some(forecast.issuance);
                    }
                    self.convert(&file, &forecast, &mut delta).await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(Conversion::Written(path)) => {
                    counter!("prate_files_converted_total").increment(1);
                    report.converted += 1;
                    report.outputs.push(path);
                }
                Ok(Conversion::KeptExisting(path)) => {
                    debug!(path = %path.display(), "Kept existing output");
                    report.skipped_existing += 1;
                }
                Err(e) => {
                    error!(file = %file.file_name(), error = %e, "Conversion failed, aborting run");
                    report.aborted = Some(e);
                    report.not_converted.push(file.locator.url().to_string());
                    remove_staged(&file).await;

                    for rest in remaining.by_ref() {
                        warn!(file = %rest.file_name(), "Not converted after abort");
                        report.not_converted.push(rest.locator.url().to_string());
                        remove_staged(&rest).await;
                    }
                    return;
                }
            }

            remove_staged(&file).await;
        }
    }

    /// Convert one file. Nothing is created under the output root unless
    /// the file converts.
    async fn convert(
        &self,
        file: &StagedFile,
        forecast: &ForecastFileName,
        delta: &mut DeltaEngine,
    ) -> Result<Conversion> {
        let key = OutputKey::for_validity(forecast.validity());
        let output_path = key.output_file(&self.config.output_root);

        let grid = self.extractor.extract(file, forecast)?;
        let header = Wgf4Header::from_axes(&grid.latitudes, &grid.longitudes, self.config.multiplier)
            .map_err(|e| IngestionError::format(&file.path, e.to_string()))?;
        let field = delta.apply(forecast.validity(), grid.field)?;

        if self.config.existing_output == ExistingOutputPolicy::Skip && output_path.exists() {
            return Ok(Conversion::KeptExisting(output_path));
        }

        ensure_output_dir(&self.config.output_root, &key).await?;
        write_output(&output_path, &header, &field.values, self.config.sentinel)?;

        info!(
            file = %file.file_name(),
            output = %output_path.display(),
            rows = field.rows,
            cols = field.cols,
            missing = field.missing_count(),
            "Converted forecast hour"
        );

        Ok(Conversion::Written(output_path))
    }
}

enum Conversion {
    Written(PathBuf),
    KeptExisting(PathBuf),
}

fn write_output(path: &Path, header: &Wgf4Header, values: &[f32], sentinel: f32) -> Result<()> {
    wgf4::write_file(path, header, values, sentinel).map_err(|source| IngestionError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

async fn remove_staged(file: &StagedFile) {
    if let Err(e) = fs::remove_file(&file.path).await {
        warn!(path = %file.path.display(), error = %e, "Failed to remove staged file");
    }
}

fn record_failure(report: &mut RunReport, locator: &ForecastLocator, error: IngestionError) {
    warn!(url = %locator, error = %error, "Skipping forecast file");
    counter!("prate_fetch_failures_total").increment(1);
    report.failures.push(LocatorFailure {
        url: locator.url().to_string(),
        error,
    });
}
