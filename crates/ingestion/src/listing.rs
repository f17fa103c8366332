//! Directory listing discovery.
//!
//! The provider publishes each model run as a plain HTML directory index.
//! Every anchor whose target matches the configured suffix and projection
//! variant becomes one [`ForecastLocator`].

use std::collections::HashSet;

use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};

use crate::error::{IngestionError, Result};
use crate::metadata::ForecastLocator;

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Which listing links are forecast files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFilter {
    /// Suffix the link target must end with, e.g. `grib2.bz2`
    pub suffix: String,
    /// Token the link target must contain, e.g. `regular-lat-lon`
    pub token: String,
}

impl LinkFilter {
    pub fn new(suffix: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            token: token.into(),
        }
    }

    pub fn matches(&self, href: &str) -> bool {
        href.ends_with(&self.suffix) && href.contains(&self.token)
    }
}

/// Extract forecast locators from a directory index page.
///
/// Relative targets are joined to `directory_url` with a single `/`.
/// Absolute `http(s)` targets are kept unchanged. Repeated targets are
/// reported once, in first-seen order.
pub fn extract_locators(directory_url: &str, html: &str, filter: &LinkFilter) -> Vec<ForecastLocator> {
    let document = Html::parse_document(html);
    let base = directory_url.trim_end_matches('/');
    let mut seen = HashSet::new();

    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|href| filter.matches(href))
        .filter(|href| seen.insert(href.to_string()))
        .map(|href| {
            if href.starts_with("http://") || href.starts_with("https://") {
                ForecastLocator::new(href)
            } else {
                ForecastLocator::new(format!("{}/{}", base, href.trim_start_matches('/')))
            }
        })
        .collect()
}

/// Fetches a directory index and resolves it into locators.
pub struct ListingResolver {
    client: Client,
    filter: LinkFilter,
}

impl ListingResolver {
    pub fn new(client: Client, filter: LinkFilter) -> Self {
        Self { client, filter }
    }

    /// GET the listing page and return every matching locator.
    ///
    /// Any failure to obtain the page is a discovery error; an index with
    /// no matching links is an empty result.
    #[instrument(skip(self))]
    pub async fn resolve(&self, directory_url: &str) -> Result<Vec<ForecastLocator>> {
        let response = self
            .client
            .get(directory_url)
            .send()
            .await
            .map_err(|e| IngestionError::discovery(directory_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestionError::discovery(
                directory_url,
                format!("listing returned HTTP {}", status),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| IngestionError::discovery(directory_url, e))?;
        let html = std::str::from_utf8(&body)
            .map_err(|e| IngestionError::discovery(directory_url, format!("listing is not UTF-8: {}", e)))?;

        debug!(bytes = body.len(), "Fetched directory listing");

        let locators = extract_locators(directory_url, html, &self.filter);

        info!(
            url = %directory_url,
            count = locators.len(),
            suffix = %self.filter.suffix,
            token = %self.filter.token,
            "Resolved forecast files"
        );

        Ok(locators)
    }
}
