//! Streaming fetch and decompression into the staging directory.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use crate::decode::StreamDecoder;
use crate::error::{IngestionError, Result};
use crate::metadata::ForecastLocator;

/// A decompressed forecast file in the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub locator: ForecastLocator,
    pub path: PathBuf,
}

impl StagedFile {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}

/// Downloads forecast files and decompresses them on the fly.
pub struct Fetcher {
    client: Client,
    staging_dir: PathBuf,
}

impl Fetcher {
    pub fn new(client: Client, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            staging_dir: staging_dir.into(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Staging path a locator decompresses to.
    pub fn staged_path(&self, locator: &ForecastLocator) -> Result<PathBuf> {
        let name = locator
            .staged_name()
            .ok_or_else(|| IngestionError::InvalidFileName(locator.url().to_string()))?;
        Ok(self.staging_dir.join(name))
    }

    /// Stream the body of `locator` through its decoder into the staging
    /// directory.
    ///
    /// Output is written to `<name>.partial` and renamed once the decoder
    /// has seen the end of the compressed stream.
    #[instrument(skip(self), fields(url = %locator))]
    pub async fn fetch_and_decompress(&self, locator: &ForecastLocator) -> Result<StagedFile> {
        let final_path = self.staged_path(locator)?;
        let temp_path = partial_path(&final_path);

        fs::create_dir_all(&self.staging_dir).await?;

        let response = self.client.get(locator.url()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestionError::Transport {
                url: locator.url().to_string(),
                status,
            });
        }

        debug!(content_length = ?response.content_length(), "Receiving body");

        let result = stream_to_file(response, locator, &temp_path).await;
        let written = match result {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        fs::rename(&temp_path, &final_path).await?;

        info!(
            path = %final_path.display(),
            bytes = written,
            "Staged decompressed file"
        );

        Ok(StagedFile {
            locator: locator.clone(),
            path: final_path,
        })
    }
}

async fn stream_to_file(
    response: reqwest::Response,
    locator: &ForecastLocator,
    path: &Path,
) -> Result<u64> {
    let decompression = |e: std::io::Error| IngestionError::Decompression {
        url: locator.url().to_string(),
        reason: e.to_string(),
    };

    let mut file = File::create(path).await?;
    let mut decoder = StreamDecoder::new(locator.compression());
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        decoder.feed(&chunk?);
        while let Some(piece) = decoder.next_piece().map_err(decompression)? {
            file.write_all(piece).await?;
            written += piece.len() as u64;
        }
    }

    decoder.finish();
    while let Some(piece) = decoder.next_piece().map_err(decompression)? {
        file.write_all(piece).await?;
        written += piece.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;

    Ok(written)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_path_strips_suffix() {
        let fetcher = Fetcher::new(Client::new(), "/tmp/staging");
        let locator = ForecastLocator::new("https://example.com/d/a_2024030100_001_2d.grib2.bz2");

        assert_eq!(
            fetcher.staged_path(&locator).unwrap(),
            PathBuf::from("/tmp/staging/a_2024030100_001_2d.grib2")
        );
    }

    #[test]
    fn test_staged_path_rejects_nameless_locator() {
        let fetcher = Fetcher::new(Client::new(), "/tmp/staging");
        assert!(matches!(
            fetcher.staged_path(&ForecastLocator::new("https://example.com/d/")),
            Err(IngestionError::InvalidFileName(_))
        ));
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/tmp/a.grib2")),
            PathBuf::from("/tmp/a.grib2.partial")
        );
    }
}
