//! Factor table sources for the Ken French data library.
//!
//! The library distributes zipped CSV files; these sources expect the CSV
//! itself, either served over HTTP or extracted to a local file.

use crate::error::{DataError, Result};
use crate::source::FactorSource;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// User agent sent with factor table requests
const USER_AGENT: &str = "Capstan-FactorModel/0.1";

/// Request timeout for factor table downloads
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads a factor table over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFactorSource {
    client: reqwest::Client,
    url: String,
}

impl HttpFactorSource {
    /// Create a source for the CSV at `url`.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(DataError::Network)?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// URL this source downloads from.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FactorSource for HttpFactorSource {
    async fn fetch_factor_table(&self) -> Result<Vec<u8>> {
        info!(url = %self.url, "downloading factor table");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(DataError::Network)?;

        if !response.status().is_success() {
            return Err(DataError::Http(format!(
                "Failed to fetch factor table from {}: HTTP {}",
                self.url,
                response.status()
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Reads a factor table from disk.
#[derive(Debug, Clone)]
pub struct FileFactorSource {
    path: PathBuf,
}

impl FileFactorSource {
    /// Create a source for the CSV at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FactorSource for FileFactorSource {
    async fn fetch_factor_table(&self) -> Result<Vec<u8>> {
        info!(path = %self.path.display(), "reading factor table");
        Ok(tokio::fs::read(&self.path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::FactorDataset;
    use crate::series::DateRange;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_file_source_round_trips_bytes() {
        let path = std::env::temp_dir().join(format!("capstan-factors-{}.csv", std::process::id()));
        tokio::fs::write(&path, b",Mkt-RF,SMB,HML,RF\n20240102,1.00,0.10,0.20,0.02\n")
            .await
            .unwrap();

        let bytes = FileFactorSource::new(&path).fetch_factor_table().await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .unwrap();
        let dataset = FactorDataset::parse(&bytes, &range).unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let source = FileFactorSource::new("/definitely/not/here.csv");
        let result = source.fetch_factor_table().await;
        assert!(matches!(result, Err(DataError::Io(_))));
    }

    #[test]
    fn test_http_source_keeps_url() {
        let source = HttpFactorSource::new("https://example.com/factors.csv").unwrap();
        assert_eq!(source.url(), "https://example.com/factors.csv");
    }
}
