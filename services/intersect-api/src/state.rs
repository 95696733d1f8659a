//! Shared state for the HTTP server.

use anyhow::Result;

use crate::config::{ComputeConfig, FetchConfig};
use crate::fetch::BlobFetcher;

/// State shared across requests.
pub struct AppState {
    /// Blob fetcher with its pooled HTTP client.
    pub fetcher: BlobFetcher,
    /// Compute-stage limits.
    pub compute: ComputeConfig,
}

impl AppState {
    pub fn new(fetch: &FetchConfig, compute: ComputeConfig) -> Result<Self> {
        Ok(Self {
            fetcher: BlobFetcher::new(fetch)?,
            compute,
        })
    }
}
