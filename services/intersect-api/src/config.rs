//! Stage limits for the request pipeline.

use std::time::Duration;

/// Limits for the blob retrieval stage.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum blob requests in flight per batch.
    pub max_concurrent: usize,
    /// Total deadline per blob request.
    pub request_timeout: Duration,
    /// Connect deadline per blob request.
    pub connect_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 16,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Limits for the decode-and-sample stage.
#[derive(Debug, Clone)]
pub struct ComputeConfig {
    /// Maximum decode jobs in flight per batch. The work is CPU-bound, so
    /// the default follows the core count.
    pub max_concurrent: usize,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get().max(1),
        }
    }
}
