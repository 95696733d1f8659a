//! Concurrent blob retrieval from the object store.
//!
//! Fans one GET per identifier out over a bounded pool and aggregates the
//! outcomes in a single consumer: bodies into the blob map, failures into a
//! per-identifier list, byte and timing totals into the batch telemetry.
//! Failures never abort the batch at this layer; the caller decides what a
//! partial batch means.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::FetchConfig;

const BYTES_PER_MB: f64 = 1048576.0;

/// A failed retrieval for one identifier.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchFailure {
    pub object_id: String,
    pub cause: String,
}

/// Aggregate byte and timing totals for one retrieval batch.
#[derive(Debug, Clone, Copy)]
pub struct FetchTelemetry {
    /// Bytes across all successfully retrieved blobs; a duplicated
    /// identifier counts once.
    pub total_bytes: usize,
    /// Wall-clock time from first request to last completion.
    pub elapsed: Duration,
}

impl FetchTelemetry {
    pub fn megabytes(&self) -> f64 {
        self.total_bytes as f64 / BYTES_PER_MB
    }

    /// Throughput in MB/s, zero for an instantaneous batch.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.megabytes() / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for FetchTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6} MB | {:.6} MB/s", self.megabytes(), self.throughput())
    }
}

/// Everything the retrieval stage hands onward.
#[derive(Debug)]
pub struct BlobBatch {
    /// Raw bytes per identifier; `None` marks a failed retrieval. Duplicate
    /// identifiers collapse to one entry.
    pub blobs: HashMap<String, Option<Bytes>>,
    /// One record per failed retrieval.
    pub failures: Vec<FetchFailure>,
    pub telemetry: FetchTelemetry,
}

impl BlobBatch {
    /// Number of identifiers whose bytes arrived.
    pub fn fetched_count(&self) -> usize {
        self.blobs.values().filter(|body| body.is_some()).count()
    }
}

type FetchOutcome = std::result::Result<(StatusCode, Bytes), String>;

/// Bounded-concurrency blob fetcher over a shared HTTP client.
pub struct BlobFetcher {
    client: Client,
    max_concurrent: usize,
}

impl BlobFetcher {
    /// Build a fetcher whose client carries the configured deadlines, so a
    /// hung connection fails one identifier instead of wedging the batch.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            max_concurrent: config.max_concurrent.max(1),
        })
    }

    /// Retrieve every identifier in the batch.
    ///
    /// At most `max_concurrent` requests run at once. Each outcome lands in
    /// the blob map (`None` on failure) and failed identifiers additionally
    /// get a failure record, so callers can distinguish "nothing asked for"
    /// from "asked for and lost".
    #[instrument(skip_all, fields(count = object_ids.len()))]
    pub async fn fetch_batch(
        &self,
        object_ids: &[String],
        auth_token: &str,
        base_uri: &str,
    ) -> BlobBatch {
        let started = Instant::now();

        let outcomes: Vec<(String, FetchOutcome)> = stream::iter(object_ids.iter().cloned())
            .map(|object_id| {
                let url = blob_url(base_uri, &object_id, auth_token);
                async move {
                    let outcome = self.fetch_blob(&url).await;
                    (object_id, outcome)
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let elapsed = started.elapsed();

        // Single consumer owns the aggregation; workers only return values.
        let mut blobs = HashMap::with_capacity(outcomes.len());
        let mut failures = Vec::new();

        for (object_id, outcome) in outcomes {
            match outcome {
                Ok((status, body)) if status == StatusCode::OK => {
                    blobs.insert(object_id, Some(body));
                }
                Ok((status, _)) => {
                    warn!(object_id = %object_id, status = %status, "Blob retrieval rejected");
                    failures.push(FetchFailure {
                        object_id: object_id.clone(),
                        cause: format!("status code {} not 200", status.as_u16()),
                    });
                    blobs.insert(object_id, None);
                }
                Err(cause) => {
                    warn!(object_id = %object_id, error = %cause, "Blob retrieval failed");
                    failures.push(FetchFailure {
                        object_id: object_id.clone(),
                        cause,
                    });
                    blobs.insert(object_id, None);
                }
            }
        }

        // Bytes are summed over the deduped map, so a repeated identifier
        // counts once.
        let total_bytes: usize = blobs.values().flatten().map(|body| body.len()).sum();
        let telemetry = FetchTelemetry {
            total_bytes,
            elapsed,
        };

        let fetched = blobs.values().filter(|body| body.is_some()).count();
        debug!(
            fetched,
            failed = failures.len(),
            telemetry = %telemetry,
            "Blob batch complete"
        );

        BlobBatch {
            blobs,
            failures,
            telemetry,
        }
    }

    /// One GET. A non-200 status is data here, not an error; the caller
    /// inspects the code.
    async fn fetch_blob(&self, url: &str) -> FetchOutcome {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| e.to_string())?;
        Ok((status, body))
    }
}

/// `{baseUri}/{objectId}?{token}`, the store's signed-URL convention. The
/// token is opaque and appended verbatim.
fn blob_url(base_uri: &str, object_id: &str, auth_token: &str) -> String {
    format!(
        "{}/{}?{}",
        base_uri.trim_end_matches('/'),
        object_id,
        auth_token
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher() -> BlobFetcher {
        BlobFetcher::new(&FetchConfig {
            max_concurrent: 4,
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_blob_url_format() {
        assert_eq!(
            blob_url("http://store", "obj-1", "sv=sig"),
            "http://store/obj-1?sv=sig"
        );
        assert_eq!(
            blob_url("http://store/", "obj-1", "sv=sig"),
            "http://store/obj-1?sv=sig"
        );
    }

    #[test]
    fn test_telemetry_display() {
        let telemetry = FetchTelemetry {
            total_bytes: 2 * 1024 * 1024,
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(format!("{}", telemetry), "2.000000 MB | 1.000000 MB/s");
    }

    #[test]
    fn test_telemetry_zero_elapsed_has_zero_throughput() {
        let telemetry = FetchTelemetry {
            total_bytes: 1024,
            elapsed: Duration::ZERO,
        };
        assert_eq!(telemetry.throughput(), 0.0);
    }

    #[tokio::test]
    async fn test_fetch_batch_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/obj-a"))
            .and(query_param("token", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 100]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/obj-b"))
            .and(query_param("token", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8; 50]))
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let batch = fetcher
            .fetch_batch(&ids(&["obj-a", "obj-b"]), "token=secret", &server.uri())
            .await;

        assert!(batch.failures.is_empty());
        assert_eq!(batch.fetched_count(), 2);
        assert_eq!(batch.blobs["obj-a"].as_ref().unwrap().len(), 100);
        assert_eq!(batch.blobs["obj-b"].as_ref().unwrap().len(), 50);
        assert_eq!(batch.telemetry.total_bytes, 150);
    }

    #[tokio::test]
    async fn test_fetch_batch_records_non_200_as_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/good"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 10]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let batch = fetcher
            .fetch_batch(&ids(&["good", "missing"]), "t", &server.uri())
            .await;

        // The good blob is still in the map; the bad one is None plus a
        // failure record.
        assert_eq!(batch.fetched_count(), 1);
        assert!(batch.blobs["good"].is_some());
        assert!(batch.blobs["missing"].is_none());
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].object_id, "missing");
        assert_eq!(batch.failures[0].cause, "status code 404 not 200");
    }

    #[tokio::test]
    async fn test_fetch_batch_records_transport_error_as_failure() {
        // Bind a server, then shut it down so the port refuses connections.
        let server = MockServer::start().await;
        let base = server.uri();
        drop(server);

        let fetcher = test_fetcher();
        let batch = fetcher.fetch_batch(&ids(&["obj-a"]), "t", &base).await;

        assert_eq!(batch.fetched_count(), 0);
        assert!(batch.blobs["obj-a"].is_none());
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].object_id, "obj-a");
        assert!(!batch.failures[0].cause.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_batch_times_out_hung_store() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/fast"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 10]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![2u8; 10])
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let fetcher = BlobFetcher::new(&FetchConfig {
            max_concurrent: 4,
            request_timeout: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(5),
        })
        .unwrap();

        let batch = fetcher
            .fetch_batch(&ids(&["fast", "slow"]), "t", &server.uri())
            .await;

        // The deadline turns the hung identifier into a failure instead of
        // stalling the batch.
        assert_eq!(batch.fetched_count(), 1);
        assert!(batch.blobs["fast"].is_some());
        assert!(batch.blobs["slow"].is_none());
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].object_id, "slow");
        assert!(!batch.failures[0].cause.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_batch_empty_input() {
        let fetcher = test_fetcher();
        let batch = fetcher.fetch_batch(&[], "t", "http://unused").await;

        assert!(batch.blobs.is_empty());
        assert!(batch.failures.is_empty());
        assert_eq!(batch.telemetry.total_bytes, 0);
    }

    #[tokio::test]
    async fn test_fetch_batch_collapses_duplicate_identifiers() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/obj-a"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 10]))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let batch = fetcher
            .fetch_batch(&ids(&["obj-a", "obj-a"]), "t", &server.uri())
            .await;

        assert_eq!(batch.blobs.len(), 1);
        assert!(batch.failures.is_empty());
        // Two GETs went out, but the retained blob is counted once.
        assert_eq!(batch.telemetry.total_bytes, 10);
    }
}
