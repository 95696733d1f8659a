//! Concurrent decode-and-sample over a retrieved blob batch.
//!
//! Every map entry becomes one job on the blocking pool: decode the Irap
//! blob, sample the surface along the polyline, hand the row back. The
//! stream consumer is the only writer to the output, and an undecodable
//! blob yields a failure record instead of sinking the batch.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{instrument, warn};

use surface_sampler::sample_points;

use crate::config::ComputeConfig;

/// A fetched blob that did not evaluate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeFailure {
    pub object_id: String,
    pub cause: String,
}

/// Output of the compute stage.
#[derive(Debug, Default)]
pub struct IntersectOutcome {
    /// One row per evaluated surface, in completion order. Values inside a
    /// row follow the query order exactly.
    pub z_arrays: Vec<Vec<f64>>,
    /// Entries that fetched but did not decode.
    pub decode_failures: Vec<DecodeFailure>,
}

enum BlobEval {
    Sampled(Vec<f64>),
    Failed(DecodeFailure),
}

/// Decode every blob in the batch and sample it along the polyline.
///
/// At most `max_concurrent` jobs run at once, each on the blocking pool
/// since decoding and sampling are CPU-bound. Row order is completion
/// order; callers must not read meaning into it.
#[instrument(skip_all, fields(blobs = blobs.len(), points = xcoords.len()))]
pub async fn intersect_batch(
    blobs: HashMap<String, Option<Bytes>>,
    xcoords: Vec<f64>,
    ycoords: Vec<f64>,
    config: &ComputeConfig,
) -> IntersectOutcome {
    let xcoords: Arc<[f64]> = xcoords.into();
    let ycoords: Arc<[f64]> = ycoords.into();

    let evals: Vec<BlobEval> = stream::iter(blobs)
        .map(|(object_id, body)| {
            let xs = Arc::clone(&xcoords);
            let ys = Arc::clone(&ycoords);
            async move {
                let id = object_id.clone();
                match tokio::task::spawn_blocking(move || {
                    evaluate_blob(object_id, body, &xs, &ys)
                })
                .await
                {
                    Ok(eval) => eval,
                    Err(e) => BlobEval::Failed(DecodeFailure {
                        object_id: id,
                        cause: format!("evaluation task failed: {}", e),
                    }),
                }
            }
        })
        .buffer_unordered(config.max_concurrent.max(1))
        .collect()
        .await;

    // Single consumer owns the aggregation; workers only return values.
    let mut outcome = IntersectOutcome::default();
    for eval in evals {
        match eval {
            BlobEval::Sampled(row) => outcome.z_arrays.push(row),
            BlobEval::Failed(failure) => outcome.decode_failures.push(failure),
        }
    }
    outcome
}

/// Decode one blob and sample it. Runs on the blocking pool.
fn evaluate_blob(
    object_id: String,
    body: Option<Bytes>,
    xcoords: &[f64],
    ycoords: &[f64],
) -> BlobEval {
    let Some(body) = body else {
        warn!(object_id = %object_id, "No content for entry, skipping");
        return BlobEval::Failed(DecodeFailure {
            object_id,
            cause: "no content".to_string(),
        });
    };

    match irap_parser::decode_surface(&body) {
        Ok(surface) => BlobEval::Sampled(sample_points(&surface, xcoords, ycoords)),
        Err(e) => {
            warn!(object_id = %object_id, error = %e, "Surface decode failed, skipping");
            BlobEval::Failed(DecodeFailure {
                object_id,
                cause: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irap_parser::{encode_surface, Surface, UNDEF};

    fn surface_blob(values: Vec<f32>, nx: usize, ny: usize) -> Bytes {
        let surface = Surface {
            nx,
            ny,
            xori: 0.0,
            yori: 0.0,
            xinc: 1.0,
            yinc: 1.0,
            rot: 0.0,
            values,
        };
        Bytes::from(encode_surface(&surface).unwrap())
    }

    fn batch(entries: Vec<(&str, Option<Bytes>)>) -> HashMap<String, Option<Bytes>> {
        entries
            .into_iter()
            .map(|(id, body)| (id.to_string(), body))
            .collect()
    }

    #[tokio::test]
    async fn test_intersect_samples_every_surface() {
        let blobs = batch(vec![
            ("a", Some(surface_blob(vec![1.0, 2.0, 3.0, 4.0], 2, 2))),
            ("b", Some(surface_blob(vec![10.0, 20.0, 30.0, 40.0], 2, 2))),
        ]);

        let outcome = intersect_batch(
            blobs,
            vec![0.5],
            vec![0.5],
            &ComputeConfig { max_concurrent: 2 },
        )
        .await;

        assert!(outcome.decode_failures.is_empty());
        assert_eq!(outcome.z_arrays.len(), 2);

        // Completion order is not fixed, so compare as a set.
        let mut centers: Vec<f64> = outcome.z_arrays.iter().map(|row| row[0]).collect();
        centers.sort_by(f64::total_cmp);
        assert!((centers[0] - 2.5).abs() < 1e-9);
        assert!((centers[1] - 25.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_intersect_rows_follow_query_order() {
        let blobs = batch(vec![(
            "a",
            Some(surface_blob(vec![1.0, 2.0, 3.0, 4.0], 2, 2)),
        )]);

        let outcome = intersect_batch(
            blobs,
            vec![0.0, 1.0, 0.5],
            vec![0.0, 1.0, 0.5],
            &ComputeConfig { max_concurrent: 1 },
        )
        .await;

        assert_eq!(outcome.z_arrays.len(), 1);
        let row = &outcome.z_arrays[0];
        assert_eq!(row[0], 1.0);
        assert_eq!(row[1], 4.0);
        assert!((row[2] - 2.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_intersect_reports_undecodable_blob_and_keeps_others() {
        let blobs = batch(vec![
            ("good", Some(surface_blob(vec![1.0, 2.0, 3.0, 4.0], 2, 2))),
            ("bad", Some(Bytes::from_static(b"not an irap surface"))),
        ]);

        let outcome = intersect_batch(
            blobs,
            vec![0.0],
            vec![0.0],
            &ComputeConfig { max_concurrent: 2 },
        )
        .await;

        assert_eq!(outcome.z_arrays.len(), 1);
        assert_eq!(outcome.z_arrays[0][0], 1.0);
        assert_eq!(outcome.decode_failures.len(), 1);
        assert_eq!(outcome.decode_failures[0].object_id, "bad");
        assert!(!outcome.decode_failures[0].cause.is_empty());
    }

    #[tokio::test]
    async fn test_intersect_reports_missing_body() {
        let blobs = batch(vec![("gone", None)]);

        let outcome = intersect_batch(
            blobs,
            vec![0.0],
            vec![0.0],
            &ComputeConfig { max_concurrent: 2 },
        )
        .await;

        assert!(outcome.z_arrays.is_empty());
        assert_eq!(outcome.decode_failures.len(), 1);
        assert_eq!(outcome.decode_failures[0].object_id, "gone");
        assert_eq!(outcome.decode_failures[0].cause, "no content");
    }

    #[tokio::test]
    async fn test_intersect_empty_batch() {
        let outcome = intersect_batch(
            HashMap::new(),
            vec![0.0],
            vec![0.0],
            &ComputeConfig { max_concurrent: 2 },
        )
        .await;

        assert!(outcome.z_arrays.is_empty());
        assert!(outcome.decode_failures.is_empty());
    }

    #[tokio::test]
    async fn test_intersect_undefined_sample_is_sentinel_not_nan() {
        let blobs = batch(vec![(
            "a",
            Some(surface_blob(vec![1.0, 2.0, 3.0, 4.0], 2, 2)),
        )]);

        let outcome = intersect_batch(
            blobs,
            vec![50.0],
            vec![50.0],
            &ComputeConfig { max_concurrent: 1 },
        )
        .await;

        assert_eq!(outcome.z_arrays[0][0], UNDEF);
        // The row must survive JSON serialization as-is.
        assert!(serde_json::to_string(&outcome.z_arrays[0]).is_ok());
    }
}
