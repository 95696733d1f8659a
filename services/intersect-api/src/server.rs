//! HTTP server for the intersection service.
//!
//! Provides endpoints for:
//! - `POST /intersectSurface` - Fetch surface blobs and sample them along a polyline
//! - `GET /` - Greeting
//! - `GET /health` - Health check

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::fetch::FetchFailure;
use crate::intersect::{intersect_batch, DecodeFailure};
use crate::state::AppState;

/// Request body for /intersectSurface.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntersectRequest {
    /// Object-store identifiers of the surface blobs.
    pub object_ids: Vec<String>,
    /// Opaque access token, appended verbatim to each blob URL.
    pub auth_token: String,
    /// Object-store base URI.
    pub base_uri: String,
    /// Polyline X positions.
    pub xcoords: Vec<f64>,
    /// Polyline Y positions, paired with `xcoords` by index.
    pub ycoords: Vec<f64>,
}

impl IntersectRequest {
    /// Reject malformed requests before any network traffic.
    fn validate(&self) -> Result<(), String> {
        if self.xcoords.len() != self.ycoords.len() {
            return Err(format!(
                "xcoords and ycoords must have equal length, got {} and {}",
                self.xcoords.len(),
                self.ycoords.len()
            ));
        }
        if self.object_ids.iter().any(|id| id.is_empty()) {
            return Err("object ids must be non-empty".to_string());
        }
        Ok(())
    }
}

/// Response body for a completed intersection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntersectResponse {
    /// One row of sampled Z values per decoded surface. Row order is
    /// unspecified; values inside a row follow the request coordinates.
    pub z_values: Vec<Vec<f64>>,
    /// Blobs that fetched but did not decode.
    pub decode_failures: Vec<DecodeFailure>,
}

/// Response body when blob retrieval fails.
#[derive(Debug, Serialize)]
pub struct FetchErrorResponse {
    pub error: &'static str,
    pub failures: Vec<FetchFailure>,
}

/// Response body for a request rejected by validation.
#[derive(Debug, Serialize)]
pub struct BadRequestResponse {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// POST /intersectSurface - Run the two-stage pipeline
///
/// Stage 1 gates the request: any retrieval failure aborts with 400 before
/// any decoding starts, and already-fetched bytes are discarded so the
/// caller never sees a partial result set. Stage 2 samples every retrieved
/// blob and reports undecodable ones alongside the result rows.
async fn intersect_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<IntersectRequest>,
) -> Response {
    if let Err(message) = request.validate() {
        warn!(error = %message, "Rejecting invalid intersect request");
        return (
            StatusCode::BAD_REQUEST,
            Json(BadRequestResponse { error: message }),
        )
            .into_response();
    }

    info!(
        objects = request.object_ids.len(),
        points = request.xcoords.len(),
        "Received intersect request"
    );

    let batch = state
        .fetcher
        .fetch_batch(&request.object_ids, &request.auth_token, &request.base_uri)
        .await;

    if !batch.failures.is_empty() {
        warn!(
            failed = batch.failures.len(),
            discarded = batch.fetched_count(),
            "Aborting intersect request on retrieval failures"
        );
        return (
            StatusCode::BAD_REQUEST,
            Json(FetchErrorResponse {
                error: "blob retrieval failed",
                failures: batch.failures,
            }),
        )
            .into_response();
    }

    let telemetry = batch.telemetry;
    let compute_started = Instant::now();
    let outcome = intersect_batch(
        batch.blobs,
        request.xcoords,
        request.ycoords,
        &state.compute,
    )
    .await;

    info!(
        download = %telemetry,
        isec_ms = compute_started.elapsed().as_millis() as u64,
        surfaces = outcome.z_arrays.len(),
        undecodable = outcome.decode_failures.len(),
        "Intersection complete"
    );

    (
        StatusCode::OK,
        Json(IntersectResponse {
            z_values: outcome.z_arrays,
            decode_failures: outcome.decode_failures,
        }),
    )
        .into_response()
}

/// GET / - Greeting
async fn root_handler() -> &'static str {
    "Hello, World 👋!"
}

/// GET /health - Health check
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "intersect-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/intersectSurface", post(intersect_handler))
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server.
pub async fn run_server(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting intersect-api HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
