//! Surface intersection service.
//!
//! Accepts batches of surface blob identifiers plus a polyline, pulls the
//! blobs out of the object store in parallel, decodes each one as an Irap
//! binary surface, and samples every surface along the polyline.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use intersect_api::config::{ComputeConfig, FetchConfig};
use intersect_api::server;
use intersect_api::state::AppState;

/// Surface intersection server
#[derive(Parser, Debug)]
#[command(name = "intersect-api")]
#[command(about = "Surface intersection service for Irap binary surfaces")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:5001", env = "INTERSECT_LISTEN_ADDR")]
    listen: String,

    /// Maximum concurrent blob fetches per request
    #[arg(long, default_value = "16", env = "INTERSECT_FETCH_CONCURRENCY")]
    fetch_concurrency: usize,

    /// Maximum concurrent decode jobs per request (default: CPU count)
    #[arg(long, env = "INTERSECT_COMPUTE_CONCURRENCY")]
    compute_concurrency: Option<usize>,

    /// Total per-blob fetch timeout in seconds
    #[arg(long, default_value = "30", env = "INTERSECT_FETCH_TIMEOUT_SECS")]
    fetch_timeout_secs: u64,

    /// Per-blob connect timeout in seconds
    #[arg(long, default_value = "10", env = "INTERSECT_CONNECT_TIMEOUT_SECS")]
    connect_timeout_secs: u64,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    info!(cpus = num_cpus::get(), "Starting intersect-api");

    let fetch = FetchConfig {
        max_concurrent: args.fetch_concurrency,
        request_timeout: Duration::from_secs(args.fetch_timeout_secs),
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
    };
    let compute = match args.compute_concurrency {
        Some(max_concurrent) => ComputeConfig { max_concurrent },
        None => ComputeConfig::default(),
    };

    let state = Arc::new(AppState::new(&fetch, compute)?);

    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", args.listen))?;

    server::run_server(state, addr).await
}
