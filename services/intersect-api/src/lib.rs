//! Surface intersection service.
//!
//! Accepts a batch of surface blob identifiers plus a polyline, retrieves
//! the blobs from the object store in parallel, decodes each one as an Irap
//! binary surface, and samples every surface along the polyline. Exposed as
//! a library so integration tests can drive the router directly.

pub mod config;
pub mod fetch;
pub mod intersect;
pub mod server;
pub mod state;
