//! Edge Warden - a referer-gated edge gateway for HLS assets
//!
//! Requests for manifests, preview images and media segments are checked
//! against per-deployment policy, mapped to a shard-partitioned origin and
//! answered from an edge cache wherever possible.

pub mod application;
pub mod config;
pub mod edge;
pub mod error;

pub use application::Application;
pub use error::{Error, Result};
