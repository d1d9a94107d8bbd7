//! Edge gateway for HLS assets
//!
//! Requests pass through a fixed pipeline: cache lookup, referer check, host
//! classification, asset resolution and finally the origin fetch. Each
//! deployment configures the pipeline through a [`DeploymentPolicy`]; the
//! [`DeploymentRegistry`] lets several deployments share one process.

pub mod access_guard;
pub mod asset_resolver;
pub mod cache;
pub mod error_response;
pub mod headers;
pub mod host_classifier;
pub mod middleware;
pub mod middleware_stack;
pub mod origin;
pub mod pipeline;
pub mod policy;
pub mod registry;
pub mod request;
pub mod service;
pub mod types;

#[cfg(test)]
pub mod test_utils;



pub use cache::{CacheKey, CacheSettings, CachedResponse, EdgeCache, InMemoryEdgeCache};
pub use middleware_stack::EdgeMiddlewareStack;
pub use origin::{
    HttpOriginClient, LimitedBody, OriginBody, OriginClient, OriginResponse, OriginSettings,
};
pub use pipeline::{Decision, EdgePipeline, OriginPlan};
pub use policy::{DeploymentPolicy, PolicyError};
pub use registry::DeploymentRegistry;
pub use request::IncomingRequest;
pub use service::EdgeService;
pub use types::{EdgeError, EdgeResult};
