//! HTTP header constants for the edge
//!
//! Header names and fixed header values used by the pipeline live here so
//! the stages and the tests agree on them.

use ::http::header;

/// Header name for request ID used for tracing and correlation
pub const X_REQUEST_ID: &str = "x-request-id";

/// Scheme the client used, set by the TLS terminator in front of the edge
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// `Cache-Control` value stamped on every successful origin response
pub const CACHE_CONTROL_IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// `X-Content-Type-Options` value stamped on every successful origin response
pub const NOSNIFF: &str = "nosniff";

/// Default `User-Agent` sent to the origin
pub const DEFAULT_USER_AGENT: &str = concat!("edge_warden/", env!("CARGO_PKG_VERSION"));

/// Standard header re-exports for convenience
pub use header::{CACHE_CONTROL, LOCATION, X_CONTENT_TYPE_OPTIONS};

/// Hop-by-hop headers that must not be copied from the origin response
pub const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Well-known paths
pub mod paths {
    /// Health check endpoint path
    pub const HEALTH: &str = "/health";
}
