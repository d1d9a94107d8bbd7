//! Middleware stack builder for clean composition

use crate::edge::middleware::*;
use axum::{middleware::from_fn, Router};

/// Builder for composing the edge middleware stack
#[derive(Clone, Debug)]
pub struct EdgeMiddlewareStack {
    enable_logging: bool,
}

impl EdgeMiddlewareStack {
    pub fn new() -> Self {
        Self {
            enable_logging: true,
        }
    }

    /// Skip per-request logging
    pub fn without_logging(mut self) -> Self {
        self.enable_logging = false;
        self
    }

    /// Apply the middleware stack to a router
    ///
    /// Outer to inner:
    /// 1. Request ID generation/propagation
    /// 2. Logging (with request ID)
    pub fn apply_to_router<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let router = if self.enable_logging {
            router.layer(from_fn(logging_middleware))
        } else {
            router
        };
        router.layer(from_fn(request_id_middleware))
    }
}

impl Default for EdgeMiddlewareStack {
    fn default() -> Self {
        Self::new()
    }
}
