//! Edge HTTP service
//!
//! ```rust,ignore
//! use edge_warden::edge::{DeploymentRegistry, EdgeMiddlewareStack, EdgeService};
//!
//! let service = EdgeService::new(Arc::new(registry));
//! let router = service.into_router(EdgeMiddlewareStack::new());
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use crate::edge::error_response::{extract_request_id, ErrorResponseExt};
use crate::edge::headers::paths;
use crate::edge::middleware_stack::EdgeMiddlewareStack;
use crate::edge::registry::DeploymentRegistry;
use crate::edge::request::IncomingRequest;
use axum::{
    body::Body,
    extract::{Request, State},
    response::Response,
    Router,
};
use std::sync::Arc;

/// Serves every configured deployment behind one router
#[derive(Clone)]
pub struct EdgeService {
    registry: Arc<DeploymentRegistry>,
}

impl EdgeService {
    pub fn new(registry: Arc<DeploymentRegistry>) -> Self {
        Self { registry }
    }

    /// Axum router with the health endpoint, the edge fallback and the
    /// middleware stack applied
    pub fn into_router(self, stack: EdgeMiddlewareStack) -> Router {
        let router = Router::new()
            .route(paths::HEALTH, axum::routing::get(health_handler))
            .fallback(edge_handler)
            .with_state(Arc::new(self));

        stack.apply_to_router(router)
    }
}

/// Every non-health request goes through the deployment's pipeline
async fn edge_handler(State(edge): State<Arc<EdgeService>>, request: Request<Body>) -> Response {
    let (parts, _body) = request.into_parts();
    let incoming = IncomingRequest::from_parts(&parts);
    let pipeline = edge.registry.route(incoming.host());

    match pipeline.handle(&incoming).await {
        Ok(response) => response,
        Err(error) => {
            let mut body = error.to_error_response();
            if let Some(request_id) = extract_request_id(&parts.headers) {
                body = body.with_request_id(request_id);
            }
            body.into_response_with_status(error.status_code())
        }
    }
}

/// Health check handler
async fn health_handler() -> &'static str {
    "OK"
}
