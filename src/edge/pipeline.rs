//! The per-request decision engine
//!
//! One [`EdgePipeline`] serves one deployment. For every request it runs,
//! in order:
//!
//! 1. **Cache lookup** keyed per the asset class's cache-key mode; a hit is
//!    returned as stored and nothing else runs
//! 2. **Access guard** on the `Referer` header
//! 3. **Host classifier** validating the host and locating the shard
//! 4. **Asset resolver** classifying the path and deriving the content id
//! 5. **Origin proxy** fetching `https://{content id}.{shard host}/{path}`,
//!    shaping the headers and storing successful responses; bodies larger
//!    than the cache entry limit are streamed through without being stored
//!
//! Any stage may end the request early with a redirect or an
//! [`EdgeError`]; errors are never cached and never retried.

use crate::edge::access_guard::AccessGuard;
use crate::edge::asset_resolver::{AssetResolver, PathOutcome, ResolvedAsset};
use crate::edge::cache::{CacheKey, CachedResponse, EdgeCache};
use crate::edge::headers::LOCATION;
use crate::edge::host_classifier::HostClassifier;
use crate::edge::origin::{LimitedBody, OriginClient, OriginResponse};
use crate::edge::policy::{DeploymentPolicy, PolicyError};
use crate::edge::request::IncomingRequest;
use crate::edge::types::*;
use axum::body::Body;
use http::{HeaderValue, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

/// What the decision stages concluded for a request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Answer with a 302 without contacting the origin
    Redirect(RedirectUrl),
    /// Fetch the asset from the origin
    Fetch(OriginPlan),
}

/// Everything needed to fetch one asset from the origin
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginPlan {
    pub shard: ShardId,
    pub asset: ResolvedAsset,
    pub origin_url: OriginUrl,
}

/// Request pipeline for one deployment
pub struct EdgePipeline {
    policy: Arc<DeploymentPolicy>,
    guard: AccessGuard,
    hosts: HostClassifier,
    assets: AssetResolver,
    cache: Arc<dyn EdgeCache>,
    origin: Arc<dyn OriginClient>,
}

impl EdgePipeline {
    /// Validate the policy and compile its stages
    pub fn new(
        policy: DeploymentPolicy,
        cache: Arc<dyn EdgeCache>,
        origin: Arc<dyn OriginClient>,
    ) -> Result<Self, PolicyError> {
        policy.validate()?;

        Ok(Self {
            guard: AccessGuard::from_policy(&policy),
            hosts: HostClassifier::from_policy(&policy)?,
            assets: AssetResolver::from_policy(&policy)?,
            policy: Arc::new(policy),
            cache,
            origin,
        })
    }

    pub fn policy(&self) -> &DeploymentPolicy {
        &self.policy
    }

    /// Cache key for a request under this deployment's rules
    pub fn cache_key(&self, request: &IncomingRequest) -> CacheKey {
        let class = AssetClass::from_path(request.path());
        let rule = self.policy.rule_for(class);
        CacheKey::for_request(request, rule.cache_key, &self.policy.vary_headers)
    }

    /// Run the decision stages without touching the cache or the origin
    pub fn decide(&self, request: &IncomingRequest) -> EdgeResult<Decision> {
        let class = AssetClass::from_path(request.path());
        let requirement = self.policy.rule_for(class).referer;

        match self.guard.evaluate_header(request.referer(), requirement) {
            AccessDecision::Allow => {}
            AccessDecision::RedirectTo(location) => {
                debug!(
                    deployment = %self.policy.name,
                    host = request.host(),
                    path = request.path(),
                    "Missing referer, redirecting"
                );
                return Ok(Decision::Redirect(location));
            }
            AccessDecision::Reject(error) => return Err(error),
        }

        let host_shard = self.hosts.classify(request.host())?;

        let path = match AssetResolver::normalize(request.path())? {
            PathOutcome::IndexRedirect => {
                return Ok(Decision::Redirect(self.policy.site_root.clone()));
            }
            PathOutcome::Asset(path) => path,
        };

        let shard = self.hosts.resolve_shard(host_shard, path)?;
        let asset = self.assets.resolve(path)?;
        let origin_url = self.origin_url(&shard, &asset.content_id, path)?;

        Ok(Decision::Fetch(OriginPlan {
            shard,
            asset,
            origin_url,
        }))
    }

    /// Compose `https://{content id}.{shard host}/{path}`
    pub fn origin_url(
        &self,
        shard: &ShardId,
        content_id: &ContentId,
        path: &str,
    ) -> EdgeResult<OriginUrl> {
        let url = format!(
            "https://{}.{}/{}",
            content_id,
            self.policy.origin_host_template.render(shard),
            path
        );
        OriginUrl::try_new(url).map_err(|e| EdgeError::Internal(e.to_string()))
    }

    /// Serve one request end to end
    pub async fn handle(&self, request: &IncomingRequest) -> EdgeResult<Response<Body>> {
        let key = self.cache_key(request);
        match self.cache.lookup(&key).await {
            Ok(Some(hit)) => {
                debug!(deployment = %self.policy.name, key = %key, "Cache hit");
                return Ok(hit.to_response());
            }
            Ok(None) => debug!(deployment = %self.policy.name, key = %key, "Cache miss"),
            Err(e) => warn!(
                deployment = %self.policy.name,
                error = %e,
                "Cache lookup failed, treating as miss"
            ),
        }

        let plan = match self.decide(request) {
            Ok(Decision::Fetch(plan)) => plan,
            Ok(Decision::Redirect(location)) => return redirect(&location),
            Err(error) => {
                warn!(
                    deployment = %self.policy.name,
                    host = request.host(),
                    path = request.path(),
                    error = %error,
                    "Request rejected"
                );
                return Err(error);
            }
        };

        debug!(
            deployment = %self.policy.name,
            shard = %plan.shard,
            class = %plan.asset.class,
            content_id = %plan.asset.content_id,
            origin_url = %plan.origin_url,
            "Fetching from origin"
        );

        let shaped = match self
            .origin
            .fetch(&plan.origin_url)
            .await
            .and_then(OriginResponse::into_edge_response)
        {
            Ok(shaped) => shaped,
            Err(error) => {
                warn!(origin_url = %plan.origin_url, error = %error, "Origin fetch failed");
                return Err(error);
            }
        };

        let body = match LimitedBody::read(shaped.body, self.cache.max_entry_bytes()).await {
            Ok(LimitedBody::Complete(body)) => body,
            Ok(LimitedBody::Overflow(stream)) => {
                debug!(
                    origin_url = %plan.origin_url,
                    "Body exceeds the cache entry limit, streaming uncached"
                );
                let mut response = Response::new(Body::from_stream(stream));
                *response.status_mut() = shaped.status;
                *response.headers_mut() = shaped.headers;
                return Ok(response);
            }
            Err(error) => {
                warn!(origin_url = %plan.origin_url, error = %error, "Origin body failed");
                return Err(error);
            }
        };

        let cached = CachedResponse {
            status: shaped.status,
            headers: shaped.headers,
            body,
        };
        if let Err(e) = self.cache.store(key, cached.clone()).await {
            warn!(deployment = %self.policy.name, error = %e, "Cache store failed");
        }

        Ok(cached.to_response())
    }
}

/// 302 with a `Location` header
pub fn redirect(location: &RedirectUrl) -> EdgeResult<Response<Body>> {
    let value = HeaderValue::from_str(location.as_ref())
        .map_err(|_| EdgeError::Internal(format!("bad redirect location {location}")))?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::FOUND;
    response.headers_mut().insert(LOCATION, value);
    Ok(response)
}
