//! Test utilities for edge module testing

#[cfg(test)]
pub mod test_helpers {
    use crate::edge::cache::{CacheSettings, EdgeCache, InMemoryEdgeCache};
    use crate::edge::origin::{OriginClient, OriginResponse};
    use crate::edge::pipeline::EdgePipeline;
    use crate::edge::policy::*;
    use crate::edge::request::IncomingRequest;
    use crate::edge::types::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::{header, HeaderMap, HeaderValue, StatusCode};
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Referer accepted by the default deployment
    pub const SITE_REFERER: &str = "https://anisrc.top/watch/movie-01";

    /// Decoy location of the default deployment
    pub const DECOY: &str = "https://www.youtube.com/watch?v=Kq9_r9l8MpI";

    enum Reply {
        Respond {
            status: StatusCode,
            headers: HeaderMap,
            chunks: Vec<Bytes>,
        },
        Unavailable(String),
        Timeout(Duration),
    }

    /// Origin stub that counts fetches and remembers the URLs it was asked for
    pub struct CountingOrigin {
        reply: Reply,
        calls: AtomicUsize,
        urls: Mutex<Vec<String>>,
    }

    impl CountingOrigin {
        fn with_reply(reply: Reply) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
                urls: Mutex::new(Vec::new()),
            }
        }

        /// 200 with `body` and an origin content type
        pub fn ok(body: &'static str) -> Self {
            Self::status(StatusCode::OK, body)
        }

        pub fn status(status: StatusCode, body: &'static str) -> Self {
            Self::chunked(status, &[body])
        }

        /// Response whose body arrives in several chunks
        pub fn chunked(status: StatusCode, chunks: &[&'static str]) -> Self {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            Self::with_reply(Reply::Respond {
                status,
                headers,
                chunks: chunks
                    .iter()
                    .map(|chunk| Bytes::from_static(chunk.as_bytes()))
                    .collect(),
            })
        }

        /// Every fetch fails at the transport level
        pub fn unavailable() -> Self {
            Self::with_reply(Reply::Unavailable("connection refused".to_string()))
        }

        pub fn timing_out() -> Self {
            Self::with_reply(Reply::Timeout(Duration::from_secs(3)))
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn urls(&self) -> Vec<String> {
            self.urls.lock().clone()
        }
    }

    #[async_trait]
    impl OriginClient for CountingOrigin {
        async fn fetch(&self, url: &OriginUrl) -> EdgeResult<OriginResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().push(url.to_string());
            match &self.reply {
                Reply::Respond {
                    status,
                    headers,
                    chunks,
                } => Ok(OriginResponse::chunked(
                    *status,
                    headers.clone(),
                    chunks.clone(),
                )),
                Reply::Unavailable(reason) => Err(EdgeError::OriginUnavailable(reason.clone())),
                Reply::Timeout(after) => Err(EdgeError::OriginTimeout(*after)),
            }
        }
    }

    /// A pipeline together with handles on its collaborators
    pub struct Harness {
        pub pipeline: EdgePipeline,
        pub origin: Arc<CountingOrigin>,
        pub cache: Arc<InMemoryEdgeCache>,
    }

    pub fn harness(policy: DeploymentPolicy, origin: CountingOrigin) -> Harness {
        harness_with_cache(policy, origin, CacheSettings::default())
    }

    pub fn harness_with_cache(
        policy: DeploymentPolicy,
        origin: CountingOrigin,
        cache: CacheSettings,
    ) -> Harness {
        let origin = Arc::new(origin);
        let cache = Arc::new(InMemoryEdgeCache::new(cache));
        let pipeline = EdgePipeline::new(
            policy,
            Arc::clone(&cache) as Arc<dyn EdgeCache>,
            Arc::clone(&origin) as Arc<dyn OriginClient>,
        )
        .expect("test policy should be valid");
        Harness {
            pipeline,
            origin,
            cache,
        }
    }

    /// Deployment that reads the shard from the host, rejects missing
    /// referers and names content by structured ids
    pub fn partner_policy() -> DeploymentPolicy {
        DeploymentPolicy {
            name: "partner".to_string(),
            site_domain: RootDomain::try_new("partner.example".to_string())
                .expect("test domain should be valid"),
            allowed_referer_domains: vec![RootDomain::try_new("partner.example".to_string())
                .expect("test domain should be valid")],
            shard_strategy: ShardStrategy::Host {
                pattern: r"(?i)^s([0-9]{2})\.partner\.example$".to_string(),
            },
            missing_referer: MissingRefererAction::Reject,
            manifest: ManifestConvention::PreviewId {
                pattern: r"^(?:[0-9]+|[A-Za-z0-9]+(?:-[A-Za-z0-9]+)*)$".to_string(),
            },
            png: PngConvention::StructuredId,
            segments_enabled: true,
            rules: AssetRules::default(),
            vary_headers: vec!["referer".to_string()],
            share_gated_cache: false,
            origin_host_template: HostLabelTemplate::try_new(
                "s{shard}.partner-origin.example".to_string(),
            )
            .expect("test template should be valid"),
            site_root: RedirectUrl::try_new("https://partner.example/".to_string())
                .expect("test URL should be valid"),
        }
    }

    /// GET of `url` with an optional referer
    pub fn get(url: &str, referer: Option<&'static str>) -> IncomingRequest {
        let request = IncomingRequest::get(url).expect("test URL should parse");
        match referer {
            Some(referer) => {
                request.with_header(header::REFERER, HeaderValue::from_static(referer))
            }
            None => request,
        }
    }

    /// Router-level request addressed by `Host` header
    pub fn http_request(
        host: &str,
        path: &str,
        referer: Option<&str>,
    ) -> axum::http::Request<axum::body::Body> {
        let mut builder = axum::http::Request::builder()
            .uri(path)
            .header(header::HOST, host);
        if let Some(referer) = referer {
            builder = builder.header(header::REFERER, referer);
        }
        builder
            .body(axum::body::Body::empty())
            .expect("test request should be valid")
    }

    pub async fn body_bytes(response: axum::response::Response) -> Bytes {
        response
            .into_body()
            .collect()
            .await
            .expect("test body should be readable")
            .to_bytes()
    }
}
