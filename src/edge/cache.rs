//! Edge response cache
//!
//! The store itself is a collaborator behind [`EdgeCache`]; the pipeline only
//! decides what the key is and when something may be stored. The in-process
//! [`InMemoryEdgeCache`] is what the binary runs with and what the tests use.

use crate::edge::policy::CacheKeyMode;
use crate::edge::request::IncomingRequest;
use crate::edge::types::EdgeResult;
use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Key under which a response is stored
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Compose the key for a request.
    ///
    /// `UrlOnly` keys are the URL without query. `FullRequest` keys add the
    /// method and the value of every vary header, so two requests share an
    /// entry only when they agree on all of them.
    pub fn for_request(request: &IncomingRequest, mode: CacheKeyMode, vary: &[String]) -> Self {
        let url = request.url();
        match mode {
            CacheKeyMode::UrlOnly => Self(url),
            CacheKeyMode::FullRequest => {
                let mut key = format!("{} {}", request.method(), url);
                for name in vary {
                    let value = request
                        .headers()
                        .get(name.as_str())
                        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                        .unwrap_or_default();
                    key.push('\n');
                    key.push_str(&name.to_ascii_lowercase());
                    key.push_str(": ");
                    key.push_str(&value);
                }
                Self(key)
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A complete response held by the cache
#[derive(Clone, Debug, PartialEq)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    /// Rebuild an HTTP response carrying exactly the stored bytes
    pub fn to_response(&self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
    }
}

/// Key/value store for edge responses.
///
/// Eviction and replication belong to the implementation. Writes are
/// last-writer-wins; the pipeline never coalesces concurrent misses.
#[async_trait]
pub trait EdgeCache: Send + Sync {
    /// Stored response for `key`, if any
    async fn lookup(&self, key: &CacheKey) -> EdgeResult<Option<CachedResponse>>;

    /// Store a response under `key`
    async fn store(&self, key: CacheKey, response: CachedResponse) -> EdgeResult<()>;

    /// Largest body worth buffering for a store; bigger bodies are streamed
    /// to the client and never stored
    fn max_entry_bytes(&self) -> usize;
}

/// Limits for the in-process cache
#[derive(Clone, Debug, Deserialize)]
pub struct CacheSettings {
    /// Maximum number of stored responses
    pub max_entries: usize,
    /// Bodies larger than this are not stored
    pub max_entry_bytes: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_entry_bytes: 64 * 1024 * 1024, // 64MB
        }
    }
}

/// Bounded in-process cache evicting the oldest insertion first
pub struct InMemoryEdgeCache {
    settings: CacheSettings,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CachedResponse>,
    insertion_order: VecDeque<CacheKey>,
}

impl InMemoryEdgeCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryEdgeCache {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

#[async_trait]
impl EdgeCache for InMemoryEdgeCache {
    async fn lookup(&self, key: &CacheKey) -> EdgeResult<Option<CachedResponse>> {
        Ok(self.state.lock().entries.get(key).cloned())
    }

    async fn store(&self, key: CacheKey, response: CachedResponse) -> EdgeResult<()> {
        if self.settings.max_entries == 0 || response.body.len() > self.settings.max_entry_bytes
        {
            return Ok(());
        }

        let mut state = self.state.lock();
        if state.entries.insert(key.clone(), response).is_none() {
            state.insertion_order.push_back(key);
        }
        while state.entries.len() > self.settings.max_entries {
            match state.insertion_order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }
        Ok(())
    }

    fn max_entry_bytes(&self) -> usize {
        self.settings.max_entry_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{header, HeaderValue};

    fn response(body: &'static str) -> CachedResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        CachedResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    fn request(referer: Option<&'static str>) -> IncomingRequest {
        let request = IncomingRequest::get("https://x01.anisrc.top/movie-01.m3u8?v=2").unwrap();
        match referer {
            Some(r) => request.with_header(header::REFERER, HeaderValue::from_static(r)),
            None => request,
        }
    }

    fn vary() -> Vec<String> {
        vec!["referer".to_string()]
    }

    fn key(referer: Option<&'static str>, mode: CacheKeyMode) -> CacheKey {
        CacheKey::for_request(&request(referer), mode, &vary())
    }

    #[test]
    fn url_only_key_ignores_referer_and_query() {
        let a = key(Some("https://a.anisrc.top/"), CacheKeyMode::UrlOnly);
        let b = key(None, CacheKeyMode::UrlOnly);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "https://x01.anisrc.top/movie-01.m3u8");
    }

    #[test]
    fn full_request_key_varies_by_referer() {
        let a = key(Some("https://a.anisrc.top/"), CacheKeyMode::FullRequest);
        let b = key(Some("https://b.anisrc.top/"), CacheKeyMode::FullRequest);
        let a_again = key(Some("https://a.anisrc.top/"), CacheKeyMode::FullRequest);
        assert_ne!(a, b);
        assert_eq!(a, a_again);
        assert!(a.as_str().starts_with("GET https://x01.anisrc.top/movie-01.m3u8"));
    }

    #[tokio::test]
    async fn stored_response_is_returned_unchanged() {
        let cache = InMemoryEdgeCache::default();
        let key = CacheKey::for_request(&request(None), CacheKeyMode::UrlOnly, &[]);

        assert!(cache.lookup(&key).await.unwrap().is_none());
        cache.store(key.clone(), response("#EXTM3U")).await.unwrap();

        let hit = cache.lookup(&key).await.unwrap().unwrap();
        assert_eq!(hit, response("#EXTM3U"));
    }

    #[tokio::test]
    async fn last_writer_wins() {
        let cache = InMemoryEdgeCache::default();
        let key = CacheKey::for_request(&request(None), CacheKeyMode::UrlOnly, &[]);

        cache.store(key.clone(), response("first")).await.unwrap();
        cache.store(key.clone(), response("second")).await.unwrap();

        assert_eq!(cache.len(), 1);
        let hit = cache.lookup(&key).await.unwrap().unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"second"));
    }

    #[tokio::test]
    async fn evicts_oldest_entry_when_full() {
        let cache = InMemoryEdgeCache::new(CacheSettings {
            max_entries: 2,
            max_entry_bytes: 1024,
        });
        let keys: Vec<CacheKey> = ["a", "b", "c"]
            .iter()
            .map(|name| CacheKey(format!("https://x01.anisrc.top/{name}")))
            .collect();

        for key in &keys {
            cache.store(key.clone(), response("body")).await.unwrap();
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.lookup(&keys[0]).await.unwrap().is_none());
        assert!(cache.lookup(&keys[2]).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn oversized_bodies_are_not_stored() {
        let cache = InMemoryEdgeCache::new(CacheSettings {
            max_entries: 10,
            max_entry_bytes: 4,
        });
        let key = CacheKey("https://x01.anisrc.top/big".to_string());

        cache.store(key.clone(), response("too large")).await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn to_response_preserves_status_headers_and_body() {
        let stored = response("payload");
        let http_response = stored.to_response();

        assert_eq!(http_response.status(), StatusCode::OK);
        assert_eq!(http_response.headers(), &stored.headers);
        let body = axum::body::to_bytes(http_response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, stored.body);
    }
}
