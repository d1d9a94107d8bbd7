//! Origin fetching and response shaping

use crate::edge::headers::{
    CACHE_CONTROL, CACHE_CONTROL_IMMUTABLE, DEFAULT_USER_AGENT, HOP_BY_HOP, NOSNIFF,
    X_CONTENT_TYPE_OPTIONS,
};
use crate::edge::types::*;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Origin body as it arrives, chunk by chunk
pub type OriginBody = BoxStream<'static, EdgeResult<Bytes>>;

/// Response as received from the origin
pub struct OriginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: OriginBody,
}

impl fmt::Debug for OriginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OriginResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl OriginResponse {
    /// Response whose body is already in memory
    pub fn buffered(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self::chunked(status, headers, vec![body])
    }

    /// Response whose body arrives as the given chunks
    pub fn chunked(status: StatusCode, headers: HeaderMap, chunks: Vec<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: stream::iter(chunks.into_iter().map(Ok)).boxed(),
        }
    }

    /// Turn a 2xx origin response into the response served by the edge;
    /// anything else becomes [`EdgeError::OriginStatus`] and its body is
    /// dropped unread.
    ///
    /// Origin headers are copied minus hop-by-hop headers, then
    /// `Cache-Control` and `X-Content-Type-Options` are overridden. The body
    /// is left untouched.
    pub fn into_edge_response(self) -> EdgeResult<Self> {
        if !self.status.is_success() {
            return Err(EdgeError::OriginStatus(self.status));
        }

        let mut headers = self.headers;
        for name in HOP_BY_HOP {
            headers.remove(*name);
        }
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_IMMUTABLE),
        );
        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static(NOSNIFF));

        Ok(Self {
            status: self.status,
            headers,
            body: self.body,
        })
    }
}

/// An origin body read up to a byte limit
pub enum LimitedBody {
    /// The whole body, no larger than the limit
    Complete(Bytes),
    /// The body outgrew the limit: what was read so far followed by the
    /// unread remainder
    Overflow(OriginBody),
}

impl LimitedBody {
    /// Read `body` until it ends or more than `limit` bytes have arrived.
    ///
    /// Nothing past the first chunk that crosses the limit is read.
    pub async fn read(mut body: OriginBody, limit: usize) -> EdgeResult<Self> {
        let mut buffered = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            if buffered.len() + chunk.len() > limit {
                let head = stream::iter([Ok(buffered.freeze()), Ok(chunk)]);
                return Ok(Self::Overflow(head.chain(body).boxed()));
            }
            buffered.extend_from_slice(&chunk);
        }
        Ok(Self::Complete(buffered.freeze()))
    }
}

/// Fetches assets from the origin storage
#[async_trait]
pub trait OriginClient: Send + Sync {
    /// Perform a single GET. Non-2xx statuses are returned, not raised;
    /// transport failures become `OriginUnavailable`/`OriginTimeout`.
    async fn fetch(&self, url: &OriginUrl) -> EdgeResult<OriginResponse>;
}

/// Settings for the outbound client
#[derive(Clone, Debug, Deserialize)]
pub struct OriginSettings {
    pub user_agent: String,
    /// Overall request timeout; the client default applies when absent
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for OriginSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: None,
        }
    }
}

/// [`OriginClient`] over HTTPS
#[derive(Clone, Debug)]
pub struct HttpOriginClient {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpOriginClient {
    pub fn new(settings: &OriginSettings) -> Result<Self, reqwest::Error> {
        let timeout = settings.timeout_ms.map(Duration::from_millis);
        let mut builder = reqwest::Client::builder().user_agent(settings.user_agent.clone());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            timeout,
        })
    }

    fn transport_error(timeout: Option<Duration>, error: reqwest::Error) -> EdgeError {
        match timeout {
            Some(timeout) if error.is_timeout() => EdgeError::OriginTimeout(timeout),
            _ => EdgeError::OriginUnavailable(error.to_string()),
        }
    }
}

#[async_trait]
impl OriginClient for HttpOriginClient {
    async fn fetch(&self, url: &OriginUrl) -> EdgeResult<OriginResponse> {
        let timeout = self.timeout;
        let response = self
            .client
            .get(url.as_ref())
            .send()
            .await
            .map_err(|e| Self::transport_error(timeout, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        debug!(origin_url = %url, status = status.as_u16(), "Origin responded");

        let body = response
            .bytes_stream()
            .map_err(move |e| Self::transport_error(timeout, e))
            .boxed();

        Ok(OriginResponse {
            status,
            headers,
            body,
        })
    }
}
