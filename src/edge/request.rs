//! The inbound request as seen by the pipeline

use crate::edge::headers::X_FORWARDED_PROTO;
use http::{header, HeaderMap, HeaderValue, Method, Uri};

/// Immutable view of one inbound request
#[derive(Clone, Debug)]
pub struct IncomingRequest {
    method: Method,
    scheme: String,
    host: String,
    path: String,
    headers: HeaderMap,
}

impl IncomingRequest {
    /// Build from the parts of an HTTP request.
    ///
    /// The host comes from the `Host` header, falling back to the URI
    /// authority. The scheme comes from the URI, then `X-Forwarded-Proto`,
    /// and defaults to `https` since TLS is terminated in front of us.
    pub fn from_parts(parts: &http::request::Parts) -> Self {
        Self::new(parts.method.clone(), &parts.uri, parts.headers.clone())
    }

    pub fn new(method: Method, uri: &Uri, headers: HeaderMap) -> Self {
        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|a| a.to_string()))
            .unwrap_or_default()
            .to_ascii_lowercase();

        let scheme = uri
            .scheme_str()
            .or_else(|| {
                headers
                    .get(X_FORWARDED_PROTO)
                    .and_then(|h| h.to_str().ok())
            })
            .unwrap_or("https")
            .to_ascii_lowercase();

        Self {
            method,
            scheme,
            host,
            path: uri.path().to_string(),
            headers,
        }
    }

    /// Convenience constructor for a GET of an absolute URL
    pub fn get(url: &str) -> Result<Self, http::uri::InvalidUri> {
        let uri: Uri = url.parse()?;
        Ok(Self::new(Method::GET, &uri, HeaderMap::new()))
    }

    /// Add or replace a header
    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host as sent by the client, lowercased, port included
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Raw request path including the leading slash
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw `Referer` header; decoding is left to the access guard
    pub fn referer(&self) -> Option<&HeaderValue> {
        self.headers.get(header::REFERER)
    }

    /// Request URL without query string
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path)
    }
}
