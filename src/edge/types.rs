//! Type definitions for the edge pipeline

use derive_more::Display;
use http::StatusCode;
use nutype::nutype;
use std::time::Duration;
use thiserror::Error;

// ========== Identifier Types ==========

/// Backend partition token, e.g. `01` or `a7`
#[nutype(
    sanitize(trim),
    validate(not_empty, regex = r"^[A-Za-z0-9]{1,20}$"),
    derive(Debug, Clone, PartialEq, Eq, Hash, Display, AsRef, Serialize, Deserialize)
)]
pub struct ShardId(String);

/// Logical video/content unit, used verbatim as the origin subdomain.
///
/// Only letters, digits and hyphens are accepted so the value is always a
/// single DNS label and can never smuggle a path or a dot into the origin host.
#[nutype(
    validate(not_empty, regex = r"^[A-Za-z0-9][A-Za-z0-9-]{0,62}$"),
    derive(Debug, Clone, PartialEq, Eq, Hash, Display, AsRef, Serialize, Deserialize)
)]
pub struct ContentId(String);

/// A registrable domain such as `anisrc.top`
#[nutype(
    sanitize(trim, lowercase),
    validate(not_empty, regex = r"^[a-z0-9-]+(\.[a-z0-9-]+)+$"),
    derive(Debug, Clone, PartialEq, Eq, Hash, Display, AsRef, Serialize, Deserialize)
)]
pub struct RootDomain(String);

impl RootDomain {
    /// True when `host` is this domain or one of its subdomains
    pub fn covers(&self, host: &str) -> bool {
        let domain = self.as_ref();
        host == domain
            || host
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

/// Fully composed URL of the asset on the origin
#[nutype(
    validate(predicate = |s: &str| s.starts_with("http://") || s.starts_with("https://")),
    derive(Debug, Clone, PartialEq, Eq, Hash, Display, AsRef, Serialize, Deserialize)
)]
pub struct OriginUrl(String);

/// Absolute URL used as a `Location` target
#[nutype(
    validate(predicate = |s: &str| s.starts_with("http://") || s.starts_with("https://")),
    derive(Debug, Clone, PartialEq, Eq, Hash, Display, AsRef, Serialize, Deserialize)
)]
pub struct RedirectUrl(String);

/// Origin host template; `{shard}` is replaced by the shard token
#[nutype(
    sanitize(trim),
    validate(predicate = |s: &str| s.contains(SHARD_PLACEHOLDER) && !s.contains('/')),
    derive(Debug, Clone, PartialEq, Eq, Display, AsRef, Serialize, Deserialize)
)]
pub struct HostLabelTemplate(String);

/// Placeholder substituted in [`HostLabelTemplate`]
pub const SHARD_PLACEHOLDER: &str = "{shard}";

impl HostLabelTemplate {
    /// Render the origin hosting suffix for a shard
    pub fn render(&self, shard: &ShardId) -> String {
        self.as_ref().replace(SHARD_PLACEHOLDER, shard.as_ref())
    }
}

// ========== Asset Classification ==========

/// Kind of asset requested, derived from the lowercased path extension
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum AssetClass {
    #[display("manifest")]
    ManifestM3U8,
    #[display("preview")]
    PreviewPNG,
    #[display("segment")]
    SegmentM4S,
    #[display("index")]
    IndexHTML,
    #[display("other")]
    Other,
}

impl AssetClass {
    /// Classify a request path by its extension, ignoring case
    pub fn from_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".m3u8") {
            Self::ManifestM3U8
        } else if lower.ends_with(".png") {
            Self::PreviewPNG
        } else if lower.ends_with(".m4s") {
            Self::SegmentM4S
        } else if lower.ends_with(".html") {
            Self::IndexHTML
        } else {
            Self::Other
        }
    }

    /// Length in bytes of the extension including the dot
    pub fn extension_len(&self) -> usize {
        match self {
            Self::ManifestM3U8 => ".m3u8".len(),
            Self::PreviewPNG | Self::SegmentM4S => ".png".len(),
            Self::IndexHTML => ".html".len(),
            Self::Other => 0,
        }
    }
}

/// Outcome of the referer check
#[derive(Debug)]
pub enum AccessDecision {
    Allow,
    RedirectTo(RedirectUrl),
    Reject(EdgeError),
}

// ========== Errors ==========

/// Every way a request can terminate before a successful origin response
#[derive(Error, Debug)]
pub enum EdgeError {
    #[error("Referer required")]
    AbsentReferer,

    #[error("Invalid referer: {0}")]
    MalformedReferer(String),

    #[error("Hotlink denied for referer host '{0}'")]
    DisallowedRefererDomain(String),

    #[error("Invalid host: {0}")]
    UnrecognizedHost(String),

    #[error("Invalid shard in '{0}'")]
    InvalidShard(String),

    #[error("Not found")]
    EmptyPath,

    #[error("File not allowed: {0}")]
    UnsupportedAssetType(String),

    #[error("Invalid {kind} name: {path}")]
    InvalidAssetName { kind: AssetClass, path: String },

    #[error("Invalid preview id: {0}")]
    InvalidPreviewId(String),

    #[error("Malformed identifier: {0}")]
    MalformedIdentifier(String),

    #[error("Origin responded with {0}")]
    OriginStatus(StatusCode),

    #[error("Origin unavailable: {0}")]
    OriginUnavailable(String),

    #[error("Origin timed out after {0:?}")]
    OriginTimeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for edge pipeline operations
pub type EdgeResult<T> = Result<T, EdgeError>;
