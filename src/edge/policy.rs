//! Per-deployment policy
//!
//! A [`DeploymentPolicy`] captures every knob that differs between
//! deployments of the edge: which referers are trusted, where the shard
//! token comes from, how content identifiers are named, and how cache keys
//! are composed for each asset class. Policies are plain data; the stages
//! compile them once when an [`EdgePipeline`](crate::edge::EdgePipeline) is
//! built.

use crate::edge::types::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether an asset class must carry a `Referer` header
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefererRequirement {
    Required,
    Optional,
}

/// What to do with a request that lacks a required referer
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MissingRefererAction {
    /// Answer with 403
    Reject,
    /// Answer with a 302 to a fixed decoy location
    Redirect { location: RedirectUrl },
}

/// Where the shard token is read from
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ShardStrategy {
    /// The host must match `pattern`; its first capture group is the shard
    Host { pattern: String },
    /// The shard is the numeric suffix of the file name. The host must match
    /// `host_pattern` when given, otherwise it must equal the site domain.
    Path {
        #[serde(default)]
        host_pattern: Option<String>,
    },
}

/// How a manifest name becomes a content id
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "convention", rename_all = "snake_case")]
pub enum ManifestConvention {
    /// The file name without `.m3u8`
    BaseName,
    /// The file name without `.m3u8`, which must also match `pattern`
    PreviewId {
        #[serde(default = "default_preview_id_pattern")]
        pattern: String,
    },
}

/// How a preview image name becomes a content id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PngConvention {
    /// Everything before the first hyphen
    DashPrefix,
    /// The `tv-N-N-N` prefix in front of `-index`
    StructuredId,
    /// The whole file name without `.png`, which must contain a hyphen
    DashedBaseName,
}

/// Composition of the cache key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKeyMode {
    /// Method, URL and the deployment's vary headers
    FullRequest,
    /// URL alone; shares cached bytes across all referers
    UrlOnly,
}

/// Access and caching rule for one asset class
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AssetRule {
    pub referer: RefererRequirement,
    pub cache_key: CacheKeyMode,
}

impl AssetRule {
    pub const fn new(referer: RefererRequirement, cache_key: CacheKeyMode) -> Self {
        Self { referer, cache_key }
    }

    /// Strict rule for classes without an explicit entry
    pub const fn strict() -> Self {
        Self::new(RefererRequirement::Required, CacheKeyMode::FullRequest)
    }
}

impl Default for AssetRule {
    fn default() -> Self {
        Self::strict()
    }
}

/// Rules for every asset class
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AssetRules {
    #[serde(default)]
    pub manifest: AssetRule,
    #[serde(default)]
    pub preview: AssetRule,
    #[serde(default = "default_segment_rule")]
    pub segment: AssetRule,
    /// Used for index pages and anything unclassified
    #[serde(default)]
    pub fallback: AssetRule,
}

impl Default for AssetRules {
    fn default() -> Self {
        Self {
            manifest: AssetRule::strict(),
            preview: AssetRule::strict(),
            segment: default_segment_rule(),
            fallback: AssetRule::strict(),
        }
    }
}

/// Complete configuration for one deployment of the edge
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DeploymentPolicy {
    /// Label used in logs
    pub name: String,
    /// Domain the deployment serves; used to route requests by host
    pub site_domain: RootDomain,
    /// Referer hosts equal to or under one of these domains are trusted
    pub allowed_referer_domains: Vec<RootDomain>,
    pub shard_strategy: ShardStrategy,
    pub missing_referer: MissingRefererAction,
    #[serde(default = "default_manifest_convention")]
    pub manifest: ManifestConvention,
    pub png: PngConvention,
    /// Serve `.m4s` media segments
    #[serde(default)]
    pub segments_enabled: bool,
    #[serde(default)]
    pub rules: AssetRules,
    /// Request headers folded into full-request cache keys
    #[serde(default = "default_vary_headers")]
    pub vary_headers: Vec<String>,
    /// Allow URL-only cache keys for classes that require a referer
    #[serde(default)]
    pub share_gated_cache: bool,
    /// Origin hosting suffix, e.g. `x{shard}-anisrc-top.pages.dev`
    pub origin_host_template: HostLabelTemplate,
    /// Target of the `index.html` redirect
    pub site_root: RedirectUrl,
}

/// Reasons a policy cannot be turned into a running pipeline
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Deployment '{deployment}': invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        deployment: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Deployment '{deployment}': host pattern '{pattern}' has no capture group for the shard")]
    MissingShardCapture { deployment: String, pattern: String },

    #[error("Deployment '{0}': no allowed referer domains")]
    NoRefererDomains(String),

    #[error("Deployment '{deployment}': {class} requires a referer but uses a URL-only cache key")]
    SharedGatedCache {
        deployment: String,
        class: AssetClass,
    },

    #[error("Deployment '{deployment}': invalid vary header '{header}'")]
    InvalidVaryHeader { deployment: String, header: String },

    #[error("No deployments configured")]
    NoDeployments,
}

impl DeploymentPolicy {
    /// Rule governing an asset class
    pub fn rule_for(&self, class: AssetClass) -> AssetRule {
        match class {
            AssetClass::ManifestM3U8 => self.rules.manifest,
            AssetClass::PreviewPNG => self.rules.preview,
            AssetClass::SegmentM4S => self.rules.segment,
            AssetClass::IndexHTML | AssetClass::Other => self.rules.fallback,
        }
    }

    /// Check the policy for internal consistency
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.allowed_referer_domains.is_empty() {
            return Err(PolicyError::NoRefererDomains(self.name.clone()));
        }

        match &self.shard_strategy {
            ShardStrategy::Host { pattern } => {
                if self.compile(pattern)?.captures_len() < 2 {
                    return Err(PolicyError::MissingShardCapture {
                        deployment: self.name.clone(),
                        pattern: pattern.clone(),
                    });
                }
            }
            ShardStrategy::Path {
                host_pattern: Some(pattern),
            } => {
                self.compile(pattern)?;
            }
            ShardStrategy::Path { host_pattern: None } => {}
        }

        if let ManifestConvention::PreviewId { pattern } = &self.manifest {
            self.compile(pattern)?;
        }

        for header in &self.vary_headers {
            if http::HeaderName::from_bytes(header.as_bytes()).is_err() {
                return Err(PolicyError::InvalidVaryHeader {
                    deployment: self.name.clone(),
                    header: header.clone(),
                });
            }
        }

        if !self.share_gated_cache {
            for class in [
                AssetClass::ManifestM3U8,
                AssetClass::PreviewPNG,
                AssetClass::SegmentM4S,
                AssetClass::Other,
            ] {
                let rule = self.rule_for(class);
                if rule.referer == RefererRequirement::Required
                    && rule.cache_key == CacheKeyMode::UrlOnly
                {
                    return Err(PolicyError::SharedGatedCache {
                        deployment: self.name.clone(),
                        class,
                    });
                }
            }
        }

        Ok(())
    }

    /// Compile one of this policy's patterns
    pub fn compile(&self, pattern: &str) -> Result<Regex, PolicyError> {
        Regex::new(pattern).map_err(|source| PolicyError::InvalidPattern {
            deployment: self.name.clone(),
            pattern: pattern.to_string(),
            source,
        })
    }
}

impl Default for DeploymentPolicy {
    /// The anisrc.top deployment: shard from the file name, decoy redirect
    /// for hotlinkers, dash-named previews and per-referer cache keys.
    fn default() -> Self {
        Self {
            name: "anisrc".to_string(),
            site_domain: RootDomain::try_new("anisrc.top".to_string())
                .expect("anisrc.top is a valid domain"),
            allowed_referer_domains: vec![RootDomain::try_new("anisrc.top".to_string())
                .expect("anisrc.top is a valid domain")],
            shard_strategy: ShardStrategy::Path {
                host_pattern: Some(r"(?i)^x([0-9]{2})\.anisrc\.top$".to_string()),
            },
            missing_referer: MissingRefererAction::Redirect {
                location: RedirectUrl::try_new(
                    "https://www.youtube.com/watch?v=Kq9_r9l8MpI".to_string(),
                )
                .expect("decoy URL is absolute"),
            },
            manifest: ManifestConvention::BaseName,
            png: PngConvention::DashedBaseName,
            segments_enabled: false,
            rules: AssetRules::default(),
            vary_headers: default_vary_headers(),
            share_gated_cache: false,
            origin_host_template: HostLabelTemplate::try_new(
                "x{shard}-anisrc-top.pages.dev".to_string(),
            )
            .expect("template contains the shard placeholder"),
            site_root: RedirectUrl::try_new("https://anisrc.top/".to_string())
                .expect("site root is absolute"),
        }
    }
}

fn default_manifest_convention() -> ManifestConvention {
    ManifestConvention::BaseName
}

fn default_preview_id_pattern() -> String {
    r"^(?:[0-9]+|[A-Za-z0-9]+(?:-[A-Za-z0-9]+)*)$".to_string()
}

fn default_segment_rule() -> AssetRule {
    AssetRule::new(RefererRequirement::Optional, CacheKeyMode::UrlOnly)
}

fn default_vary_headers() -> Vec<String> {
    vec![http::header::REFERER.as_str().to_string()]
}
