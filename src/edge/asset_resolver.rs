//! Asset path classification and content id extraction

use crate::edge::policy::{DeploymentPolicy, ManifestConvention, PngConvention, PolicyError};
use crate::edge::types::*;
use regex::Regex;

/// Prefix shared by structured preview and segment names
const STRUCTURED_ID_PATTERN: &str = r"(?i)^(tv-\d+-\d+-\d+)-index";

/// Result of normalizing the request path
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathOutcome<'a> {
    /// `index.html` in any case; answered with a redirect to the site root
    IndexRedirect,
    /// Path without leading slashes, still to be resolved
    Asset(&'a str),
}

/// A path that passed every naming rule
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub class: AssetClass,
    pub content_id: ContentId,
}

#[derive(Clone, Debug)]
enum ManifestRule {
    BaseName,
    PreviewId(Regex),
}

/// Maps request paths onto asset classes and content ids
#[derive(Clone, Debug)]
pub struct AssetResolver {
    manifest: ManifestRule,
    png: PngConvention,
    segments_enabled: bool,
    structured_id: Regex,
}

impl AssetResolver {
    pub fn from_policy(policy: &DeploymentPolicy) -> Result<Self, PolicyError> {
        let manifest = match &policy.manifest {
            ManifestConvention::BaseName => ManifestRule::BaseName,
            ManifestConvention::PreviewId { pattern } => {
                ManifestRule::PreviewId(policy.compile(pattern)?)
            }
        };

        Ok(Self {
            manifest,
            png: policy.png,
            segments_enabled: policy.segments_enabled,
            structured_id: policy.compile(STRUCTURED_ID_PATTERN)?,
        })
    }

    /// Strip leading slashes and pick out the special cases
    pub fn normalize(path: &str) -> EdgeResult<PathOutcome<'_>> {
        let trimmed = path.trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(EdgeError::EmptyPath);
        }
        if trimmed.eq_ignore_ascii_case("index.html") {
            return Ok(PathOutcome::IndexRedirect);
        }
        Ok(PathOutcome::Asset(trimmed))
    }

    /// Classify a normalized path and derive its content id.
    ///
    /// The path is forwarded to the origin as is, so a served asset must be a
    /// single file name without separators or `..`.
    pub fn resolve(&self, path: &str) -> EdgeResult<ResolvedAsset> {
        let class = AssetClass::from_path(path);
        let served = match class {
            AssetClass::ManifestM3U8 | AssetClass::PreviewPNG => true,
            AssetClass::SegmentM4S => self.segments_enabled,
            AssetClass::IndexHTML | AssetClass::Other => false,
        };
        if served && !is_file_name(path) {
            return Err(EdgeError::MalformedIdentifier(path.to_string()));
        }

        let content_id = match class {
            AssetClass::ManifestM3U8 => self.manifest_id(base_name(path, class))?,
            AssetClass::PreviewPNG => self.preview_id(path)?,
            AssetClass::SegmentM4S if self.segments_enabled => self.structured_id(path, class)?,
            AssetClass::SegmentM4S | AssetClass::IndexHTML | AssetClass::Other => {
                return Err(EdgeError::UnsupportedAssetType(path.to_string()));
            }
        };
        Ok(ResolvedAsset { class, content_id })
    }

    fn manifest_id(&self, base: &str) -> EdgeResult<ContentId> {
        if let ManifestRule::PreviewId(pattern) = &self.manifest {
            if !pattern.is_match(base) {
                return Err(EdgeError::InvalidPreviewId(base.to_string()));
            }
        }
        ContentId::try_new(base.to_string())
            .map_err(|_| EdgeError::MalformedIdentifier(base.to_string()))
    }

    fn preview_id(&self, path: &str) -> EdgeResult<ContentId> {
        let class = AssetClass::PreviewPNG;
        let base = base_name(path, class);
        let invalid = || EdgeError::InvalidAssetName {
            kind: class,
            path: path.to_string(),
        };

        match self.png {
            PngConvention::DashPrefix => {
                let (prefix, _) = base.split_once('-').ok_or_else(invalid)?;
                ContentId::try_new(prefix.to_string()).map_err(|_| invalid())
            }
            PngConvention::StructuredId => self.structured_id(path, class),
            PngConvention::DashedBaseName => {
                if !base.contains('-') {
                    return Err(invalid());
                }
                ContentId::try_new(base.to_string())
                    .map_err(|_| EdgeError::MalformedIdentifier(base.to_string()))
            }
        }
    }

    fn structured_id(&self, path: &str, class: AssetClass) -> EdgeResult<ContentId> {
        self.structured_id
            .captures(path)
            .and_then(|caps| caps.get(1))
            .and_then(|id| ContentId::try_new(id.as_str().to_string()).ok())
            .ok_or_else(|| EdgeError::InvalidAssetName {
                kind: class,
                path: path.to_string(),
            })
    }
}

fn is_file_name(path: &str) -> bool {
    !path.contains("..")
        && path
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// Path without the extension of its class
fn base_name(path: &str, class: AssetClass) -> &str {
    &path[..path.len() - class.extension_len()]
}
