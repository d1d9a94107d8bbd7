//! Host validation and shard extraction

use crate::edge::policy::{DeploymentPolicy, PolicyError, ShardStrategy};
use crate::edge::types::*;
use http::uri::Authority;
use regex::Regex;

/// Compiled form of a [`ShardStrategy`]
#[derive(Clone, Debug)]
enum HostRule {
    /// Host must match; capture group 1 is the shard
    ShardFromHost(Regex),
    /// Host must match; shard comes from the path
    MatchHost(Regex),
    /// Host must equal the site domain; shard comes from the path
    LiteralHost(RootDomain),
}

/// Validates request hosts and works out which shard serves a request
#[derive(Clone, Debug)]
pub struct HostClassifier {
    rule: HostRule,
}

impl HostClassifier {
    pub fn from_policy(policy: &DeploymentPolicy) -> Result<Self, PolicyError> {
        let rule = match &policy.shard_strategy {
            ShardStrategy::Host { pattern } => HostRule::ShardFromHost(policy.compile(pattern)?),
            ShardStrategy::Path {
                host_pattern: Some(pattern),
            } => HostRule::MatchHost(policy.compile(pattern)?),
            ShardStrategy::Path { host_pattern: None } => {
                HostRule::LiteralHost(policy.site_domain.clone())
            }
        };
        Ok(Self { rule })
    }

    /// Validate the host, returning the shard when the host carries it
    pub fn classify(&self, host: &str) -> EdgeResult<Option<ShardId>> {
        let hostname = normalize_host(host);

        match &self.rule {
            HostRule::ShardFromHost(pattern) => {
                let token = pattern
                    .captures(&hostname)
                    .and_then(|caps| caps.get(1))
                    .ok_or_else(|| EdgeError::UnrecognizedHost(hostname.clone()))?;
                ShardId::try_new(token.as_str().to_string())
                    .map(Some)
                    .map_err(|_| EdgeError::UnrecognizedHost(hostname.clone()))
            }
            HostRule::MatchHost(pattern) if pattern.is_match(&hostname) => Ok(None),
            HostRule::LiteralHost(domain) if hostname == domain.as_ref() => Ok(None),
            HostRule::MatchHost(_) | HostRule::LiteralHost(_) => {
                Err(EdgeError::UnrecognizedHost(hostname))
            }
        }
    }

    /// Resolve the shard for a request: from the host if it carried one,
    /// otherwise from the path's file name
    pub fn resolve_shard(&self, host_shard: Option<ShardId>, path: &str) -> EdgeResult<ShardId> {
        match host_shard {
            Some(shard) => Ok(shard),
            None => shard_from_path(path),
        }
    }
}

/// Lowercased host name without any port
pub fn normalize_host(host: &str) -> String {
    host.parse::<Authority>()
        .map(|authority| authority.host().to_string())
        .unwrap_or_else(|_| host.to_string())
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Read the shard from the last hyphen-delimited segment of the file name.
///
/// The leading decimal digits of that segment form the shard number;
/// `1..=9` are zero-padded to two digits, anything else is used as is.
pub fn shard_from_path(path: &str) -> EdgeResult<ShardId> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let last_segment = file_name.rsplit('-').next().unwrap_or(file_name);
    let digits_end = last_segment
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(last_segment.len());
    let digits = &last_segment[..digits_end];

    let number: u64 = digits
        .parse()
        .map_err(|_| EdgeError::InvalidShard(path.to_string()))?;

    let token = if (1..=9).contains(&number) {
        format!("{number:02}")
    } else {
        number.to_string()
    };

    ShardId::try_new(token).map_err(|_| EdgeError::InvalidShard(path.to_string()))
}
