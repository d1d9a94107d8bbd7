//! Referer-based hotlink protection

use crate::edge::policy::{DeploymentPolicy, MissingRefererAction, RefererRequirement};
use crate::edge::types::*;
use http::HeaderValue;
use tracing::debug;
use url::Url;

/// Decides whether a request's `Referer` lets it through
#[derive(Clone, Debug)]
pub struct AccessGuard {
    allowed_domains: Vec<RootDomain>,
    missing_referer: MissingRefererAction,
}

impl AccessGuard {
    pub fn new(allowed_domains: Vec<RootDomain>, missing_referer: MissingRefererAction) -> Self {
        Self {
            allowed_domains,
            missing_referer,
        }
    }

    pub fn from_policy(policy: &DeploymentPolicy) -> Self {
        Self::new(
            policy.allowed_referer_domains.clone(),
            policy.missing_referer.clone(),
        )
    }

    /// Evaluate a raw `Referer` header.
    ///
    /// A header whose bytes are not UTF-8 is present but unparsable, so it is
    /// rejected rather than falling through to the missing-referer action.
    pub fn evaluate_header(
        &self,
        referer: Option<&HeaderValue>,
        requirement: RefererRequirement,
    ) -> AccessDecision {
        let Some(value) = referer else {
            return self.evaluate(None, requirement);
        };

        match std::str::from_utf8(value.as_bytes()) {
            Ok(referer) => self.evaluate(Some(referer), requirement),
            Err(e) => {
                let lossy = String::from_utf8_lossy(value.as_bytes()).into_owned();
                debug!(referer = %lossy, error = %e, "Undecodable referer");
                AccessDecision::Reject(EdgeError::MalformedReferer(lossy))
            }
        }
    }

    /// Evaluate a referer value against the allow-list.
    ///
    /// An empty header counts as absent. A present value that does not parse
    /// as an absolute URL is rejected outright.
    pub fn evaluate(
        &self,
        referer: Option<&str>,
        requirement: RefererRequirement,
    ) -> AccessDecision {
        let referer = match referer.map(str::trim).filter(|r| !r.is_empty()) {
            Some(referer) => referer,
            None => return self.on_missing(requirement),
        };

        let parsed = match Url::parse(referer) {
            Ok(url) => url,
            Err(e) => {
                debug!(referer, error = %e, "Unparsable referer");
                return AccessDecision::Reject(EdgeError::MalformedReferer(referer.to_string()));
            }
        };

        let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        if self.is_allowed_host(&host) {
            AccessDecision::Allow
        } else {
            AccessDecision::Reject(EdgeError::DisallowedRefererDomain(host))
        }
    }

    /// True when `host` equals or is a subdomain of an allowed domain
    pub fn is_allowed_host(&self, host: &str) -> bool {
        self.allowed_domains.iter().any(|domain| domain.covers(host))
    }

    fn on_missing(&self, requirement: RefererRequirement) -> AccessDecision {
        match (requirement, &self.missing_referer) {
            (RefererRequirement::Optional, _) => AccessDecision::Allow,
            (RefererRequirement::Required, MissingRefererAction::Reject) => {
                AccessDecision::Reject(EdgeError::AbsentReferer)
            }
            (RefererRequirement::Required, MissingRefererAction::Redirect { location }) => {
                AccessDecision::RedirectTo(location.clone())
            }
        }
    }
}
