//! Property-based tests for the edge decision rules
//!
//! Generators produce referers, hosts and asset paths; the properties check
//! the access and naming invariants hold for every one of them.

use edge_warden::edge::access_guard::AccessGuard;
use edge_warden::edge::cache::CacheKey;
use edge_warden::edge::pipeline::{Decision, EdgePipeline};
use edge_warden::edge::policy::{CacheKeyMode, DeploymentPolicy, RefererRequirement};
use edge_warden::edge::types::{AccessDecision, AssetClass, EdgeError, EdgeResult, OriginUrl};
use edge_warden::edge::{InMemoryEdgeCache, IncomingRequest, OriginClient, OriginResponse};
use http::{header, HeaderValue};
use proptest::prelude::*;
use std::sync::Arc;

pub mod generators {
    use super::*;
    use proptest::string::string_regex;

    /// DNS labels
    pub fn label() -> impl Strategy<Value = String> {
        string_regex("[a-z][a-z0-9]{0,6}(-[a-z0-9]{1,4})?").unwrap()
    }

    /// Hosts under the allowed root domain, including the root itself
    pub fn allowed_host() -> impl Strategy<Value = String> {
        proptest::collection::vec(label(), 0..4).prop_map(|labels| {
            labels
                .into_iter()
                .chain(std::iter::once("anisrc.top".to_string()))
                .collect::<Vec<_>>()
                .join(".")
        })
    }

    /// Hosts that only look related to the allowed root domain
    pub fn foreign_host() -> impl Strategy<Value = String> {
        prop_oneof![
            (label(), label()).prop_map(|(a, b)| format!("{a}.{b}.com")),
            label().prop_map(|a| format!("anisrc.top.{a}.com")),
            label().prop_map(|a| format!("{a}anisrc.top")),
            label().prop_map(|a| format!("{a}-anisrc.top")),
        ]
    }

    pub fn scheme() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("http"), Just("https")]
    }

    pub fn referer(host: impl Strategy<Value = String>) -> impl Strategy<Value = String> {
        (scheme(), host, string_regex("(/[a-z0-9-]{0,12}){0,3}").unwrap())
            .prop_map(|(scheme, host, path)| format!("{scheme}://{host}{path}/"))
    }

    /// Extensions outside the served set
    pub fn unsupported_extension() -> impl Strategy<Value = String> {
        string_regex("[a-z0-9]{1,5}")
            .unwrap()
            .prop_filter("served extension", |ext| {
                !matches!(ext.as_str(), "m3u8" | "png" | "m4s" | "html")
            })
    }

    /// Base names whose last dash segment is a shard number
    pub fn sharded_name() -> impl Strategy<Value = (String, u64)> {
        (string_regex("[a-z][a-z0-9]{0,10}").unwrap(), 1u64..=99)
            .prop_map(|(stem, shard)| (format!("{stem}-{shard}"), shard))
    }
}

/// Origin that must never be reached by the properties below
struct UnreachableOrigin;

#[async_trait::async_trait]
impl OriginClient for UnreachableOrigin {
    async fn fetch(&self, url: &OriginUrl) -> EdgeResult<OriginResponse> {
        Err(EdgeError::OriginUnavailable(url.to_string()))
    }
}

fn pipeline() -> EdgePipeline {
    EdgePipeline::new(
        DeploymentPolicy::default(),
        Arc::new(InMemoryEdgeCache::default()),
        Arc::new(UnreachableOrigin),
    )
    .unwrap()
}

fn guard() -> AccessGuard {
    AccessGuard::from_policy(&DeploymentPolicy::default())
}

fn request(path: &str, referer: Option<&str>) -> IncomingRequest {
    let request = IncomingRequest::get(&format!("https://x01.anisrc.top/{path}")).unwrap();
    match referer {
        Some(referer) => {
            request.with_header(header::REFERER, HeaderValue::from_str(referer).unwrap())
        }
        None => request,
    }
}

proptest! {
    #[test]
    fn allowed_referers_are_never_rejected(
        referer in generators::referer(generators::allowed_host()),
    ) {
        for requirement in [RefererRequirement::Required, RefererRequirement::Optional] {
            let decision = guard().evaluate(Some(referer.as_str()), requirement);
            prop_assert!(matches!(decision, AccessDecision::Allow));
        }
    }

    #[test]
    fn foreign_referers_are_always_rejected(
        referer in generators::referer(generators::foreign_host()),
    ) {
        let decision = guard().evaluate(Some(referer.as_str()), RefererRequirement::Optional);
        prop_assert!(matches!(
            decision,
            AccessDecision::Reject(EdgeError::DisallowedRefererDomain(_))
        ));
    }

    #[test]
    fn gated_assets_without_referer_never_fetch((name, _) in generators::sharded_name()) {
        for ext in ["m3u8", "png"] {
            let decision = pipeline().decide(&request(&format!("{name}.{ext}"), None));
            prop_assert!(matches!(decision, Ok(Decision::Redirect(_))));
        }
    }

    #[test]
    fn foreign_referer_is_rejected_for_any_path(
        referer in generators::referer(generators::foreign_host()),
        (name, _) in generators::sharded_name(),
        ext in prop_oneof![Just("m3u8".to_string()), generators::unsupported_extension()],
    ) {
        let path = format!("{name}.{ext}");
        let decision = pipeline().decide(&request(&path, Some(referer.as_str())));
        prop_assert!(matches!(decision, Err(EdgeError::DisallowedRefererDomain(_))));
    }

    #[test]
    fn unsupported_extensions_never_fetch(
        (name, _) in generators::sharded_name(),
        ext in generators::unsupported_extension(),
    ) {
        let path = format!("{name}.{ext}");
        prop_assert_eq!(AssetClass::from_path(&path), AssetClass::Other);

        let decision = pipeline().decide(&request(&path, Some("https://anisrc.top/")));
        prop_assert!(matches!(decision, Err(EdgeError::UnsupportedAssetType(_))));
    }

    #[test]
    fn manifest_shard_comes_from_file_name((name, shard) in generators::sharded_name()) {
        let decision = pipeline()
            .decide(&request(&format!("{name}.m3u8"), Some("https://anisrc.top/")))
            .unwrap();

        let Decision::Fetch(plan) = decision else {
            return Err(TestCaseError::fail("expected a fetch"));
        };
        let expected_shard = format!("{shard:02}");
        prop_assert_eq!(plan.shard.as_ref(), expected_shard.as_str());
        prop_assert_eq!(plan.asset.content_id.as_ref(), name.as_str());
        let expected_url =
            format!("https://{name}.x{expected_shard}-anisrc-top.pages.dev/{name}.m3u8");
        prop_assert_eq!(plan.origin_url.as_ref(), expected_url.as_str());
    }

    #[test]
    fn url_only_keys_ignore_referer(
        a in generators::referer(generators::allowed_host()),
        b in generators::referer(generators::allowed_host()),
    ) {
        let vary = vec!["referer".to_string()];
        let key = |referer: &str, mode| {
            CacheKey::for_request(&request("a-01.m3u8", Some(referer)), mode, &vary)
        };

        let (a, b) = (a.as_str(), b.as_str());
        prop_assert_eq!(key(a, CacheKeyMode::UrlOnly), key(b, CacheKeyMode::UrlOnly));
        prop_assert_eq!(
            a == b,
            key(a, CacheKeyMode::FullRequest) == key(b, CacheKeyMode::FullRequest)
        );
    }
}
