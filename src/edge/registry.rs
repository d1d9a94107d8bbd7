//! Several deployments served by one process

use crate::edge::cache::EdgeCache;
use crate::edge::host_classifier::normalize_host;
use crate::edge::origin::OriginClient;
use crate::edge::pipeline::EdgePipeline;
use crate::edge::policy::{DeploymentPolicy, PolicyError};
use std::sync::Arc;

/// Registry of running pipelines, one per deployment
pub struct DeploymentRegistry {
    pipelines: Vec<Arc<EdgePipeline>>,
}

impl DeploymentRegistry {
    /// Build a pipeline per policy; all of them share the cache and origin client
    pub fn from_policies(
        policies: Vec<DeploymentPolicy>,
        cache: Arc<dyn EdgeCache>,
        origin: Arc<dyn OriginClient>,
    ) -> Result<Self, PolicyError> {
        let pipelines = policies
            .into_iter()
            .map(|policy| {
                EdgePipeline::new(policy, Arc::clone(&cache), Arc::clone(&origin)).map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(pipelines)
    }

    pub fn new(pipelines: Vec<Arc<EdgePipeline>>) -> Result<Self, PolicyError> {
        if pipelines.is_empty() {
            return Err(PolicyError::NoDeployments);
        }
        Ok(Self { pipelines })
    }

    /// Pipeline for a request host.
    ///
    /// The first deployment whose site domain covers the host wins. Hosts no
    /// deployment claims go to the first one, whose host classifier rejects
    /// them after the referer check has run.
    pub fn route(&self, host: &str) -> Arc<EdgePipeline> {
        let hostname = normalize_host(host);
        let pipeline = self
            .pipelines
            .iter()
            .find(|p| p.policy().site_domain.covers(&hostname))
            .unwrap_or(&self.pipelines[0]);
        Arc::clone(pipeline)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
