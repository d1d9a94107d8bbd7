use crate::edge::cache::CacheSettings;
use crate::edge::origin::OriginSettings;
use crate::edge::policy::DeploymentPolicy;
use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;

/// Prefix of environment variable overrides, e.g. `EDGE_WARDEN__APPLICATION__PORT`
pub const ENV_PREFIX: &str = "EDGE_WARDEN";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub logging: LoggingSettings,
    #[serde(default)]
    pub origin: OriginSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default = "default_deployments")]
    pub deployments: Vec<DeploymentPolicy>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Settings {
    /// Defaults, then `config/default`, `config/{ENVIRONMENT}` and
    /// `config/local`, then `EDGE_WARDEN__*` environment variables
    pub fn new() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        defaults(&environment)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Defaults overlaid with a single configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        defaults("development")?
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }
}

fn defaults(environment: &str) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("application.host", "0.0.0.0")?
        .set_default("application.port", 8080)?
        .set_default("application.environment", environment)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "json")
}

fn default_deployments() -> Vec<DeploymentPolicy> {
    vec![DeploymentPolicy::default()]
}
