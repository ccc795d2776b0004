//! Configuration for the debinfo service.
//!
//! Settings are read from a TOML file; every field has a default so an
//! empty file is valid. A few settings can be overridden from the
//! environment, see [`Config::apply_env`].

use std::collections::BTreeMap;
use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::RenderPolicy;
use crate::error::ConfigError;
use crate::inspector::{DEFAULT_COMMAND, DEFAULT_TIMEOUT};
use crate::mount::MountPoint;

/// Prefix of environment variables read by [`Config::apply_env`].
pub const ENV_PREFIX: &str = "DEBINFO_";

/// Settings for the inspection command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectorConfig {
    /// Command to run, may include arguments.
    #[serde(default = "default_command")]
    pub command: String,

    /// Time limit per invocation, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Settings for the discovery pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Maximum number of archives inspected at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Address the site listens on.
    #[serde(default = "default_listen_address")]
    pub listen_address: SocketAddr,

    /// Cache directive for package pages that do not set their own.
    #[serde(default)]
    pub cache_control: Option<String>,

    /// Render pages at startup or per request.
    #[serde(default)]
    pub policy: RenderPolicy,

    #[serde(default)]
    pub inspector: InspectorConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Archive directories to publish.
    #[serde(default)]
    pub mounts: Vec<MountPoint>,

    /// Values copied into the context of every page.
    #[serde(default)]
    pub page_context: BTreeMap<String, String>,
}

fn default_command() -> String {
    DEFAULT_COMMAND.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_concurrency() -> usize {
    num_cpus::get()
}

fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            cache_control: None,
            policy: RenderPolicy::default(),
            inspector: InspectorConfig::default(),
            discovery: DiscoveryConfig::default(),
            mounts: Vec::new(),
            page_context: BTreeMap::new(),
        }
    }
}

impl InspectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply `DEBINFO_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    fn apply_overrides(
        &mut self,
        get: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(address) = get("LISTEN_ADDRESS") {
            self.listen_address = address.parse().map_err(|_| {
                ConfigError::Invalid(format!("invalid listen address: {}", address))
            })?;
        }
        if let Some(cache_control) = get("CACHE_CONTROL") {
            self.cache_control = Some(cache_control);
        }
        if let Some(policy) = get("POLICY") {
            self.policy = match policy.to_lowercase().as_str() {
                "eager" => RenderPolicy::Eager,
                "lazy" => RenderPolicy::Lazy,
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "unknown render policy: {}",
                        policy
                    )))
                }
            };
        }
        if let Some(command) = get("INSPECTOR") {
            self.inspector.command = command;
        }
        Ok(())
    }

    /// Check the settings for values that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inspector.command.trim().is_empty() {
            return Err(ConfigError::Invalid("inspector command is empty".to_string()));
        }
        if self.inspector.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "inspector timeout must be at least one second".to_string(),
            ));
        }
        if self.discovery.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "discovery concurrency must be at least 1".to_string(),
            ));
        }
        for mount in &self.mounts {
            if mount.path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "mount {} has no path",
                    mount.url_prefix
                )));
            }
            if !mount.url_prefix.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "url prefix must start with '/': {:?}",
                    mount.url_prefix
                )));
            }
        }
        Ok(())
    }
}
