//! Configuration types for the SPF flattener
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::split::MAX_MECHANISMS_PER_RECORD;

/// Main SPF flattener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpfConfig {
    /// Domain whose SPF record is managed (e.g., "example.com")
    pub domain: String,

    /// Prefix of generated sub-record names
    #[serde(default = "default_subdomain_prefix")]
    pub subdomain_prefix: String,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// TXT resolver used while flattening
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SpfConfig {
    /// Create a new configuration for `domain` with defaults
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            subdomain_prefix: default_subdomain_prefix(),
            provider: ProviderConfig::default(),
            resolver: ResolverConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Set the sub-record prefix
    pub fn with_subdomain_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subdomain_prefix = prefix.into();
        self
    }

    /// Set the engine settings
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.validate_target()?;
        self.provider.validate()?;
        self.resolver.validate()?;
        self.engine.validate()?;

        Ok(())
    }

    /// Validate the managed domain and sub-record prefix
    pub fn validate_target(&self) -> Result<(), crate::Error> {
        if self.domain.is_empty() {
            return Err(crate::Error::config("No domain configured"));
        }
        if self.domain.ends_with('.') {
            return Err(crate::Error::config(
                "Domain must not carry a trailing dot",
            ));
        }
        if self.subdomain_prefix.is_empty() {
            return Err(crate::Error::config("Subdomain prefix cannot be empty"));
        }
        if self.subdomain_prefix.contains('.') {
            return Err(crate::Error::config(
                "Subdomain prefix must be a single label",
            ));
        }
        Ok(())
    }
}

/// Read a policy file and trim surrounding whitespace
///
/// The file holds the SPF record one would publish if DNS had no lookup or
/// size limits.
pub fn load_policy_file(path: impl AsRef<Path>) -> Result<String, crate::Error> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let text = text.trim();
    if text.is_empty() {
        return Err(crate::Error::config(format!(
            "Policy file {} is empty",
            path.as_ref().display()
        )));
    }
    Ok(text.to_string())
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Zone ID (optional, can be auto-detected)
        zone_id: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token, .. } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Cloudflare {
            api_token: String::new(),
            zone_id: None,
        }
    }
}

/// TXT resolver configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolverConfig {
    /// Use the host's resolver configuration (resolv.conf)
    #[default]
    System,

    /// Cloudflare public resolvers
    Cloudflare,

    /// Google public resolvers
    Google,

    /// Quad9 public resolvers
    Quad9,

    /// Custom resolver
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ResolverConfig {
    /// Validate the resolver configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ResolverConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom resolver factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// Get the factory name used to build this resolver
    ///
    /// Built-in upstreams all share the "hickory" factory.
    pub fn type_name(&self) -> &str {
        match self {
            ResolverConfig::Custom { factory, .. } => factory,
            _ => "hickory",
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between update cycles in long-running mode
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Most external lookups a policy may need and still be published
    /// unflattened
    #[serde(default = "default_lookup_limit")]
    pub lookup_limit: usize,

    /// CIDR mechanisms per generated sub-record
    #[serde(default = "default_max_mechanisms_per_record")]
    pub max_mechanisms_per_record: usize,

    /// How long an applied state is trusted before reconciling again anyway
    ///
    /// Set to 0 to reconcile on every cycle.
    #[serde(default = "default_memo_max_age_secs")]
    pub memo_max_age_secs: u64,

    /// Log planned writes without performing them
    #[serde(default)]
    pub dry_run: bool,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Update interval must be > 0"));
        }
        if self.max_mechanisms_per_record == 0 {
            return Err(crate::Error::config(
                "Mechanisms per record must be > 0",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            lookup_limit: default_lookup_limit(),
            max_mechanisms_per_record: default_max_mechanisms_per_record(),
            memo_max_age_secs: default_memo_max_age_secs(),
            dry_run: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_subdomain_prefix() -> String {
    "_spf".to_string()
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_lookup_limit() -> usize {
    10
}

fn default_max_mechanisms_per_record() -> usize {
    MAX_MECHANISMS_PER_RECORD
}

fn default_memo_max_age_secs() -> u64 {
    3600
}

fn default_event_channel_capacity() -> usize {
    1000
}
