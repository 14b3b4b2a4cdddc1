//! Configuration schema structures with serde support

use super::error::ValidationError;
use super::secrets::{Redact, SecretString};
use crate::protocol::types::Options;
use crate::providers::adapter::ProviderKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure for AIKit.
///
/// Either `provider` + `apiKey` (single-provider mode) or a non-empty
/// `providers` list must be given; the list wins when both are present.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AikitConfig {
    /// Provider used in single-provider mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,

    /// Credential used in single-provider mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<SecretString>,

    /// Provider chain entries, ordered by priority when the chain is built
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderConfig>,

    /// Switch to the next provider after a failure
    #[serde(default)]
    pub auto_fallback: bool,

    #[serde(default = "default_true")]
    pub enable_cache: bool,

    #[serde(default = "default_true")]
    pub enable_cost_tracking: bool,

    /// Attempts per provider before the chain is exhausted
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Default provider parameters, merged under per-call overrides
    #[serde(default, skip_serializing_if = "Options::is_empty")]
    pub options: Options,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Backoff unit in milliseconds (waits are `unit * 2^(attempt-1)`)
    #[serde(default = "default_backoff_unit")]
    pub backoff_unit_ms: u64,
}

/// One entry of the provider chain
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProviderConfig {
    pub name: ProviderKind,

    /// API key (supports environment variable interpolation)
    pub api_key: SecretString,

    /// Lower values are tried first
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Override for gateways and tests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(name: ProviderKind, api_key: impl Into<SecretString>) -> Self {
        Self {
            name,
            api_key: api_key.into(),
            priority: default_priority(),
            base_url: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

impl Redact for ProviderConfig {
    fn redacted(&self) -> String {
        format!(
            "{} (priority {}, key {})",
            self.name,
            self.priority,
            self.api_key.partial_redact()
        )
    }
}

/// Response cache limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheConfig {
    /// Entry lifetime in milliseconds
    #[serde(default = "default_cache_max_age")]
    pub max_age_ms: u64,

    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_ms: default_cache_max_age(),
            max_entries: default_cache_max_entries(),
        }
    }
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_millis(self.max_age_ms)
    }
}

/// Partial configuration accepted by `Aikit::update_config`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<SecretString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_fallback: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_unit_ms: Option<u64>,

    /// Merged key by key into the configured defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
}

// Default value functions for serde
fn default_true() -> bool {
    true
}
fn default_priority() -> i32 {
    1
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout() -> u64 {
    30_000
}
fn default_backoff_unit() -> u64 {
    1000
}
fn default_cache_max_age() -> u64 {
    60 * 60 * 1000
}
fn default_cache_max_entries() -> usize {
    100
}

impl AikitConfig {
    /// Single-provider configuration with every other field at its default
    pub fn new(provider: ProviderKind, api_key: impl Into<SecretString>) -> Self {
        Self {
            provider: Some(provider),
            api_key: Some(api_key.into()),
            ..Self::empty()
        }
    }

    /// Multi-provider configuration
    pub fn with_providers(providers: Vec<ProviderConfig>) -> Self {
        Self {
            providers,
            ..Self::empty()
        }
    }

    fn empty() -> Self {
        Self {
            provider: None,
            api_key: None,
            providers: Vec::new(),
            auto_fallback: false,
            enable_cache: true,
            enable_cost_tracking: true,
            max_retries: default_max_retries(),
            timeout_ms: default_timeout(),
            options: Options::new(),
            cache: CacheConfig::default(),
            backoff_unit_ms: default_backoff_unit(),
        }
    }

    pub fn auto_fallback(mut self, enabled: bool) -> Self {
        self.auto_fallback = enabled;
        self
    }

    pub fn enable_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }

    pub fn enable_cost_tracking(mut self, enabled: bool) -> Self {
        self.enable_cost_tracking = enabled;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn backoff_unit_ms(mut self, backoff_unit_ms: u64) -> Self {
        self.backoff_unit_ms = backoff_unit_ms;
        self
    }

    pub fn cache_limits(mut self, max_age_ms: u64, max_entries: usize) -> Self {
        self.cache = CacheConfig {
            max_age_ms,
            max_entries,
        };
        self
    }

    /// Set a default provider parameter
    pub fn option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    /// The provider chain in dispatch order.
    ///
    /// Entries are sorted by ascending priority; ties keep their configured
    /// order. In single-provider mode the chain has one entry.
    pub fn provider_chain(&self) -> Vec<ProviderConfig> {
        if !self.providers.is_empty() {
            let mut chain = self.providers.clone();
            chain.sort_by_key(|p| p.priority);
            return chain;
        }

        match (self.provider, &self.api_key) {
            (Some(name), Some(api_key)) => vec![ProviderConfig::new(name, api_key.clone())],
            _ => Vec::new(),
        }
    }

    /// Built-in structural validation
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.providers.is_empty() {
            if self.provider.is_none() {
                return Err(ValidationError::required("provider")
                    .with_hint("Set either 'provider' and 'apiKey' or a non-empty 'providers' list"));
            }

            match &self.api_key {
                Some(key) if !key.is_empty() => {}
                _ => return Err(ValidationError::required("apiKey")),
            }
        }

        for (i, provider) in self.providers.iter().enumerate() {
            provider.validate(&format!("providers[{}]", i))?;
        }

        if self.max_retries == 0 {
            return Err(ValidationError::out_of_range(
                "maxRetries",
                "must be at least 1",
            ));
        }

        if self.timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                "timeoutMs",
                "must be greater than 0",
            ));
        }

        if self.cache.max_entries == 0 {
            return Err(ValidationError::out_of_range(
                "cache.maxEntries",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl ProviderConfig {
    /// Validate provider configuration
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.api_key.is_empty() {
            return Err(ValidationError::required(format!("{}.apiKey", path)));
        }

        if let Some(base_url) = &self.base_url {
            validate_base_url(base_url, &format!("{}.baseUrl", path))?;
        }

        Ok(())
    }
}

/// Base URLs must parse and use http(s)
pub(crate) fn validate_base_url(base_url: &str, path: &str) -> Result<(), ValidationError> {
    let url = url::Url::parse(base_url).map_err(|e| ValidationError::invalid_url(path, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ValidationError::invalid_url(
            path,
            format!("scheme must be http or https, got {}", other),
        )),
    }
}
