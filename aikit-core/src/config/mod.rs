//! Configuration module for AIKit
//!
//! This module provides the configuration schema and validation, plus
//! loaders for YAML and JSON files with `${ENV_VAR}` interpolation.

mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use env::{interpolate_env_vars, referenced_env_vars};
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{AikitConfig, CacheConfig, ConfigUpdate, ProviderConfig};
pub use secrets::{Redact, SecretString};
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<AikitConfig> {
    let path = path.as_ref();
    let content = read_interpolated(path)?;

    let config: AikitConfig =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_string_lossy().to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<AikitConfig> {
    let path = path.as_ref();
    let content = read_interpolated(path)?;

    let config: AikitConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_string_lossy().to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

fn read_interpolated(path: &Path) -> ConfigResult<String> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;

    // Interpolate environment variables before parsing
    env::interpolate_env_vars(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_yaml() {
        let yaml = r#"
providers:
  - name: openai
    apiKey: sk-one
    priority: 2
  - name: claude
    apiKey: sk-two
    priority: 1
    baseUrl: https://gateway.example.com/v1
autoFallback: true
maxRetries: 2
options:
  temperature: 0.3
cache:
  maxAgeMs: 1000
"#;
        let config: AikitConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.auto_fallback);
        assert_eq!(config.cache.max_age_ms, 1000);
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.provider_chain()[0].name.name(), "claude");
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }
}
