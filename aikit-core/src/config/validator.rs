//! Configuration validation utilities

use super::error::ValidationError;
use super::schema::{AikitConfig, ConfigUpdate};
use crate::protocol::types::Options;
use serde_json::Value;

/// Configuration validator with rules beyond the structural checks
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &AikitConfig) -> Result<(), ValidationError> {
        // First run the built-in validation
        config.validate()?;

        self.validate_options(&config.options, "options")?;
        Ok(())
    }

    /// Validate a partial update before it is merged
    pub fn validate_update(&self, update: &ConfigUpdate) -> Result<(), ValidationError> {
        if let Some(key) = &update.api_key {
            if key.is_empty() {
                return Err(ValidationError::required("apiKey"));
            }
        }

        if update.max_retries == Some(0) {
            return Err(ValidationError::out_of_range("maxRetries", "must be at least 1"));
        }

        if update.timeout_ms == Some(0) {
            return Err(ValidationError::out_of_range("timeoutMs", "must be greater than 0"));
        }

        if let Some(options) = &update.options {
            self.validate_options(options, "options")?;
        }

        Ok(())
    }

    /// Check well-known default parameters; unknown keys pass through
    fn validate_options(&self, options: &Options, path: &str) -> Result<(), ValidationError> {
        if let Some(temperature) = options.get("temperature") {
            match temperature.as_f64() {
                Some(t) if (0.0..=2.0).contains(&t) => {}
                Some(_) => {
                    return Err(ValidationError::out_of_range(
                        format!("{}.temperature", path),
                        "must be between 0.0 and 2.0",
                    ))
                }
                None => {
                    return Err(ValidationError::invalid_value(
                        format!("{}.temperature", path),
                        "number",
                        describe(temperature),
                    ))
                }
            }
        }

        for key in ["maxTokens", "max_tokens"] {
            if let Some(value) = options.get(key) {
                if !matches!(value.as_u64(), Some(n) if n > 0) {
                    return Err(ValidationError::invalid_value(
                        format!("{}.{}", path, key),
                        "positive integer",
                        describe(value),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::error::ValidationErrorKind;
    use crate::providers::adapter::ProviderKind;

    #[test]
    fn test_temperature_range() {
        let validator = ConfigValidator::new();
        let config = AikitConfig::new(ProviderKind::OpenAI, "sk").option("temperature", 3.5);

        let err = validator.validate(&config).unwrap_err();
        assert_eq!(err.field_path, "options.temperature");
        assert!(matches!(err.kind, ValidationErrorKind::OutOfRange { .. }));
    }

    #[test]
    fn test_max_tokens_type() {
        let validator = ConfigValidator::new();
        let config = AikitConfig::new(ProviderKind::OpenAI, "sk").option("maxTokens", "lots");

        let err = validator.validate(&config).unwrap_err();
        assert_eq!(err.field_path, "options.maxTokens");
        assert!(err.to_string().contains("\"lots\""));
    }

    #[test]
    fn test_update_validation() {
        let validator = ConfigValidator::new();
        assert!(validator.validate_update(&ConfigUpdate::default()).is_ok());

        let update = ConfigUpdate {
            max_retries: Some(0),
            ..Default::default()
        };
        assert_eq!(validator.validate_update(&update).unwrap_err().field_path, "maxRetries");
    }
}
