//! Environment variable interpolation for configuration

use super::error::ConfigError;
use regex::Regex;
use std::env;

const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

fn env_var_pattern() -> Result<Regex, ConfigError> {
    Regex::new(ENV_VAR_PATTERN).map_err(|e| ConfigError::Invalid {
        message: format!("bad interpolation pattern: {}", e),
    })
}

/// Replace every `${VAR}` reference with the variable's value.
///
/// Fails on the first reference whose variable is not set.
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let pattern = env_var_pattern()?;
    let mut result = String::with_capacity(content.len());
    let mut last_end = 0;

    for cap in pattern.captures_iter(content) {
        let (Some(full_match), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        let value = env::var(name.as_str()).map_err(|_| ConfigError::MissingEnvVar {
            var: name.as_str().to_string(),
        })?;

        result.push_str(&content[last_end..full_match.start()]);
        result.push_str(&value);
        last_end = full_match.end();
    }

    result.push_str(&content[last_end..]);
    Ok(result)
}

/// Names of all variables referenced in `content`
pub fn referenced_env_vars(content: &str) -> Result<Vec<String>, ConfigError> {
    let pattern = env_var_pattern()?;
    Ok(pattern
        .captures_iter(content)
        .map(|cap| cap[1].to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_env_vars() {
        env::set_var("AIKIT_ENV_TEST_VAR", "test_value");

        let content = "apiKey: ${AIKIT_ENV_TEST_VAR}";
        let result = interpolate_env_vars(content).unwrap();
        assert_eq!(result, "apiKey: test_value");

        env::remove_var("AIKIT_ENV_TEST_VAR");
    }

    #[test]
    fn test_missing_env_var() {
        let content = "apiKey: ${AIKIT_SURELY_MISSING_VAR}";
        let result = interpolate_env_vars(content);

        match result {
            Err(ConfigError::MissingEnvVar { var }) => assert_eq!(var, "AIKIT_SURELY_MISSING_VAR"),
            other => panic!("Expected MissingEnvVar, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_env_vars() {
        env::set_var("AIKIT_ENV_VAR1", "value1");
        env::set_var("AIKIT_ENV_VAR2", "value2");

        let content = "key1: ${AIKIT_ENV_VAR1}, key2: ${AIKIT_ENV_VAR2}, again: ${AIKIT_ENV_VAR1}";
        let result = interpolate_env_vars(content).unwrap();
        assert_eq!(result, "key1: value1, key2: value2, again: value1");

        env::remove_var("AIKIT_ENV_VAR1");
        env::remove_var("AIKIT_ENV_VAR2");
    }

    #[test]
    fn test_referenced_env_vars() {
        let vars = referenced_env_vars("a: ${OPENAI_API_KEY}, b: ${API_BASE_URL}, c: $NOT_THIS").unwrap();
        assert_eq!(vars, vec!["OPENAI_API_KEY", "API_BASE_URL"]);
    }
}
