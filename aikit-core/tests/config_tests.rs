//! Integration tests for configuration loading and validation

use aikit_core::config::{load_from_json, load_from_yaml, ConfigError, ValidationErrorKind};
use aikit_core::providers::ProviderKind;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to create a test config file
fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn validation_path(err: ConfigError) -> String {
    match err {
        ConfigError::Validation(e) => e.field_path,
        other => panic!("Expected Validation, got {:?}", other),
    }
}

#[test]
fn test_load_valid_yaml_config() {
    env::set_var("AIKIT_TEST_OPENAI_KEY", "sk-from-env");

    let yaml = r#"
providers:
  - name: openai
    apiKey: ${AIKIT_TEST_OPENAI_KEY}
    priority: 2
  - name: anthropic
    apiKey: sk-ant-inline
    priority: 1
autoFallback: true
maxRetries: 2
timeoutMs: 5000
options:
  temperature: 0.2
  maxTokens: 256
cache:
  maxAgeMs: 60000
  maxEntries: 10
"#;

    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "aikit.yaml", yaml);
    let config = load_from_yaml(path).unwrap();

    assert!(config.auto_fallback);
    assert_eq!(config.max_retries, 2);
    assert_eq!(config.cache.max_entries, 10);
    assert_eq!(config.providers[0].api_key.expose_secret(), "sk-from-env");

    let chain = config.provider_chain();
    assert_eq!(chain[0].name, ProviderKind::Claude);
    assert_eq!(chain[1].name, ProviderKind::OpenAI);

    env::remove_var("AIKIT_TEST_OPENAI_KEY");
}

#[test]
fn test_load_single_provider_json_config() {
    env::set_var("AIKIT_TEST_GEMINI_KEY", "g-key");

    let json = r#"{
  "provider": "gemini",
  "apiKey": "${AIKIT_TEST_GEMINI_KEY}",
  "enableCache": false
}"#;

    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "aikit.json", json);
    let config = load_from_json(path).unwrap();

    assert_eq!(config.provider, Some(ProviderKind::Gemini));
    assert!(!config.enable_cache);
    assert!(config.enable_cost_tracking);

    let chain = config.provider_chain();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].api_key.expose_secret(), "g-key");

    env::remove_var("AIKIT_TEST_GEMINI_KEY");
}

#[test]
fn test_missing_env_var() {
    let yaml = "provider: openai\napiKey: ${AIKIT_TEST_NEVER_SET}\n";
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "aikit.yaml", yaml);

    match load_from_yaml(path) {
        Err(ConfigError::MissingEnvVar { var }) => assert_eq!(var, "AIKIT_TEST_NEVER_SET"),
        other => panic!("Expected MissingEnvVar, got {:?}", other),
    }
}

#[test]
fn test_blank_key_reports_field_path() {
    let yaml = r#"
providers:
  - name: openai
    apiKey: sk-one
  - name: claude
    apiKey: "  "
"#;
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "aikit.yaml", yaml);

    assert_eq!(validation_path(load_from_yaml(path).unwrap_err()), "providers[1].apiKey");
}

#[test]
fn test_no_provider_at_all() {
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "aikit.json", r#"{"autoFallback": true}"#);

    assert_eq!(validation_path(load_from_json(path).unwrap_err()), "provider");
}

#[test]
fn test_invalid_base_url_scheme() {
    let yaml = r#"
providers:
  - name: openai
    apiKey: sk-one
    baseUrl: ftp://example.com
"#;
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "aikit.yaml", yaml);

    match load_from_yaml(path) {
        Err(ConfigError::Validation(e)) => {
            assert_eq!(e.field_path, "providers[0].baseUrl");
            assert!(matches!(e.kind, ValidationErrorKind::InvalidUrl { .. }));
        }
        other => panic!("Expected Validation, got {:?}", other),
    }
}

#[test]
fn test_invalid_temperature_range() {
    let json = r#"{"provider": "openai", "apiKey": "sk", "options": {"temperature": 5}}"#;
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "aikit.json", json);

    assert_eq!(validation_path(load_from_json(path).unwrap_err()), "options.temperature");
}

#[test]
fn test_zero_cache_entries_rejected() {
    let yaml = "provider: openai\napiKey: sk\ncache:\n  maxEntries: 0\n";
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "aikit.yaml", yaml);

    assert_eq!(validation_path(load_from_yaml(path).unwrap_err()), "cache.maxEntries");
}

#[test]
fn test_unknown_field_is_a_parse_error() {
    let yaml = "provider: openai\napiKey: sk\nretries: 4\n";
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "aikit.yaml", yaml);

    match load_from_yaml(path) {
        Err(ConfigError::Parse { message, .. }) => assert!(message.contains("retries")),
        other => panic!("Expected Parse, got {:?}", other),
    }
}

#[test]
fn test_unknown_provider_name_is_a_parse_error() {
    let json = r#"{"provider": "mistral", "apiKey": "sk"}"#;
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "aikit.json", json);

    assert!(matches!(
        load_from_json(path),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = load_from_yaml(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}

#[test]
fn test_api_key_redaction() {
    let yaml = "provider: openai\napiKey: sk-1234567890abcdef\n";
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "aikit.yaml", yaml);
    let config = load_from_yaml(path).unwrap();

    let debug_output = format!("{:?}", config);
    assert!(!debug_output.contains("sk-1234567890abcdef"));
    assert!(debug_output.contains("[REDACTED]"));
}
