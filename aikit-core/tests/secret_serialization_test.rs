//! SecretString keeps its value when persisted but never when printed

use aikit_core::config::{ProviderConfig, Redact, SecretString};
use aikit_core::providers::ProviderKind;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
struct StoredCredential {
    api_key: SecretString,
    name: String,
}

#[test]
fn test_secret_string_serialization_roundtrip() {
    let stored = StoredCredential {
        api_key: SecretString::new("sk-secret-key-123"),
        name: "test".to_string(),
    };

    let json = serde_json::to_string(&stored).unwrap();
    assert!(json.contains("sk-secret-key-123"));
    assert!(!json.contains("[REDACTED]"));

    let deserialized: StoredCredential = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.api_key.expose_secret(), "sk-secret-key-123");
    assert_eq!(format!("{:?}", deserialized.api_key), "[REDACTED]");
    assert_eq!(format!("{}", deserialized.api_key), "[REDACTED]");
}

#[test]
fn test_yaml_serialization_roundtrip() {
    let stored = StoredCredential {
        api_key: SecretString::new("my-api-key-value"),
        name: "provider".to_string(),
    };

    let yaml = serde_yaml::to_string(&stored).unwrap();
    assert!(yaml.contains("my-api-key-value"));

    let deserialized: StoredCredential = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(deserialized.api_key.expose_secret(), "my-api-key-value");
}

#[test]
fn test_provider_config_logs_partial_key() {
    let provider = ProviderConfig::new(ProviderKind::OpenAI, "sk-1234567890abcdef").with_priority(2);
    assert_eq!(provider.redacted(), "openai (priority 2, key sk-...cdef)");
}
