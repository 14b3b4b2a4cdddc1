//! Provider credentials
//!
//! API keys live in a [`SecretString`]. Formatting one prints `[REDACTED]`;
//! serde sees the plain value so configs and snapshots round-trip.

use serde::{Deserialize, Serialize};
use std::fmt;

const REDACTED: &str = "[REDACTED]";

#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw credential, for building auth headers
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Blank keys count as missing
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Enough of the key to tell two keys apart in a log line
    pub fn partial_redact(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        let keep = match chars.len() {
            0 => return "[EMPTY]".to_string(),
            1..=8 => return REDACTED.to_string(),
            _ if self.0.starts_with("sk-") || self.0.starts_with("pk-") => (3, 4),
            _ => (2, 2),
        };

        let head: String = chars[..keep.0].iter().collect();
        let tail: String = chars[chars.len() - keep.1..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Log-safe one-line description of a value holding credentials
pub trait Redact {
    fn redacted(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatting_hides_value() {
        let secret = SecretString::new("sk-1234567890abcdef");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(secret.partial_redact(), "sk-...cdef");
    }

    #[test]
    fn test_partial_redact_short_and_plain_keys() {
        assert_eq!(SecretString::new("abc").partial_redact(), "[REDACTED]");
        assert_eq!(SecretString::new("").partial_redact(), "[EMPTY]");
        assert_eq!(SecretString::new("AIzaSyExample99").partial_redact(), "AI...99");
        assert_eq!(SecretString::new("키키키키키키키키키키").partial_redact(), "키키...키키");
    }

    #[test]
    fn test_blank_key_is_empty() {
        assert_eq!(SecretString::new("my-secret-value").expose_secret(), "my-secret-value");
        assert!(SecretString::new("  ").is_empty());
    }
}
