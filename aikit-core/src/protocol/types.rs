//! Core protocol types for chat interactions
//!
//! This module contains the provider-agnostic shapes that flow through the
//! dispatcher. The design prioritizes:
//! - A single request shape (text plus free-form options) for every provider
//! - A single normalized response shape regardless of who served the call
//! - Usage accounting that stays internally consistent

use crate::providers::adapter::ProviderKind;
use crate::validation::ValidationRules;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form per-call parameters (model id, temperature, history, ...)
pub type Options = Map<String, Value>;

/// Role of a message in a conversation history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions that guide the model's behavior
    System,
    /// User input message
    User,
    /// Assistant (model) response
    #[serde(alias = "model")]
    Assistant,
}

impl MessageRole {
    /// Wire name used by chat-completion style APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A single prior turn supplied through the `history` option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Text content of the message
    pub content: String,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A normalized chat request.
///
/// Immutable once handed to the dispatcher: every attempt of a call sees the
/// same text and the same merged options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub text: String,

    /// Provider parameters, merged from config defaults and call overrides
    #[serde(default)]
    pub options: Options,
}

impl ChatRequest {
    /// Create a request without options
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: Options::new(),
        }
    }

    /// Create a request with an explicit option map
    pub fn with_options(text: impl Into<String>, options: Options) -> Self {
        Self {
            text: text.into(),
            options,
        }
    }

    /// Set a single option
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Whether the text is empty once surrounding whitespace is removed
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// First non-null option among several spellings of the same key
    pub fn option(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .filter_map(|key| self.options.get(*key))
            .find(|value| !value.is_null())
    }

    pub fn option_str(&self, keys: &[&str]) -> Option<&str> {
        self.option(keys).and_then(Value::as_str)
    }

    pub fn option_f64(&self, keys: &[&str]) -> Option<f64> {
        self.option(keys).and_then(Value::as_f64)
    }

    pub fn option_u64(&self, keys: &[&str]) -> Option<u64> {
        self.option(keys).and_then(Value::as_u64)
    }

    /// Requested model id, if any
    pub fn model(&self) -> Option<&str> {
        self.option_str(&["model"])
    }

    /// System prompt supplied through `systemMessage` / `system_message`
    pub fn system_message(&self) -> Option<&str> {
        self.option_str(&["systemMessage", "system_message"])
    }

    /// Conversation history; malformed entries are skipped
    pub fn history(&self) -> Vec<Message> {
        match self.option(&["history"]) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| serde_json::from_value::<Message>(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Per-call controls that are not provider parameters
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Provider parameters overriding the configured defaults
    pub params: Options,

    /// Bypass the response cache for this call (both lookup and store)
    pub skip_cache: bool,

    /// Validation rules the response must satisfy
    pub validate: Option<ValidationRules>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a provider parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    pub fn validate(mut self, rules: ValidationRules) -> Self {
        self.validate = Some(rules);
        self
    }
}

/// Token-like consumption reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_units: u64,
    pub completion_units: u64,
    pub total_units: u64,
}

impl Usage {
    /// Build usage from the fields a provider reported.
    ///
    /// When both prompt and completion counts are present the total is their
    /// sum, whatever total the provider claimed.
    pub fn from_reported(prompt: Option<u64>, completion: Option<u64>, total: Option<u64>) -> Self {
        let prompt_units = prompt.unwrap_or(0);
        let completion_units = completion.unwrap_or(0);
        let total_units = match (prompt, completion) {
            (Some(p), Some(c)) => p.saturating_add(c),
            _ => total.unwrap_or(prompt_units.saturating_add(completion_units)),
        };

        Self {
            prompt_units,
            completion_units,
            total_units,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_units == 0 && self.prompt_units == 0 && self.completion_units == 0
    }
}

/// The provider-independent response handed back to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    /// Extracted text (may be empty, never absent)
    pub text: String,

    /// The untouched provider payload
    pub raw_payload: Value,

    pub usage: Usage,

    /// Model that produced the answer, as reported by the provider
    pub model_id: String,

    pub finish_reason: String,

    /// Provider that served the response
    pub provider: ProviderKind,

    /// Whether the response was served from the response cache
    #[serde(default)]
    pub from_cache: bool,

    pub produced_at: DateTime<Utc>,
}

impl NormalizedResponse {
    /// Copy of this response marked as a cache hit, stamped now
    pub fn as_cached(&self) -> Self {
        Self {
            from_cache: true,
            produced_at: Utc::now(),
            ..self.clone()
        }
    }
}
