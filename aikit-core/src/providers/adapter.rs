//! Provider adapter trait and provider kinds
//!
//! Defines the core abstraction for chat providers. Every adapter follows the
//! same three-step contract: `normalize` a request into a wire payload,
//! `dispatch` it over the transport, and `denormalize` the raw reply.

use crate::config::SecretString;
use crate::http::error::map_http_error;
use crate::http::{CallKind, HttpTransport, RequestOptions};
use crate::protocol::types::{ChatRequest, NormalizedResponse};
use crate::providers::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Supported provider families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat-completions style API
    OpenAI,
    /// Anthropic messages API
    #[serde(alias = "anthropic")]
    Claude,
    /// Google generateContent API
    #[serde(alias = "google")]
    Gemini,
}

impl ProviderKind {
    /// Every supported provider, in declaration order
    pub const ALL: [ProviderKind; 3] = [ProviderKind::OpenAI, ProviderKind::Claude, ProviderKind::Gemini];

    /// Canonical lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Claude => "claude",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Create an adapter instance for this kind
    pub fn create_adapter(&self, transport: Arc<dyn HttpTransport>) -> Box<dyn ProviderAdapter> {
        match self {
            ProviderKind::OpenAI => Box::new(crate::providers::OpenAIAdapter::new(transport)),
            ProviderKind::Claude => Box::new(crate::providers::ClaudeAdapter::new(transport)),
            ProviderKind::Gemini => Box::new(crate::providers::GeminiAdapter::new(transport)),
        }
    }

    /// Create an adapter pointed at a non-default base URL
    pub fn create_adapter_with_base_url(
        &self,
        transport: Arc<dyn HttpTransport>,
        base_url: impl Into<String>,
    ) -> Box<dyn ProviderAdapter> {
        let base_url = base_url.into();
        match self {
            ProviderKind::OpenAI => {
                Box::new(crate::providers::OpenAIAdapter::new(transport).with_base_url(base_url))
            }
            ProviderKind::Claude => {
                Box::new(crate::providers::ClaudeAdapter::new(transport).with_base_url(base_url))
            }
            ProviderKind::Gemini => {
                Box::new(crate::providers::GeminiAdapter::new(transport).with_base_url(base_url))
            }
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// A provider-specific request, ready to send once a credential is attached
#[derive(Debug, Clone, PartialEq)]
pub struct WirePayload {
    /// Full endpoint URL, without credentials
    pub url: String,

    /// Model the payload targets
    pub model: String,

    /// JSON body in the provider's shape
    pub body: Value,
}

/// Static description of a model offered by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
}

impl ModelInfo {
    pub(crate) fn catalogue(id: &str, name: &str, description: &str, max_tokens: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: Some(description.to_string()),
            max_tokens: Some(max_tokens),
            owned_by: None,
        }
    }
}

/// Stream delta for streaming responses (not yet implemented)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Delta content
    pub content: String,

    /// Whether this is the final delta
    pub is_final: bool,
}

/// Core adapter trait that all providers implement
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which provider family this adapter speaks
    fn kind(&self) -> ProviderKind;

    /// Get the provider's name
    fn name(&self) -> &str {
        self.kind().name()
    }

    /// Get the base URL for this provider
    fn base_url(&self) -> &str;

    /// Model used when the request does not name one
    fn default_model(&self) -> &str;

    /// Headers required for this provider, including authentication
    fn headers(&self, credential: &str) -> HashMap<String, String>;

    /// Translate a normalized request into this provider's wire format
    fn normalize(&self, request: &ChatRequest) -> ProviderResult<WirePayload>;

    /// Send the payload and return the raw provider reply
    async fn dispatch(
        &self,
        payload: &WirePayload,
        credential: &SecretString,
        options: &RequestOptions,
    ) -> ProviderResult<Value>;

    /// Translate a raw provider reply into the normalized shape.
    ///
    /// `requested_model` is reported when the reply does not name a model.
    fn denormalize(&self, raw: Value, requested_model: &str) -> ProviderResult<NormalizedResponse>;

    /// Run the full contract: check, normalize, dispatch, denormalize
    async fn chat(
        &self,
        request: &ChatRequest,
        credential: &SecretString,
        options: &RequestOptions,
    ) -> ProviderResult<NormalizedResponse> {
        validate_request(request, credential)?;
        let payload = self.normalize(request)?;
        let raw = self.dispatch(&payload, credential, options).await?;
        self.denormalize(raw, &payload.model)
    }

    /// Models this adapter knows about without asking the provider
    fn known_models(&self) -> Vec<ModelInfo>;

    /// List available models
    async fn list_models(
        &self,
        credential: &SecretString,
        options: &RequestOptions,
    ) -> ProviderResult<Vec<ModelInfo>> {
        let _ = (credential, options);
        Ok(self.known_models())
    }

    /// Rough token count for `text`, when the adapter offers one
    fn estimate_tokens(&self, text: &str) -> Option<u64> {
        let _ = text;
        None
    }

    /// Streaming chat is an extension point and always fails for now
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        credential: &SecretString,
    ) -> ProviderResult<Vec<StreamDelta>> {
        let _ = (request, credential);
        Err(ProviderError::Unsupported(format!(
            "Streaming is not yet implemented for the {} adapter",
            self.name()
        )))
    }
}

/// Reject requests that must never reach the network
pub fn validate_request(request: &ChatRequest, credential: &SecretString) -> ProviderResult<()> {
    if request.is_blank() {
        return Err(ProviderError::InvalidRequest(
            "Message cannot be empty".to_string(),
        ));
    }

    if credential.is_empty() {
        return Err(ProviderError::InvalidRequest(
            "API key is required".to_string(),
        ));
    }

    Ok(())
}

/// POST through the transport and turn non-2xx replies into errors
pub(crate) async fn post_checked(
    transport: &dyn HttpTransport,
    provider: &str,
    url: &str,
    headers: &HashMap<String, String>,
    body: &Value,
    options: &RequestOptions,
) -> ProviderResult<Value> {
    debug!(
        "Dispatching {:?} call to {} [request_id: {}]",
        options.call_kind, provider, options.request_id
    );

    let response = transport.post_json(url, headers, body, options).await?;
    if !response.is_success() {
        return Err(map_http_error(&response, options.request_id));
    }

    Ok(response.body)
}

/// GET through the transport and turn non-2xx replies into errors
pub(crate) async fn get_checked(
    transport: &dyn HttpTransport,
    url: &str,
    headers: &HashMap<String, String>,
    options: &RequestOptions,
) -> ProviderResult<Value> {
    let options = RequestOptions {
        call_kind: CallKind::ListModels,
        ..options.clone()
    };

    let response = transport.get_json(url, headers, &options).await?;
    if !response.is_success() {
        return Err(map_http_error(&response, options.request_id));
    }

    Ok(response.body)
}

/// Insert `value` under `key` unless it is absent
pub(crate) fn insert_opt(body: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        body.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("OpenAI".parse::<ProviderKind>(), Ok(ProviderKind::OpenAI));
        assert_eq!("anthropic".parse::<ProviderKind>(), Ok(ProviderKind::Claude));
        assert_eq!(" gemini ".parse::<ProviderKind>(), Ok(ProviderKind::Gemini));
        assert!("cohere".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_kind_serde_names() {
        assert_eq!(serde_json::to_string(&ProviderKind::OpenAI).unwrap(), "\"openai\"");
        let kind: ProviderKind = serde_json::from_str("\"google\"").unwrap();
        assert_eq!(kind, ProviderKind::Gemini);
    }

    #[test]
    fn test_validate_request_rejects_blank_text_and_missing_key() {
        let key = SecretString::new("sk-test");
        let err = validate_request(&ChatRequest::new("  "), &key).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));

        let err = validate_request(&ChatRequest::new("hello"), &SecretString::new("")).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));

        assert!(validate_request(&ChatRequest::new("hello"), &key).is_ok());
    }
}
