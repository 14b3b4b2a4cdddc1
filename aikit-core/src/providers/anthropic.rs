//! Anthropic Claude provider adapter
//!
//! Handles the differences in message format: the system prompt travels in a
//! dedicated field, history may only contain user/assistant turns, and
//! `max_tokens` is mandatory.

use crate::config::SecretString;
use crate::http::{HttpTransport, RequestOptions};
use crate::protocol::types::{ChatRequest, MessageRole, NormalizedResponse, Usage};
use crate::providers::adapter::{
    insert_opt, post_checked, ModelInfo, ProviderAdapter, ProviderKind, WirePayload,
};
use crate::providers::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u64 = 1024;
const DEFAULT_TEMPERATURE: f64 = 1.0;

/// Anthropic Claude adapter
pub struct ClaudeAdapter {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl ClaudeAdapter {
    /// Create a new Claude adapter
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert history plus the new message to Claude's format
    fn build_messages(&self, request: &ChatRequest) -> Vec<Value> {
        let mut messages: Vec<Value> = request
            .history()
            .into_iter()
            .map(|message| {
                // System turns are not allowed inside `messages`
                let role = match message.role {
                    MessageRole::System => MessageRole::User,
                    role => role,
                };
                json!({"role": role.as_str(), "content": message.content})
            })
            .collect();

        messages.push(json!({"role": "user", "content": request.text}));
        messages
    }
}

#[async_trait]
impl ProviderAdapter for ClaudeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    fn headers(&self, credential: &str) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("x-api-key".to_string(), credential.to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("anthropic-version".to_string(), API_VERSION.to_string());
        headers
    }

    fn normalize(&self, request: &ChatRequest) -> ProviderResult<WirePayload> {
        let model = request.model().unwrap_or(DEFAULT_MODEL).to_string();

        let mut body = Map::new();
        body.insert("model".to_string(), json!(model));
        body.insert("messages".to_string(), Value::Array(self.build_messages(request)));
        body.insert(
            "max_tokens".to_string(),
            json!(request
                .option_u64(&["maxTokens", "max_tokens"])
                .unwrap_or(DEFAULT_MAX_TOKENS)),
        );
        body.insert(
            "temperature".to_string(),
            json!(request.option_f64(&["temperature"]).unwrap_or(DEFAULT_TEMPERATURE)),
        );
        insert_opt(&mut body, "top_p", request.option(&["topP", "top_p"]).cloned());
        insert_opt(&mut body, "top_k", request.option(&["topK", "top_k"]).cloned());
        insert_opt(&mut body, "system", request.system_message().map(|s| json!(s)));
        body.insert("stream".to_string(), json!(false));

        Ok(WirePayload {
            url: format!("{}/messages", self.base_url),
            model,
            body: Value::Object(body),
        })
    }

    async fn dispatch(
        &self,
        payload: &WirePayload,
        credential: &SecretString,
        options: &RequestOptions,
    ) -> ProviderResult<Value> {
        let headers = self.headers(credential.expose_secret());
        post_checked(
            self.transport.as_ref(),
            self.name(),
            &payload.url,
            &headers,
            &payload.body,
            options,
        )
        .await
    }

    fn denormalize(&self, raw: Value, requested_model: &str) -> ProviderResult<NormalizedResponse> {
        let blocks = raw
            .get("content")
            .and_then(Value::as_array)
            .filter(|blocks| !blocks.is_empty())
            .ok_or_else(|| ProviderError::malformed(self.name(), "no content returned"))?;

        // Claude can return several content blocks; only text blocks count
        let text = blocks
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");

        let usage = raw.get("usage");
        let count = |field: &str| usage.and_then(|u| u.get(field)).and_then(Value::as_u64);
        let usage = Usage::from_reported(count("input_tokens"), count("output_tokens"), None);

        let model_id = raw
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(requested_model)
            .to_string();

        let finish_reason = raw
            .get("stop_reason")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        Ok(NormalizedResponse {
            text,
            raw_payload: raw,
            usage,
            model_id,
            finish_reason,
            provider: ProviderKind::Claude,
            from_cache: false,
            produced_at: Utc::now(),
        })
    }

    fn known_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo::catalogue(
                "claude-3-opus-20240229",
                "Claude 3 Opus",
                "Most powerful model, best for complex tasks",
                4096,
            ),
            ModelInfo::catalogue(
                "claude-3-sonnet-20240229",
                "Claude 3 Sonnet",
                "Balanced performance and speed",
                4096,
            ),
            ModelInfo::catalogue(
                "claude-3-haiku-20240307",
                "Claude 3 Haiku",
                "Fastest model, best for simple tasks",
                4096,
            ),
            ModelInfo::catalogue("claude-2.1", "Claude 2.1", "Previous generation model", 4096),
        ]
    }

    /// Approximation only: Claude's tokenizer is not public
    fn estimate_tokens(&self, text: &str) -> Option<u64> {
        let has_word_chars = text.chars().any(|c| c.is_ascii_alphanumeric() || c == '_');
        let chars_per_token = if has_word_chars { 4 } else { 3 };
        let len = text.chars().count() as u64;
        Some(len.div_ceil(chars_per_token))
    }
}
