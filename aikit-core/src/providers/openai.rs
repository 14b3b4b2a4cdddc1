//! OpenAI provider adapter
//!
//! Implements the adapter contract for OpenAI's chat-completions API:
//! bearer-token auth, a flat `messages` array with an optional system entry,
//! and `choices[0].message.content` as the answer.

use crate::config::SecretString;
use crate::http::{HttpTransport, RequestOptions};
use crate::protocol::types::{ChatRequest, NormalizedResponse, Usage};
use crate::providers::adapter::{
    get_checked, insert_opt, post_checked, ModelInfo, ProviderAdapter, ProviderKind, WirePayload,
};
use crate::providers::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_TEMPERATURE: f64 = 0.7;

/// OpenAI adapter
pub struct OpenAIAdapter {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl OpenAIAdapter {
    /// Create a new OpenAI adapter
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the adapter at a compatible gateway
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_messages(&self, request: &ChatRequest) -> Vec<Value> {
        let mut messages = Vec::new();

        if let Some(system) = request.system_message() {
            messages.push(json!({"role": "system", "content": system}));
        }

        for message in request.history() {
            messages.push(json!({"role": message.role.as_str(), "content": message.content}));
        }

        messages.push(json!({"role": "user", "content": request.text}));
        messages
    }
}

#[async_trait]
impl ProviderAdapter for OpenAIAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    fn headers(&self, credential: &str) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", credential));
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers
    }

    fn normalize(&self, request: &ChatRequest) -> ProviderResult<WirePayload> {
        let model = request.model().unwrap_or(DEFAULT_MODEL).to_string();

        let mut body = Map::new();
        body.insert("model".to_string(), json!(model));
        body.insert("messages".to_string(), Value::Array(self.build_messages(request)));
        body.insert(
            "temperature".to_string(),
            json!(request.option_f64(&["temperature"]).unwrap_or(DEFAULT_TEMPERATURE)),
        );
        insert_opt(&mut body, "max_tokens", request.option(&["maxTokens", "max_tokens"]).cloned());
        insert_opt(&mut body, "top_p", request.option(&["topP", "top_p"]).cloned());
        insert_opt(
            &mut body,
            "frequency_penalty",
            request.option(&["frequencyPenalty", "frequency_penalty"]).cloned(),
        );
        insert_opt(
            &mut body,
            "presence_penalty",
            request.option(&["presencePenalty", "presence_penalty"]).cloned(),
        );
        body.insert("stream".to_string(), json!(false));

        Ok(WirePayload {
            url: format!("{}/chat/completions", self.base_url),
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
        let first_choice = raw
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .ok_or_else(|| ProviderError::malformed(self.name(), "no choices returned"))?;

        let message = first_choice
            .get("message")
            .ok_or_else(|| ProviderError::malformed(self.name(), "choice has no message"))?;

        // Tool-call replies carry a null content
        let text = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let finish_reason = first_choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let usage = raw.get("usage");
        let count = |field: &str| usage.and_then(|u| u.get(field)).and_then(Value::as_u64);
        let usage = Usage::from_reported(
            count("prompt_tokens"),
            count("completion_tokens"),
            count("total_tokens"),
        );

        let model_id = raw
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(requested_model)
            .to_string();

        Ok(NormalizedResponse {
            text,
            raw_payload: raw,
            usage,
            model_id,
            finish_reason,
            provider: ProviderKind::OpenAI,
            from_cache: false,
            produced_at: Utc::now(),
        })
    }

    fn known_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo::catalogue("gpt-4", "GPT-4", "Most capable GPT-4 model", 8192),
            ModelInfo::catalogue("gpt-4-turbo", "GPT-4 Turbo", "Faster GPT-4 with a larger context", 128_000),
            ModelInfo::catalogue("gpt-3.5-turbo", "GPT-3.5 Turbo", "Fast and inexpensive", 16_385),
        ]
    }

    async fn list_models(
        &self,
        credential: &SecretString,
        options: &RequestOptions,
    ) -> ProviderResult<Vec<ModelInfo>> {
        let url = format!("{}/models", self.base_url);
        let headers = self.headers(credential.expose_secret());
        let body = get_checked(self.transport.as_ref(), &url, &headers, options).await?;

        let data = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::malformed(self.name(), "model list has no data"))?;

        // Only chat models are useful here
        Ok(data
            .iter()
            .filter_map(|model| {
                let id = model.get("id")?.as_str()?;
                if !(id.contains("gpt") || id.contains("turbo")) {
                    return None;
                }
                Some(ModelInfo {
                    id: id.to_string(),
                    name: id.to_string(),
                    description: None,
                    max_tokens: None,
                    owned_by: model.get("owned_by").and_then(Value::as_str).map(str::to_string),
                })
            })
            .collect())
    }
}
