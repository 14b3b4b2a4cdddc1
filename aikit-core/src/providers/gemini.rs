//! Google Gemini provider adapter

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
use url::Url;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Gemini adapter.
///
/// The credential travels as a `key` query parameter rather than a header,
/// so it is appended to the URL only at dispatch time.
pub struct GeminiAdapter {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl GeminiAdapter {
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

    fn build_contents(&self, request: &ChatRequest) -> Vec<Value> {
        let mut contents: Vec<Value> = request
            .history()
            .into_iter()
            .map(|message| {
                let role = match message.role {
                    MessageRole::Assistant => "model",
                    MessageRole::User | MessageRole::System => "user",
                };
                json!({"role": role, "parts": [{"text": message.content}]})
            })
            .collect();

        contents.push(json!({"role": "user", "parts": [{"text": request.text}]}));
        contents
    }

    fn generation_config(&self, request: &ChatRequest) -> Map<String, Value> {
        let mut config = Map::new();
        insert_opt(&mut config, "temperature", request.option(&["temperature"]).cloned());
        insert_opt(
            &mut config,
            "maxOutputTokens",
            request.option(&["maxTokens", "max_tokens"]).cloned(),
        );
        insert_opt(&mut config, "topP", request.option(&["topP", "top_p"]).cloned());
        insert_opt(&mut config, "topK", request.option(&["topK", "top_k"]).cloned());
        config
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    fn headers(&self, _credential: &str) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers
    }

    fn normalize(&self, request: &ChatRequest) -> ProviderResult<WirePayload> {
        let model = request.model().unwrap_or(DEFAULT_MODEL).to_string();

        let mut body = Map::new();
        body.insert("contents".to_string(), Value::Array(self.build_contents(request)));

        if let Some(system) = request.system_message() {
            body.insert(
                "systemInstruction".to_string(),
                json!({"parts": [{"text": system}]}),
            );
        }

        let config = self.generation_config(request);
        if !config.is_empty() {
            body.insert("generationConfig".to_string(), Value::Object(config));
        }

        Ok(WirePayload {
            url: format!("{}/models/{}:generateContent", self.base_url, model),
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
        let url = keyed_url(&payload.url, credential)?;
        let headers = self.headers(credential.expose_secret());
        post_checked(
            self.transport.as_ref(),
            self.name(),
            url.as_str(),
            &headers,
            &payload.body,
            options,
        )
        .await
    }

    fn denormalize(&self, raw: Value, requested_model: &str) -> ProviderResult<NormalizedResponse> {
        let candidate = raw
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .ok_or_else(|| ProviderError::malformed(self.name(), "no candidates returned"))?;

        let parts: Vec<&str> = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();

        if parts.is_empty() {
            return Err(ProviderError::malformed(self.name(), "candidate has no text part"));
        }
        let text = parts.concat();

        let finish_reason = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let metadata = raw.get("usageMetadata");
        let count = |field: &str| metadata.and_then(|m| m.get(field)).and_then(Value::as_u64);
        let usage = Usage::from_reported(
            count("promptTokenCount"),
            count("candidatesTokenCount"),
            count("totalTokenCount"),
        );

        // Gemini reports the model only in newer API revisions
        let model_id = raw
            .get("modelVersion")
            .and_then(Value::as_str)
            .unwrap_or(requested_model)
            .to_string();

        Ok(NormalizedResponse {
            text,
            raw_payload: raw,
            usage,
            model_id,
            finish_reason,
            provider: ProviderKind::Gemini,
            from_cache: false,
            produced_at: Utc::now(),
        })
    }

    fn known_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo::catalogue("gemini-1.5-pro", "Gemini 1.5 Pro", "Long-context reasoning model", 8192),
            ModelInfo::catalogue("gemini-1.5-flash", "Gemini 1.5 Flash", "Fast multimodal model", 8192),
            ModelInfo::catalogue("gemini-pro", "Gemini Pro", "Previous generation model", 2048),
        ]
    }
}

/// Endpoint with the credential percent-encoded into the `key` parameter
fn keyed_url(endpoint: &str, credential: &SecretString) -> ProviderResult<Url> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| ProviderError::Configuration(format!("Invalid Gemini endpoint '{}': {}", endpoint, e)))?;
    url.query_pairs_mut().append_pair("key", credential.expose_secret());
    Ok(url)
}
