//! Shared helpers for integration tests: a scripted in-process transport and
//! canned provider payloads.

#![allow(dead_code)]

use aikit_core::http::{HttpResponse, HttpTransport, RequestOptions};
use aikit_core::providers::ProviderError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

pub const OPENAI_CHAT: &str = "/chat/completions";
pub const CLAUDE_CHAT: &str = "/messages";
pub const GEMINI_CHAT: &str = ":generateContent";

/// Route library logs to the test harness; set RUST_LOG to see them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// What the fake network answers
#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, Value),
    RateLimited { retry_after_secs: Option<u64> },
    NetworkDown,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Reply::Json(200, body)
    }

    pub fn server_error() -> Self {
        Reply::Json(500, json!({"error": {"message": "internal error"}}))
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Value,
    pub at: Instant,
}

struct Route {
    fragment: String,
    queued: VecDeque<Reply>,
    sticky: Option<Reply>,
}

/// Transport that answers from a script keyed by URL fragment
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every matching request with `reply` once the queue is empty
    pub fn always(self, fragment: &str, reply: Reply) -> Self {
        self.route(fragment, |route| route.sticky = Some(reply));
        self
    }

    /// Answer the next matching request with `reply`
    pub fn once(self, fragment: &str, reply: Reply) -> Self {
        self.route(fragment, |route| route.queued.push_back(reply));
        self
    }

    fn route(&self, fragment: &str, update: impl FnOnce(&mut Route)) {
        let mut routes = self.routes.lock();
        let index = match routes.iter().position(|r| r.fragment == fragment) {
            Some(index) => index,
            None => {
                routes.push(Route {
                    fragment: fragment.to_string(),
                    queued: VecDeque::new(),
                    sticky: None,
                });
                routes.len() - 1
            }
        };
        update(&mut routes[index]);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, fragment: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.url.contains(fragment)).count()
    }

    /// Milliseconds between consecutive calls
    pub fn gaps_ms(&self) -> Vec<u128> {
        let calls = self.calls.lock();
        calls
            .windows(2)
            .map(|pair| pair[1].at.duration_since(pair[0].at).as_millis())
            .collect()
    }

    fn answer(&self, url: &str) -> Result<HttpResponse, ProviderError> {
        let reply = {
            let mut routes = self.routes.lock();
            routes
                .iter_mut()
                .find(|route| url.contains(&route.fragment))
                .and_then(|route| route.queued.pop_front().or_else(|| route.sticky.clone()))
        };

        match reply {
            Some(Reply::Json(status, body)) => Ok(HttpResponse::new(status, body)),
            Some(Reply::RateLimited { retry_after_secs }) => Ok(HttpResponse {
                status: 429,
                body: json!({"error": {"message": "Rate limit reached"}}),
                retry_after_secs,
            }),
            Some(Reply::NetworkDown) => Err(ProviderError::Transport {
                status: None,
                message: "connection refused".to_string(),
            }),
            None => Ok(HttpResponse::new(404, json!({"error": {"message": "no script"}}))),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: &Value,
        _options: &RequestOptions,
    ) -> Result<HttpResponse, ProviderError> {
        self.calls.lock().push(RecordedCall {
            url: url.to_string(),
            headers: headers.clone(),
            body: body.clone(),
            at: Instant::now(),
        });
        self.answer(url)
    }

    async fn get_json(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        _options: &RequestOptions,
    ) -> Result<HttpResponse, ProviderError> {
        self.calls.lock().push(RecordedCall {
            url: url.to_string(),
            headers: headers.clone(),
            body: Value::Null,
            at: Instant::now(),
        });
        self.answer(url)
    }
}

pub fn openai_reply(text: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "model": "gpt-3.5-turbo-0125",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 30, "total_tokens": 42}
    })
}

pub fn claude_reply(text: &str) -> Value {
    json!({
        "id": "msg_1",
        "type": "message",
        "model": "claude-3-sonnet-20240229",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 10, "output_tokens": 20}
    })
}

pub fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 16, "totalTokenCount": 24},
        "modelVersion": "gemini-1.5-flash"
    })
}
