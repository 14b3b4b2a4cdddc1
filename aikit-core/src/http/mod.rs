//! The network boundary
//!
//! Adapters only see the [`HttpTransport`] trait; [`HttpClient`] is the
//! reqwest implementation and tests substitute a scripted fake.

pub mod client;
pub mod error;

use crate::providers::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

pub use client::HttpClient;

/// Which provider endpoint a request targets, for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    Chat,
    ListModels,
}

/// Per-request settings; one fresh id per provider attempt
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub call_kind: CallKind,
    /// Sent as `X-Request-ID` and echoed in errors
    pub request_id: Uuid,
    pub timeout: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            call_kind: CallKind::Chat,
            request_id: Uuid::new_v4(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RequestOptions {
    pub fn new(call_kind: CallKind) -> Self {
        Self {
            call_kind,
            request_id: Uuid::new_v4(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A completed HTTP exchange: status code plus decoded JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,

    /// Decoded body; `Value::Null` when empty, a string when not JSON
    pub body: Value,

    /// Seconds from a `Retry-After` header, when present
    pub retry_after_secs: Option<u64>,
}

impl HttpResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            retry_after_secs: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Generic "send JSON, receive JSON or error" primitive.
///
/// Implementations return `Err` only for network-level failures; non-2xx
/// statuses come back as an [`HttpResponse`] for the adapter to map.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST a JSON body
    async fn post_json(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: &Value,
        options: &RequestOptions,
    ) -> Result<HttpResponse, ProviderError>;

    /// GET a JSON document
    async fn get_json(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        options: &RequestOptions,
    ) -> Result<HttpResponse, ProviderError>;
}
