//! reqwest-backed [`HttpTransport`]

use crate::http::error::parse_retry_after;
use crate::http::{HttpResponse, HttpTransport, RequestOptions};
use crate::providers::error::ProviderError;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Bodies above this size are rejected
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

const USER_AGENT: &str = concat!("aikit/", env!("CARGO_PKG_VERSION"));

/// Pooled reqwest client; cheap to clone
#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    max_response_size: usize,
}

impl HttpClient {
    /// 10s connect timeout, 30s request timeout, 10 idle connections per host
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_config(Duration::from_secs(10), Duration::from_secs(30), 10)
    }

    pub fn with_config(
        connect_timeout: Duration,
        request_timeout: Duration,
        max_idle_per_host: usize,
    ) -> Result<Self, ProviderError> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    fn ensure_within_limit(&self, size: u64, request_id: Uuid) -> Result<(), ProviderError> {
        if size > self.max_response_size as u64 {
            return Err(ProviderError::network(format!(
                "Response of {} bytes exceeds the {} byte limit [request_id: {}]",
                size, self.max_response_size, request_id
            )));
        }
        Ok(())
    }

    async fn execute(
        &self,
        builder: RequestBuilder,
        url: &str,
        headers: &HashMap<String, String>,
        options: &RequestOptions,
    ) -> Result<HttpResponse, ProviderError> {
        let request_id = options.request_id;
        debug!(url = redact_query(url), call = ?options.call_kind, %request_id, "Sending request");

        let builder = headers
            .iter()
            .fold(builder.timeout(options.timeout), |b, (key, value)| b.header(key, value))
            .header("X-Request-ID", request_id.to_string());

        // reqwest errors embed the URL, which may carry a key
        let response = builder.send().await.map_err(|e| {
            let e = e.without_url();
            if e.is_timeout() {
                warn!(%request_id, "Request timed out");
                ProviderError::Timeout(options.timeout.as_millis() as u64)
            } else if e.is_connect() {
                error!(%request_id, "Connection failed: {}", e);
                ProviderError::network(format!("Connection failed: {} [request_id: {}]", e, request_id))
            } else {
                error!(%request_id, "Request failed: {}", e);
                ProviderError::network(format!("{} [request_id: {}]", e, request_id))
            }
        })?;

        let status = response.status().as_u16();
        debug!(status, %request_id, "Response received");

        let retry_after_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        if let Some(length) = response.content_length() {
            self.ensure_within_limit(length, request_id)?;
        }

        let text = response.text().await.map_err(|e| {
            ProviderError::network(format!(
                "Failed to read response body: {} [request_id: {}]",
                e.without_url(),
                request_id
            ))
        })?;
        self.ensure_within_limit(text.len() as u64, request_id)?;

        // Error bodies are not always JSON; keep them as a string
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(HttpResponse {
            status,
            body,
            retry_after_secs,
        })
    }
}

/// Hide query strings, which carry credentials for key-in-URL providers
fn redact_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[async_trait]
impl HttpTransport for HttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: &Value,
        options: &RequestOptions,
    ) -> Result<HttpResponse, ProviderError> {
        let builder = self.client.post(url).json(body);
        self.execute(builder, url, headers, options).await
    }

    async fn get_json(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        options: &RequestOptions,
    ) -> Result<HttpResponse, ProviderError> {
        let builder = self.client.get(url);
        self.execute(builder, url, headers, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_query() {
        assert_eq!(
            redact_query("https://example.com/models/x:generateContent?key=secret"),
            "https://example.com/models/x:generateContent"
        );
        assert_eq!(redact_query("https://example.com/v1"), "https://example.com/v1");
    }
}
