//! Mapping of non-2xx provider responses onto [`ProviderError`]

use crate::http::HttpResponse;
use crate::providers::error::ProviderError;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Classify a failed response; 429s and "rate limit" messages become
/// [`ProviderError::RateLimit`], everything else a transport error
pub fn map_http_error(response: &HttpResponse, request_id: Uuid) -> ProviderError {
    let (reported, body_retry_after) = error_details(&response.body);
    let reason = reported
        .or_else(|| body_text(&response.body))
        .unwrap_or_else(|| format!("HTTP error {}", response.status));

    let rate_limited = response.status == 429 || reason.to_lowercase().contains("rate limit");
    let message = format!("{} [request_id: {}]", reason, request_id);

    if rate_limited {
        let retry_after = response
            .retry_after_secs
            .or(body_retry_after)
            .map(Duration::from_secs);
        return ProviderError::RateLimit {
            message,
            retry_after,
        };
    }

    ProviderError::Transport {
        status: Some(response.status),
        message,
    }
}

/// Message and retry hint from `{"error": {"message"}}`, `{"message"}` or
/// `{"error": "..."}` bodies
fn error_details(body: &Value) -> (Option<String>, Option<u64>) {
    let nested = body.get("error").filter(|e| e.is_object());
    let source = match nested {
        Some(error) if error.get("message").is_some() => error,
        _ => body,
    };

    let message = source
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| body.get("error").and_then(Value::as_str))
        .map(str::to_string);
    let retry_after = source.get("retry_after").and_then(Value::as_u64);
    (message, retry_after)
}

fn body_text(body: &Value) -> Option<String> {
    match body {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// `Retry-After` in delta-seconds form; HTTP dates are ignored
pub fn parse_retry_after(header_value: &str) -> Option<u64> {
    header_value.trim().parse::<u64>().ok()
}
