//! Structured events emitted by the dispatcher, ledger and validator
//!
//! Events complement log lines: they carry typed fields and can be captured
//! in tests or forwarded to a metrics pipeline by a custom [`EventSink`].

use crate::providers::adapter::ProviderKind;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Something noteworthy that happened while serving a call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AikitEvent {
    /// No price matched the model; the provider's first price was used
    PricingFallback {
        provider: String,
        model: String,
        used_model: String,
    },

    /// No price table exists for the provider; cost recorded as zero
    UnknownProvider { provider: String },

    /// A validation rule name is not registered and was skipped
    UnknownRule { rule: String },

    /// One dispatch attempt failed with a retryable error
    AttemptFailed {
        provider: ProviderKind,
        attempt: u32,
        error_kind: String,
        message: String,
    },

    /// The dispatcher is about to wait before the next attempt
    Backoff {
        provider: ProviderKind,
        attempt: u32,
        delay_ms: u64,
    },

    ProviderSwitched {
        from: ProviderKind,
        to: ProviderKind,
    },

    CacheHit { key: String },

    /// Every attempt failed; the call is about to error out
    ChainExhausted { attempts: u32, last_error: String },
}

/// Receiver of structured events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &AikitEvent);
}

/// Shared sink handle
pub type SharedSink = Arc<dyn EventSink>;

/// Default sink: forwards every event to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &AikitEvent) {
        match event {
            AikitEvent::PricingFallback {
                provider,
                model,
                used_model,
            } => warn!(
                provider = %provider,
                model = %model,
                used_model = %used_model,
                "No pricing for model, falling back to first configured price"
            ),
            AikitEvent::UnknownProvider { provider } => {
                warn!(provider = %provider, "Unknown provider in cost tracking, cost recorded as 0")
            }
            AikitEvent::UnknownRule { rule } => {
                warn!(rule = %rule, "Unknown validation rule skipped")
            }
            AikitEvent::AttemptFailed {
                provider,
                attempt,
                error_kind,
                message,
            } => warn!(
                provider = %provider,
                attempt,
                error_kind = %error_kind,
                "Attempt failed: {}",
                message
            ),
            AikitEvent::Backoff {
                provider,
                attempt,
                delay_ms,
            } => debug!(provider = %provider, attempt, delay_ms, "Backing off before retry"),
            AikitEvent::ProviderSwitched { from, to } => {
                info!(from = %from, to = %to, "Switching provider")
            }
            AikitEvent::CacheHit { key } => debug!(key = %key, "Serving response from cache"),
            AikitEvent::ChainExhausted {
                attempts,
                last_error,
            } => warn!(attempts, "All attempts failed. Last error: {}", last_error),
        }
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AikitEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<AikitEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&AikitEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &AikitEvent) {
        self.events.lock().push(event.clone());
    }
}
