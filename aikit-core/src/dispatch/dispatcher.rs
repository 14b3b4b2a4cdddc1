//! The dispatcher drives the state machine for one call at a time

use crate::cache::{fingerprint, SharedCache};
use crate::config::{AikitConfig, ConfigError, SecretString};
use crate::dispatch::state::{transition, DispatchEvent, DispatchPolicy, DispatchState};
use crate::cost::SharedLedger;
use crate::error::{AikitError, AikitResult, AttemptFailure};
use crate::events::{AikitEvent, SharedSink, TracingSink};
use crate::http::{CallKind, HttpTransport, RequestOptions};
use crate::protocol::types::{CallOptions, ChatRequest, NormalizedResponse, Options};
use crate::providers::adapter::{ModelInfo, ProviderKind};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::retry::BackoffPolicy;
use crate::providers::routing::ProviderChain;
use crate::validation::{ResponseValidator, ValidationRules};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Request counters since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cached_responses: u64,
}

/// Orchestrates cache, retries, fallback, validation and cost accounting
pub struct Dispatcher {
    chain: ProviderChain,
    transport: Arc<dyn HttpTransport>,
    auto_fallback: bool,
    max_retries: u32,
    timeout: Duration,
    backoff: BackoffPolicy,
    defaults: Options,
    cache: Option<SharedCache>,
    ledger: Option<SharedLedger>,
    validator: Arc<ResponseValidator>,
    events: SharedSink,
    stats: DispatchStats,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("chain", &self.chain)
            .field("auto_fallback", &self.auto_fallback)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .field("cache", &self.cache.is_some())
            .field("ledger", &self.ledger.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Dispatcher {
    /// Build a dispatcher for `config`; cache and ledger start detached
    pub fn new(config: &AikitConfig, transport: Arc<dyn HttpTransport>) -> AikitResult<Self> {
        let chain = ProviderChain::from_config(config, Arc::clone(&transport));
        if chain.is_empty() {
            return Err(AikitError::Config(ConfigError::Invalid {
                message: "At least one provider must be configured".to_string(),
            }));
        }

        Ok(Self {
            chain,
            transport,
            auto_fallback: config.auto_fallback,
            max_retries: config.max_retries,
            timeout: config.timeout(),
            backoff: BackoffPolicy::with_unit(config.backoff_unit()),
            defaults: config.options.clone(),
            cache: None,
            ledger: None,
            validator: Arc::new(ResponseValidator::new()),
            events: Arc::new(TracingSink),
            stats: DispatchStats::default(),
        })
    }

    pub fn with_cache(mut self, cache: Option<SharedCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_ledger(mut self, ledger: Option<SharedLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_validator(mut self, validator: Arc<ResponseValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_events(mut self, events: SharedSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    pub fn cache(&self) -> Option<&SharedCache> {
        self.cache.as_ref()
    }

    pub fn ledger(&self) -> Option<&SharedLedger> {
        self.ledger.as_ref()
    }

    /// Provider at the current chain position
    pub fn active_provider(&self) -> Option<ProviderKind> {
        self.chain.current().map(|entry| entry.kind())
    }

    fn policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            max_retries: self.max_retries,
            auto_fallback: self.auto_fallback,
            chain_len: self.chain.len(),
            backoff: self.backoff.clone(),
        }
    }

    /// Configured defaults with call parameters layered on top
    fn build_request(&self, text: String, params: &Options) -> ChatRequest {
        let mut options = self.defaults.clone();
        for (key, value) in params {
            options.insert(key.clone(), value.clone());
        }
        ChatRequest::with_options(text, options)
    }

    /// Serve one chat call
    pub async fn chat(&mut self, text: impl Into<String>, call: CallOptions) -> AikitResult<NormalizedResponse> {
        self.stats.total_requests += 1;

        let request = self.build_request(text.into(), &call.params);
        let rules = call.validate.filter(|rules| !rules.is_empty());
        let use_cache = self.cache.is_some() && !call.skip_cache;
        let policy = self.policy();

        let mut dispatches = 0u32;
        let mut failures: Vec<AttemptFailure> = Vec::new();
        let mut state = DispatchState::Idle;

        loop {
            debug!(state = state.name(), "Dispatch state");

            state = match state {
                DispatchState::Idle => {
                    let start = DispatchEvent::Start {
                        cursor: self.chain.cursor(),
                        skip_cache: !use_cache,
                    };
                    transition(state, start, &policy)
                }

                DispatchState::CacheCheck { .. } => {
                    let event = match self.lookup_cache(&request) {
                        Some(hit) => DispatchEvent::CacheHit(Box::new(hit)),
                        None => DispatchEvent::CacheMiss,
                    };
                    transition(state, event, &policy)
                }

                DispatchState::Dispatching { provider_index, .. } => {
                    self.chain.set_cursor(provider_index);
                    dispatches += 1;

                    let event = match self.attempt(&request, rules.as_ref()).await {
                        Ok(response) => DispatchEvent::Succeeded(Box::new(response)),
                        Err(err) => {
                            if let Some(provider) = self.active_provider() {
                                let failure = AttemptFailure {
                                    provider,
                                    attempt: dispatches,
                                    error_kind: err.kind().to_string(),
                                    message: err.to_string(),
                                };
                                self.events.emit(&AikitEvent::AttemptFailed {
                                    provider,
                                    attempt: dispatches,
                                    error_kind: failure.error_kind.clone(),
                                    message: failure.message.clone(),
                                });
                                failures.push(failure);
                            }
                            DispatchEvent::Failed(err)
                        }
                    };
                    transition(state, event, &policy)
                }

                DispatchState::RetryWait {
                    provider_index,
                    attempt,
                    delay,
                } => {
                    if let Some(entry) = self.chain.get(provider_index) {
                        self.events.emit(&AikitEvent::Backoff {
                            provider: entry.kind(),
                            attempt,
                            delay_ms: delay.as_millis() as u64,
                        });
                    }
                    tokio::time::sleep(delay).await;
                    transition(state, DispatchEvent::WaitElapsed, &policy)
                }

                DispatchState::SwitchProvider {
                    from,
                    to,
                    attempt,
                    delay,
                } => {
                    if let (Some(from), Some(to)) = (self.chain.get(from), self.chain.get(to)) {
                        self.events.emit(&AikitEvent::ProviderSwitched {
                            from: from.kind(),
                            to: to.kind(),
                        });
                        if !delay.is_zero() {
                            self.events.emit(&AikitEvent::Backoff {
                                provider: to.kind(),
                                attempt,
                                delay_ms: delay.as_millis() as u64,
                            });
                        }
                    }
                    self.chain.set_cursor(to);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    transition(state, DispatchEvent::WaitElapsed, &policy)
                }

                DispatchState::CacheHit(response) => {
                    self.stats.cached_responses += 1;
                    self.events.emit(&AikitEvent::CacheHit {
                        key: fingerprint(&request),
                    });
                    return Ok(response.as_cached());
                }

                DispatchState::Success { response, .. } => {
                    return Ok(self.complete(&request, *response, use_cache));
                }

                DispatchState::Exhausted { last_error, .. } => {
                    self.chain.reset();
                    self.stats.failed_requests += 1;
                    self.events.emit(&AikitEvent::ChainExhausted {
                        attempts: dispatches,
                        last_error: last_error.to_string(),
                    });
                    return Err(AikitError::Exhausted {
                        attempts: dispatches,
                        last: last_error,
                        failures,
                    });
                }

                DispatchState::Aborted(err) => {
                    self.stats.failed_requests += 1;
                    error!("Request aborted: {}", err);
                    return Err(AikitError::Request(err));
                }
            };
        }
    }

    fn lookup_cache(&self, request: &ChatRequest) -> Option<NormalizedResponse> {
        self.cache.as_ref().and_then(|cache| cache.lock().lookup(request))
    }

    /// One normalize/dispatch/denormalize round on the active provider
    async fn attempt(
        &self,
        request: &ChatRequest,
        rules: Option<&ValidationRules>,
    ) -> ProviderResult<NormalizedResponse> {
        let entry = self
            .chain
            .current()
            .ok_or_else(|| ProviderError::Configuration("No provider at the current chain position".to_string()))?;

        let options = RequestOptions::new(CallKind::Chat).with_timeout(self.timeout);
        info!(
            provider = %entry.kind(),
            request_id = %options.request_id,
            "Starting chat request"
        );

        let response = entry.adapter.chat(request, entry.credential(), &options).await?;

        if let Some(rules) = rules {
            let outcome = self.validator.validate_response(&response, rules);
            if !outcome.passed {
                return Err(ProviderError::ValidationFailure {
                    reasons: outcome.failure_reasons,
                });
            }
        }

        Ok(response)
    }

    /// Write cache and ledger after a successful dispatch
    fn complete(&mut self, request: &ChatRequest, response: NormalizedResponse, use_cache: bool) -> NormalizedResponse {
        if use_cache {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache.lock().store(request, &response) {
                    warn!("Failed to store response in cache: {}", e);
                }
            }
        }

        if let Some(ledger) = &self.ledger {
            let cost = ledger
                .lock()
                .record(response.provider.name(), &response.model_id, &response.usage);
            debug!(provider = %response.provider, model = %response.model_id, cost, "Recorded cost");
        }

        self.stats.successful_requests += 1;
        info!(
            provider = %response.provider,
            model = %response.model_id,
            total_units = response.usage.total_units,
            "Chat request completed"
        );

        response
    }

    /// Models offered by the active provider
    pub async fn list_models(&self) -> AikitResult<Vec<ModelInfo>> {
        let entry = self.chain.current().ok_or_else(|| {
            AikitError::Request(ProviderError::Configuration(
                "No provider at the current chain position".to_string(),
            ))
        })?;

        let options = RequestOptions::new(CallKind::ListModels).with_timeout(self.timeout);
        entry
            .adapter
            .list_models(entry.credential(), &options)
            .await
            .map_err(AikitError::Request)
    }

    pub fn set_auto_fallback(&mut self, enabled: bool) {
        self.auto_fallback = enabled;
    }

    pub fn set_max_retries(&mut self, max_retries: u32) {
        self.max_retries = max_retries;
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn set_backoff_unit(&mut self, unit: Duration) {
        self.backoff.unit_ms = unit.as_millis() as u64;
    }

    /// Merge `options` key by key into the configured defaults
    pub fn merge_defaults(&mut self, options: &Options) {
        for (key, value) in options {
            self.defaults.insert(key.clone(), value.clone());
        }
    }

    /// Swap the adapter at the current chain position
    pub fn reload_provider(&mut self, kind: ProviderKind, api_key: Option<SecretString>) -> bool {
        self.chain
            .replace_current(kind, api_key, Arc::clone(&self.transport))
    }

    pub fn set_api_key(&mut self, api_key: SecretString) -> bool {
        self.chain.set_current_key(api_key)
    }
}
