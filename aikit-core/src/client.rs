//! The `Aikit` facade: one chat call, any configured provider

use crate::cache::{CacheStats, ResponseCache, SharedCache};
use crate::config::{AikitConfig, ConfigError, ConfigUpdate, ConfigValidator, Redact};
use crate::cost::{CostLedger, CostReport, PriceTable, SharedLedger};
use crate::dispatch::{DispatchStats, Dispatcher};
use crate::error::{AikitError, AikitResult};
use crate::events::{SharedSink, TracingSink};
use crate::http::{HttpClient, HttpTransport};
use crate::protocol::types::{CallOptions, NormalizedResponse};
use crate::providers::adapter::{ModelInfo, ProviderKind};
use crate::providers::retry::BackoffPolicy;
use crate::storage::{KvStore, MemoryStore};
use crate::validation::ResponseValidator;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Assembles an [`Aikit`] with injectable collaborators
pub struct AikitBuilder {
    config: AikitConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    store: Option<Arc<dyn KvStore>>,
    events: Option<SharedSink>,
    pricing: Option<PriceTable>,
    validator: Option<ResponseValidator>,
    backoff: Option<BackoffPolicy>,
    persist_costs: bool,
}

impl AikitBuilder {
    pub fn new(config: AikitConfig) -> Self {
        Self {
            config,
            transport: None,
            store: None,
            events: None,
            pricing: None,
            validator: None,
            backoff: None,
            persist_costs: false,
        }
    }

    /// Replace the default `reqwest` transport
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Key-value store backing the cache (and the ledger, when persisted)
    pub fn store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn events(mut self, events: SharedSink) -> Self {
        self.events = Some(events);
        self
    }

    pub fn pricing(mut self, pricing: PriceTable) -> Self {
        self.pricing = Some(pricing);
        self
    }

    pub fn validator(mut self, validator: ResponseValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Override the backoff derived from `backoffUnitMs`
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Save the cost ledger to the store after every record
    pub fn persist_costs(mut self, enabled: bool) -> Self {
        self.persist_costs = enabled;
        self
    }

    pub fn build(self) -> AikitResult<Aikit> {
        ConfigValidator::new().validate(&self.config)?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                HttpClient::with_config(Duration::from_secs(10), self.config.timeout(), 10).map_err(|e| {
                    AikitError::Config(ConfigError::Invalid {
                        message: e.to_string(),
                    })
                })?,
            ),
        };
        let store: Arc<dyn KvStore> = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let events: SharedSink = self.events.unwrap_or_else(|| Arc::new(TracingSink));

        let cache = self
            .config
            .enable_cache
            .then(|| ResponseCache::new(Arc::clone(&store), self.config.cache).shared());

        let ledger = self.config.enable_cost_tracking.then(|| {
            let mut ledger = CostLedger::new()
                .with_pricing(self.pricing.unwrap_or_default())
                .with_events(Arc::clone(&events));
            if self.persist_costs {
                ledger = ledger.with_store(Arc::clone(&store));
            }
            ledger.shared()
        });

        let validator = Arc::new(
            self.validator
                .unwrap_or_default()
                .with_events(Arc::clone(&events)),
        );

        let mut dispatcher = Dispatcher::new(&self.config, transport)?
            .with_cache(cache.clone())
            .with_ledger(ledger.clone())
            .with_validator(Arc::clone(&validator))
            .with_events(events);
        if let Some(backoff) = self.backoff {
            dispatcher = dispatcher.with_backoff(backoff);
        }

        for provider in self.config.provider_chain() {
            debug!(provider = %provider.redacted(), "Provider configured");
        }
        info!(
            providers = ?dispatcher.chain().kinds(),
            auto_fallback = self.config.auto_fallback,
            cache = self.config.enable_cache,
            cost_tracking = self.config.enable_cost_tracking,
            "AIKit client ready"
        );

        Ok(Aikit {
            config: self.config,
            dispatcher,
            cache,
            ledger,
            validator,
        })
    }
}

/// Unified chat client
pub struct Aikit {
    config: AikitConfig,
    dispatcher: Dispatcher,
    cache: Option<SharedCache>,
    ledger: Option<SharedLedger>,
    validator: Arc<ResponseValidator>,
}

impl std::fmt::Debug for Aikit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aikit")
            .field("dispatcher", &self.dispatcher)
            .field("validator", &self.validator)
            .finish()
    }
}

impl Aikit {
    /// Client with the default transport and an in-memory store
    pub fn new(config: AikitConfig) -> AikitResult<Self> {
        AikitBuilder::new(config).build()
    }

    pub fn builder(config: AikitConfig) -> AikitBuilder {
        AikitBuilder::new(config)
    }

    /// Send `text` and return the normalized response
    pub async fn chat(&mut self, text: impl Into<String>, options: CallOptions) -> AikitResult<NormalizedResponse> {
        self.dispatcher.chat(text, options).await
    }

    /// `None` when cost tracking is disabled
    pub fn get_cost_report(&self) -> Option<CostReport> {
        self.ledger.as_ref().map(|ledger| ledger.lock().report())
    }

    pub fn get_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Returns whether a cache was there to clear
    pub fn clear_cache(&self) -> AikitResult<bool> {
        match &self.cache {
            Some(cache) => {
                cache.lock().clear()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn cache_stats(&self) -> AikitResult<Option<CacheStats>> {
        match &self.cache {
            Some(cache) => Ok(Some(cache.lock().stats()?)),
            None => Ok(None),
        }
    }

    /// Merge a partial update.
    ///
    /// A new `provider` reloads the adapter at the current chain position;
    /// the chain order and cursor stay as they are.
    pub fn update_config(&mut self, update: ConfigUpdate) -> AikitResult<()> {
        ConfigValidator::new().validate_update(&update)?;

        if let Some(enabled) = update.auto_fallback {
            self.config.auto_fallback = enabled;
            self.dispatcher.set_auto_fallback(enabled);
        }
        if let Some(max_retries) = update.max_retries {
            self.config.max_retries = max_retries;
            self.dispatcher.set_max_retries(max_retries);
        }
        if let Some(timeout_ms) = update.timeout_ms {
            self.config.timeout_ms = timeout_ms;
            self.dispatcher.set_timeout(self.config.timeout());
        }
        if let Some(unit_ms) = update.backoff_unit_ms {
            self.config.backoff_unit_ms = unit_ms;
            self.dispatcher.set_backoff_unit(self.config.backoff_unit());
        }
        if let Some(options) = &update.options {
            for (key, value) in options {
                self.config.options.insert(key.clone(), value.clone());
            }
            self.dispatcher.merge_defaults(options);
        }

        match update.provider {
            Some(kind) if Some(kind) != self.dispatcher.active_provider() => {
                info!(provider = %kind, "Reloading provider adapter");
                self.config.provider = Some(kind);
                if update.api_key.is_some() {
                    self.config.api_key = update.api_key.clone();
                }
                self.dispatcher.reload_provider(kind, update.api_key);
            }
            _ => {
                if let Some(api_key) = update.api_key {
                    self.config.api_key = Some(api_key.clone());
                    self.dispatcher.set_api_key(api_key);
                }
            }
        }

        Ok(())
    }

    /// Models offered by the active provider
    pub async fn list_models(&self) -> AikitResult<Vec<ModelInfo>> {
        self.dispatcher.list_models().await
    }

    pub fn active_provider(&self) -> Option<ProviderKind> {
        self.dispatcher.active_provider()
    }

    pub fn config(&self) -> &AikitConfig {
        &self.config
    }

    pub fn validator(&self) -> &ResponseValidator {
        &self.validator
    }

    /// Shared ledger handle, for pricing updates and exports
    pub fn cost_ledger(&self) -> Option<&SharedLedger> {
        self.ledger.as_ref()
    }
}
