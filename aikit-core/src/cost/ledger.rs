//! Cost ledger: per-call cost records and running aggregates

use super::pricing::{ModelPrice, PriceMatch, PriceTable};
use crate::config::ConfigError;
use crate::events::{AikitEvent, SharedSink, TracingSink};
use crate::protocol::types::Usage;
use crate::storage::{KvStore, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// Store key of the persisted ledger snapshot
pub const LEDGER_STORAGE_KEY: &str = "aikit_cost_tracker";

/// Number of records kept in the history
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Ledger handle shared between dispatchers and reporting callers
pub type SharedLedger = Arc<Mutex<CostLedger>>;

/// One priced call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRecord {
    pub provider: String,
    pub model: String,
    pub usage: Usage,
    pub cost: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregate view of the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostReport {
    pub total: f64,
    pub by_provider: BTreeMap<String, f64>,
    /// Keyed by `provider:model`
    pub by_model: BTreeMap<String, f64>,
    pub request_count: u64,
    pub average_cost: f64,
    pub daily_average: f64,
    pub started_at: DateTime<Utc>,
    pub last_request_at: Option<DateTime<Utc>>,
}

/// Everything the ledger persists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerData {
    total: f64,
    by_provider: BTreeMap<String, f64>,
    by_model: BTreeMap<String, f64>,
    request_count: u64,
    records: VecDeque<CostRecord>,
    started_at: DateTime<Utc>,
    last_request_at: Option<DateTime<Utc>>,
}

impl LedgerData {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            total: 0.0,
            by_provider: BTreeMap::new(),
            by_model: BTreeMap::new(),
            request_count: 0,
            records: VecDeque::new(),
            started_at: now,
            last_request_at: None,
        }
    }
}

/// Append-only cost ledger with incremental aggregates.
///
/// The history is bounded; totals and the request count cover every record
/// ever made, including those that have rotated out of the history.
pub struct CostLedger {
    data: LedgerData,
    pricing: PriceTable,
    history_limit: usize,
    events: SharedSink,
    store: Option<Arc<dyn KvStore>>,
}

impl Default for CostLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl CostLedger {
    /// In-memory ledger with the default price table
    pub fn new() -> Self {
        Self {
            data: LedgerData::new(Utc::now()),
            pricing: PriceTable::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            events: Arc::new(TracingSink),
            store: None,
        }
    }

    pub fn with_pricing(mut self, pricing: PriceTable) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_events(mut self, events: SharedSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        while self.data.records.len() > self.history_limit {
            self.data.records.pop_front();
        }
        self
    }

    /// Persist to `store`, resuming from a snapshot already there
    pub fn with_store(mut self, store: Arc<dyn KvStore>) -> Self {
        match store.get(LEDGER_STORAGE_KEY) {
            Ok(Some(bytes)) => match serde_json::from_slice::<LedgerData>(&bytes) {
                Ok(data) => self.data = data,
                Err(e) => warn!("Error loading cost ledger snapshot: {}", e),
            },
            Ok(None) => {}
            Err(e) => warn!("Error loading cost ledger snapshot: {}", e),
        }
        self.store = Some(store);
        self
    }

    /// Wrap in the shared handle the dispatcher expects
    pub fn shared(self) -> SharedLedger {
        Arc::new(Mutex::new(self))
    }

    pub fn record(&mut self, provider: &str, model: &str, usage: &Usage) -> f64 {
        self.record_at(provider, model, usage, Utc::now())
    }

    /// Price `usage`, append a record and update the aggregates
    pub fn record_at(
        &mut self,
        provider: &str,
        model: &str,
        usage: &Usage,
        now: DateTime<Utc>,
    ) -> f64 {
        let cost = match self.price_for(provider, model) {
            Some(price) if price.is_valid() => {
                usage.prompt_units as f64 * price.input + usage.completion_units as f64 * price.output
            }
            Some(price) => {
                warn!("Ignoring invalid price {:?} for {}:{}", price, provider, model);
                0.0
            }
            None => 0.0,
        };

        let model_label = if model.is_empty() { "default" } else { model };

        self.data.total += cost;
        *self.data.by_provider.entry(provider.to_string()).or_insert(0.0) += cost;
        *self
            .data
            .by_model
            .entry(format!("{}:{}", provider, model_label))
            .or_insert(0.0) += cost;
        self.data.request_count += 1;
        self.data.last_request_at = Some(now);

        self.data.records.push_back(CostRecord {
            provider: provider.to_string(),
            model: model_label.to_string(),
            usage: *usage,
            cost,
            recorded_at: now,
        });
        while self.data.records.len() > self.history_limit {
            self.data.records.pop_front();
        }

        debug!("Recorded cost {:.6} for {}:{}", cost, provider, model_label);
        self.persist();
        cost
    }

    fn price_for(&self, provider: &str, model: &str) -> Option<ModelPrice> {
        let found = self.pricing.lookup(provider, model);
        match &found {
            PriceMatch::Fallback { used_model, .. } => {
                self.events.emit(&AikitEvent::PricingFallback {
                    provider: provider.to_string(),
                    model: model.to_string(),
                    used_model: used_model.clone(),
                });
            }
            PriceMatch::UnknownProvider => {
                self.events.emit(&AikitEvent::UnknownProvider {
                    provider: provider.to_string(),
                });
            }
            PriceMatch::Exact(_) | PriceMatch::Family { .. } => {}
        }
        found.price()
    }

    pub fn report(&self) -> CostReport {
        self.report_at(Utc::now())
    }

    pub fn report_at(&self, now: DateTime<Utc>) -> CostReport {
        let elapsed_ms = now
            .signed_duration_since(self.data.started_at)
            .num_milliseconds()
            .max(0) as u64;
        let days = elapsed_ms.div_ceil(24 * 60 * 60 * 1000).max(1);

        let average_cost = if self.data.request_count > 0 {
            self.data.total / self.data.request_count as f64
        } else {
            0.0
        };

        CostReport {
            total: self.data.total,
            by_provider: self.data.by_provider.clone(),
            by_model: self.data.by_model.clone(),
            request_count: self.data.request_count,
            average_cost,
            daily_average: self.data.total / days as f64,
            started_at: self.data.started_at,
            last_request_at: self.data.last_request_at,
        }
    }

    /// Applies to subsequent records only.
    ///
    /// Negative or non-finite prices are rejected and the table is left as it was.
    pub fn update_pricing(&mut self, provider: &str, model: &str, input: f64, output: f64) -> Result<(), ConfigError> {
        let price = ModelPrice::new(input, output);
        if !price.is_valid() {
            return Err(ConfigError::Invalid {
                message: format!(
                    "price for {}:{} must be finite and non-negative (input {}, output {})",
                    provider, model, input, output
                ),
            });
        }
        self.pricing.set(provider, model, price);
        Ok(())
    }

    pub fn pricing(&self) -> &PriceTable {
        &self.pricing
    }

    /// Up to `limit` records, newest first
    pub fn recent_records(&self, limit: usize) -> Vec<CostRecord> {
        self.data.records.iter().rev().take(limit).cloned().collect()
    }

    pub fn reset(&mut self) {
        self.data = LedgerData::new(Utc::now());
        self.persist();
    }

    pub fn export_json(&self) -> StorageResult<String> {
        Ok(serde_json::to_string_pretty(&self.data)?)
    }

    /// Replace the ledger contents; on error the ledger is unchanged
    pub fn import_json(&mut self, json: &str) -> StorageResult<()> {
        let mut data: LedgerData = serde_json::from_str(json)?;
        while data.records.len() > self.history_limit {
            data.records.pop_front();
        }
        self.data = data;
        self.persist();
        Ok(())
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let result = serde_json::to_vec(&self.data)
            .map_err(StorageError::from)
            .and_then(|bytes| store.put(LEDGER_STORAGE_KEY, bytes));
        if let Err(e) = result {
            warn!("Error saving cost ledger: {}", e);
        }
    }
}
