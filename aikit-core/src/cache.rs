//! Response cache keyed by request fingerprint
//!
//! The fingerprint ignores which provider will serve the request: identical
//! text and options hit the same entry whoever produced it.

use crate::config::CacheConfig;
use crate::protocol::types::{ChatRequest, NormalizedResponse};
use crate::storage::{KvStore, StorageResult};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

/// Prefix of every cache key in the backing store
pub const CACHE_KEY_PREFIX: &str = "aikit_cache_";

/// Cache handle shared between dispatchers and reporting callers
pub type SharedCache = Arc<Mutex<ResponseCache>>;

/// What the store holds for one fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub value: NormalizedResponse,
    pub stored_at: DateTime<Utc>,
}

/// Snapshot of the cache contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    /// Serialized size of every entry
    pub total_bytes: usize,
    pub max_age_ms: u64,
    pub max_entries: usize,
}

/// Stable cache key for a request.
///
/// SHA-256 over the canonical JSON of the trimmed, lower-cased text and the
/// full option map. Object keys are sorted at every depth so insertion order
/// never changes the key.
pub fn fingerprint(request: &ChatRequest) -> String {
    let mut canonical = String::new();
    canonical.push_str("{\"text\":");
    write_canonical(&Value::String(request.text.trim().to_lowercase()), &mut canonical);
    canonical.push_str(",\"options\":");
    write_canonical(&Value::Object(request.options.clone()), &mut canonical);
    canonical.push('}');

    let digest = Sha256::digest(canonical.as_bytes());
    format!("{}{}", CACHE_KEY_PREFIX, hex::encode(digest))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Fingerprint-to-response cache with TTL and bounded size
pub struct ResponseCache {
    store: Arc<dyn KvStore>,
    max_age: ChronoDuration,
    config: CacheConfig,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn KvStore>, config: CacheConfig) -> Self {
        let max_age = ChronoDuration::try_milliseconds(config.max_age_ms.min(i64::MAX as u64) as i64)
            .unwrap_or(ChronoDuration::MAX);
        Self {
            store,
            max_age,
            config,
        }
    }

    /// Wrap in the shared handle the dispatcher expects
    pub fn shared(self) -> SharedCache {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    pub fn lookup(&self, request: &ChatRequest) -> Option<NormalizedResponse> {
        self.lookup_at(request, Utc::now())
    }

    /// Look up `request` as of `now`; expired entries are deleted and miss
    pub fn lookup_at(&self, request: &ChatRequest, now: DateTime<Utc>) -> Option<NormalizedResponse> {
        let key = fingerprint(request);
        let entry = match self.read_entry(&key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("Cache miss for {}", key);
                return None;
            }
            Err(e) => {
                warn!("Error reading cache entry {}: {}", key, e);
                if let Err(e) = self.store.remove(&key) {
                    warn!("Error removing unreadable cache entry {}: {}", key, e);
                }
                return None;
            }
        };

        if self.is_expired(&entry, now) {
            debug!("Cache entry {} expired, removing", key);
            if let Err(e) = self.store.remove(&key) {
                warn!("Error removing expired cache entry {}: {}", key, e);
            }
            return None;
        }

        debug!("Cache hit for {}", key);
        Some(entry.value)
    }

    pub fn store(&self, request: &ChatRequest, response: &NormalizedResponse) -> StorageResult<()> {
        self.store_at(request, response, Utc::now())
    }

    /// Insert `response`, evicting the oldest entries first when at capacity
    pub fn store_at(
        &self,
        request: &ChatRequest,
        response: &NormalizedResponse,
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        let key = fingerprint(request);

        let existing = self.store.keys_with_prefix(CACHE_KEY_PREFIX)?;
        if existing.len() >= self.config.max_entries && !existing.contains(&key) {
            self.evict_oldest(existing)?;
        }

        let entry = CacheEntry {
            key: key.clone(),
            value: NormalizedResponse {
                from_cache: false,
                ..response.clone()
            },
            stored_at: now,
        };
        self.store.put(&key, serde_json::to_vec(&entry)?)
    }

    /// Remove every cache entry, leaving other keys in the store alone
    pub fn clear(&self) -> StorageResult<()> {
        for key in self.store.keys_with_prefix(CACHE_KEY_PREFIX)? {
            self.store.remove(&key)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.store
            .keys_with_prefix(CACHE_KEY_PREFIX)
            .map(|keys| keys.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StorageResult<CacheStats> {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> StorageResult<CacheStats> {
        let keys = self.store.keys_with_prefix(CACHE_KEY_PREFIX)?;
        let mut stats = CacheStats {
            total_entries: keys.len(),
            valid_entries: 0,
            expired_entries: 0,
            total_bytes: 0,
            max_age_ms: self.config.max_age_ms,
            max_entries: self.config.max_entries,
        };

        for key in keys {
            let Some(bytes) = self.store.get(&key)? else {
                continue;
            };
            stats.total_bytes += bytes.len();

            // Undecodable entries count as expired; the next read drops them
            match serde_json::from_slice::<CacheEntry>(&bytes) {
                Ok(entry) if !self.is_expired(&entry, now) => stats.valid_entries += 1,
                _ => stats.expired_entries += 1,
            }
        }

        Ok(stats)
    }

    fn read_entry(&self, key: &str) -> StorageResult<Option<CacheEntry>> {
        match self.store.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.stored_at) > self.max_age
    }

    /// Purge the oldest ceil(20%) of capacity by `stored_at`
    fn evict_oldest(&self, keys: Vec<String>) -> StorageResult<()> {
        let mut aged: Vec<(Option<DateTime<Utc>>, String)> = keys
            .into_iter()
            .map(|key| {
                let stored_at = self.read_entry(&key).ok().flatten().map(|e| e.stored_at);
                (stored_at, key)
            })
            .collect();

        // Unreadable entries (None) sort first and go before any valid one
        aged.sort();

        let to_remove = self.config.max_entries.div_ceil(5);
        debug!("Cache full, evicting {} oldest entries", to_remove);
        for (_, key) in aged.into_iter().take(to_remove) {
            self.store.remove(&key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::Usage;
    use crate::providers::adapter::ProviderKind;
    use crate::storage::{MemoryStore, StorageError};
    use serde_json::json;

    fn response(text: &str) -> NormalizedResponse {
        NormalizedResponse {
            text: text.to_string(),
            raw_payload: json!({}),
            usage: Usage::from_reported(Some(1), Some(2), None),
            model_id: "gpt-3.5-turbo".to_string(),
            finish_reason: "stop".to_string(),
            provider: ProviderKind::OpenAI,
            from_cache: false,
            produced_at: Utc::now(),
        }
    }

    fn cache(max_age_ms: u64, max_entries: usize) -> ResponseCache {
        ResponseCache::new(
            Arc::new(MemoryStore::new()),
            CacheConfig {
                max_age_ms,
                max_entries,
            },
        )
    }

    #[test]
    fn test_fingerprint_normalizes_text() {
        let a = ChatRequest::new("  Hello World ");
        let b = ChatRequest::new("hello world");
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert!(fingerprint(&a).starts_with(CACHE_KEY_PREFIX));

        let c = ChatRequest::new("hello world").with_option("temperature", 0.1);
        assert_ne!(fingerprint(&b), fingerprint(&c));
    }

    #[test]
    fn test_hit_then_expiry() {
        let cache = cache(1000, 10);
        let request = ChatRequest::new("What is Rust?");
        let t0 = Utc::now();

        cache.store_at(&request, &response("A language"), t0).unwrap();

        let hit = cache.lookup_at(&request, t0 + ChronoDuration::milliseconds(1000));
        assert_eq!(hit.map(|r| r.text), Some("A language".to_string()));

        assert!(cache
            .lookup_at(&request, t0 + ChronoDuration::milliseconds(1001))
            .is_none());
        // Lazily deleted on the expired read
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_removes_oldest_fifth() {
        let cache = cache(60_000, 5);
        let t0 = Utc::now();

        for i in 0..5 {
            let request = ChatRequest::new(format!("question {}", i));
            cache
                .store_at(&request, &response("answer"), t0 + ChronoDuration::seconds(i))
                .unwrap();
        }
        assert_eq!(cache.len(), 5);

        let request = ChatRequest::new("question 5");
        cache
            .store_at(&request, &response("answer"), t0 + ChronoDuration::seconds(5))
            .unwrap();

        assert_eq!(cache.len(), 5);
        let now = t0 + ChronoDuration::seconds(6);
        assert!(cache.lookup_at(&ChatRequest::new("question 0"), now).is_none());
        assert!(cache.lookup_at(&ChatRequest::new("question 1"), now).is_some());
    }

    #[test]
    fn test_overwrite_existing_key_does_not_evict() {
        let cache = cache(60_000, 2);
        let t0 = Utc::now();
        cache.store_at(&ChatRequest::new("a"), &response("1"), t0).unwrap();
        cache.store_at(&ChatRequest::new("b"), &response("2"), t0).unwrap();
        cache.store_at(&ChatRequest::new("a"), &response("3"), t0).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup_at(&ChatRequest::new("a"), t0).unwrap().text, "3");
    }

    #[test]
    fn test_clear_keeps_foreign_keys() {
        let store = Arc::new(MemoryStore::new());
        store.put("aikit_cost_tracker", b"{}".to_vec()).unwrap();
        let cache = ResponseCache::new(store.clone(), CacheConfig::default());

        cache.store(&ChatRequest::new("hi"), &response("hello")).unwrap();
        cache.clear().unwrap();

        assert!(cache.is_empty());
        assert!(store.get("aikit_cost_tracker").unwrap().is_some());
    }

    #[test]
    fn test_stats_counts_expired_entries() {
        let cache = cache(1000, 10);
        let t0 = Utc::now();
        cache.store_at(&ChatRequest::new("old"), &response("x"), t0).unwrap();
        cache
            .store_at(&ChatRequest::new("new"), &response("y"), t0 + ChronoDuration::seconds(5))
            .unwrap();

        let stats = cache.stats_at(t0 + ChronoDuration::seconds(5)).unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.expired_entries, 1);
        assert!(stats.total_bytes > 0);
        assert_eq!(stats.max_entries, 10);
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let cache = ResponseCache::new(store.clone(), CacheConfig::default());
        let request = ChatRequest::new("hi");
        store.put(&fingerprint(&request), b"not json".to_vec()).unwrap();

        assert!(cache.lookup(&request).is_none());
        assert!(cache.is_empty());
    }

    /// Reads and writes succeed, deletes always fail
    #[derive(Default)]
    struct NoDeleteStore {
        inner: MemoryStore,
    }

    impl KvStore for NoDeleteStore {
        fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
            self.inner.put(key, value)
        }

        fn remove(&self, _key: &str) -> StorageResult<()> {
            Err(StorageError::Backend("read-only".to_string()))
        }

        fn keys(&self) -> StorageResult<Vec<String>> {
            self.inner.keys()
        }

        fn clear(&self) -> StorageResult<()> {
            self.inner.clear()
        }
    }

    #[test]
    fn test_failed_delete_of_unreadable_entry_still_misses() {
        let store = Arc::new(NoDeleteStore::default());
        let cache = ResponseCache::new(store.clone(), CacheConfig::default());
        let request = ChatRequest::new("hi");
        store.put(&fingerprint(&request), b"not json".to_vec()).unwrap();

        assert!(cache.lookup(&request).is_none());
        // The entry survives the failed delete and keeps missing
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(&request).is_none());
    }

    #[test]
    fn test_failed_delete_of_expired_entry_still_misses() {
        let cache = ResponseCache::new(
            Arc::new(NoDeleteStore::default()),
            CacheConfig {
                max_age_ms: 1000,
                max_entries: 10,
            },
        );
        let request = ChatRequest::new("hi");
        let t0 = Utc::now();
        cache.store_at(&request, &response("old"), t0).unwrap();

        assert!(cache
            .lookup_at(&request, t0 + ChronoDuration::milliseconds(1001))
            .is_none());
        assert_eq!(cache.len(), 1);
    }
}
