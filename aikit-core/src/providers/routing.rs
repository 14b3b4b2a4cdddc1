//! Ordered provider chain used for fallback
//!
//! The chain pairs each configured provider with its adapter and keeps a
//! cursor to the active entry. The cursor survives across calls and only
//! moves on failure, on exhaustion (back to the head) or on reconfiguration.

use crate::config::{AikitConfig, ProviderConfig, SecretString};
use crate::http::HttpTransport;
use crate::providers::adapter::{ProviderAdapter, ProviderKind};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// One link of the chain: configuration plus the adapter that speaks it
pub struct ChainEntry {
    pub config: ProviderConfig,
    pub adapter: Box<dyn ProviderAdapter>,
}

impl ChainEntry {
    pub fn new(config: ProviderConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let adapter = build_adapter(&config, transport);
        Self { config, adapter }
    }

    pub fn kind(&self) -> ProviderKind {
        self.config.name
    }

    pub fn credential(&self) -> &SecretString {
        &self.config.api_key
    }
}

impl fmt::Debug for ChainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainEntry")
            .field("provider", &self.config.name)
            .field("priority", &self.config.priority)
            .field("base_url", &self.adapter.base_url())
            .finish()
    }
}

fn build_adapter(config: &ProviderConfig, transport: Arc<dyn HttpTransport>) -> Box<dyn ProviderAdapter> {
    match &config.base_url {
        Some(base_url) => config.name.create_adapter_with_base_url(transport, base_url.clone()),
        None => config.name.create_adapter(transport),
    }
}

/// Priority-ordered providers with a sticky cursor
#[derive(Debug)]
pub struct ProviderChain {
    entries: Vec<ChainEntry>,
    cursor: usize,
}

impl ProviderChain {
    /// Build the chain from already-ordered provider configs
    pub fn new(configs: Vec<ProviderConfig>, transport: Arc<dyn HttpTransport>) -> Self {
        let entries = configs
            .into_iter()
            .map(|config| ChainEntry::new(config, Arc::clone(&transport)))
            .collect();

        Self { entries, cursor: 0 }
    }

    /// Build the chain in the order given by [`AikitConfig::provider_chain`]
    pub fn from_config(config: &AikitConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self::new(config.provider_chain(), transport)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The active entry
    pub fn current(&self) -> Option<&ChainEntry> {
        self.entries.get(self.cursor)
    }

    pub fn get(&self, index: usize) -> Option<&ChainEntry> {
        self.entries.get(index)
    }

    /// Move the cursor to `index`; out-of-range positions are clamped to the head
    pub fn set_cursor(&mut self, index: usize) {
        self.cursor = if index < self.entries.len() { index } else { 0 };
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.entries.iter().map(ChainEntry::kind).collect()
    }

    /// Swap the active entry's provider (and optionally its key) in place.
    ///
    /// The rest of the chain and the cursor are left untouched.
    pub fn replace_current(
        &mut self,
        kind: ProviderKind,
        api_key: Option<SecretString>,
        transport: Arc<dyn HttpTransport>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(self.cursor) else {
            return false;
        };

        debug!(from = %entry.config.name, to = %kind, "Reloading adapter at chain position {}", self.cursor);

        let mut config = entry.config.clone();
        if config.name != kind {
            // Base URLs belong to the old provider
            config.base_url = None;
        }
        config.name = kind;
        if let Some(api_key) = api_key {
            config.api_key = api_key;
        }

        *entry = ChainEntry::new(config, transport);
        true
    }

    /// Replace the credential of the active entry
    pub fn set_current_key(&mut self, api_key: SecretString) -> bool {
        match self.entries.get_mut(self.cursor) {
            Some(entry) => {
                entry.config.api_key = api_key;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpClient;

    fn transport() -> Arc<dyn HttpTransport> {
        Arc::new(HttpClient::new().unwrap())
    }

    fn chain() -> ProviderChain {
        let config = AikitConfig::with_providers(vec![
            ProviderConfig::new(ProviderKind::Gemini, "g-key").with_priority(3),
            ProviderConfig::new(ProviderKind::OpenAI, "o-key").with_priority(1),
            ProviderConfig::new(ProviderKind::Claude, "c-key").with_priority(2),
        ]);
        ProviderChain::from_config(&config, transport())
    }

    #[test]
    fn test_chain_follows_priority() {
        let chain = chain();
        assert_eq!(
            chain.kinds(),
            vec![ProviderKind::OpenAI, ProviderKind::Claude, ProviderKind::Gemini]
        );
        assert_eq!(chain.current().map(ChainEntry::kind), Some(ProviderKind::OpenAI));
    }

    #[test]
    fn test_set_cursor_clamps_out_of_range_to_head() {
        let mut chain = chain();
        chain.set_cursor(2);
        assert_eq!(chain.current().map(ChainEntry::kind), Some(ProviderKind::Gemini));

        chain.set_cursor(3);
        assert_eq!(chain.cursor(), 0);

        chain.set_cursor(1);
        chain.reset();
        assert_eq!(chain.cursor(), 0);
    }

    #[test]
    fn test_replace_current_keeps_cursor_and_neighbours() {
        let mut chain = chain();
        chain.set_cursor(1);

        assert!(chain.replace_current(ProviderKind::Gemini, Some(SecretString::new("new")), transport()));
        assert_eq!(chain.cursor(), 1);
        assert_eq!(
            chain.kinds(),
            vec![ProviderKind::OpenAI, ProviderKind::Gemini, ProviderKind::Gemini]
        );
        assert_eq!(chain.current().map(|e| e.credential().expose_secret()), Some("new"));
        assert_eq!(chain.current().map(|e| e.adapter.kind()), Some(ProviderKind::Gemini));
    }

    #[test]
    fn test_base_url_override_reaches_adapter() {
        let config = ProviderConfig::new(ProviderKind::OpenAI, "k").with_base_url("http://localhost:9999/v1");
        let chain = ProviderChain::new(vec![config], transport());
        assert_eq!(
            chain.current().map(|e| e.adapter.base_url().to_string()),
            Some("http://localhost:9999/v1".to_string())
        );
    }
}
