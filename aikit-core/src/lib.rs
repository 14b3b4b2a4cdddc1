//! AIKit Core Library
//!
//! A unified chat client: one request, a normalized response, whichever of
//! the configured providers (OpenAI, Claude, Gemini) ends up serving it.
//! Calls go through a response cache, a retry/fallback state machine,
//! optional response validation and a cost ledger.
//!
//! ```no_run
//! use aikit_core::{Aikit, AikitConfig, CallOptions, ProviderKind};
//!
//! # async fn run() -> Result<(), aikit_core::AikitError> {
//! let mut client = Aikit::new(AikitConfig::new(ProviderKind::OpenAI, "sk-..."))?;
//! let response = client.chat("Hello!", CallOptions::new()).await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod cost;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod http;
pub mod protocol;
pub mod providers;
pub mod storage;
pub mod validation;

pub use cache::{CacheStats, ResponseCache};
pub use client::{Aikit, AikitBuilder};
pub use config::{AikitConfig, CacheConfig, ConfigUpdate, ProviderConfig, SecretString};
pub use cost::{CostLedger, CostReport, PriceTable};
pub use dispatch::{DispatchStats, Dispatcher};
pub use error::{AikitError, AikitResult};
pub use events::{AikitEvent, EventSink, RecordingSink, TracingSink};
pub use protocol::types::{CallOptions, ChatRequest, NormalizedResponse, Usage};
pub use providers::{ProviderAdapter, ProviderError, ProviderKind};
pub use storage::{KvStore, MemoryStore};
pub use validation::{ResponseValidator, ValidationOutcome, ValidationRules};

/// Returns the version of the AIKit Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
