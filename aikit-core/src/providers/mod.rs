//! Provider adapters and the retry/fallback building blocks
//!
//! Each adapter translates the normalized request into one provider's wire
//! format and the provider's reply back into a [`NormalizedResponse`].
//!
//! [`NormalizedResponse`]: crate::protocol::types::NormalizedResponse

pub mod adapter;
pub mod anthropic;
pub mod error;
pub mod gemini;
pub mod openai;
pub mod retry;
pub mod routing;

pub use adapter::{ModelInfo, ProviderAdapter, ProviderKind, StreamDelta, WirePayload};
pub use error::{ProviderError, ProviderResult};
pub use retry::BackoffPolicy;
pub use routing::{ChainEntry, ProviderChain};

// Re-export concrete adapters
pub use anthropic::ClaudeAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAIAdapter;
