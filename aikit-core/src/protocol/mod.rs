//! Protocol module for chat request/response structures
//!
//! This module defines the canonical data models exchanged between callers,
//! the dispatcher and the provider adapters. These structures are designed
//! to be:
//! - Provider-agnostic
//! - Serializable, so responses can be cached as bytes
//! - Extensible through the free-form options map

pub mod types;

pub use types::{
    CallOptions, ChatRequest, Message, MessageRole, NormalizedResponse, Options, Usage,
};
