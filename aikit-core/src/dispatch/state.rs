//! Retry and fallback state machine
//!
//! [`transition`] is a pure function of the current state, an event and the
//! [`DispatchPolicy`]. The dispatcher performs the side effects each state
//! asks for (cache lookup, network call, sleep) and feeds the outcome back
//! as the next event.

use crate::protocol::types::NormalizedResponse;
use crate::providers::error::ProviderError;
use crate::providers::retry::BackoffPolicy;
use std::time::Duration;

/// Static inputs to every transition of one call
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPolicy {
    /// Retry slots per call
    pub max_retries: u32,

    /// Switch to the next provider on failure instead of retrying
    pub auto_fallback: bool,

    /// Number of providers in the chain
    pub chain_len: usize,

    pub backoff: BackoffPolicy,
}

/// Where a call currently stands
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchState {
    Idle,

    /// Looking the request up in the response cache
    CacheCheck { cursor: usize },

    /// Running normalize, dispatch, denormalize (and validation) on one provider.
    /// `attempt` counts retry slots already consumed.
    Dispatching { provider_index: usize, attempt: u32 },

    /// Waiting before trying the same provider again
    RetryWait {
        provider_index: usize,
        attempt: u32,
        delay: Duration,
    },

    /// Moving the cursor to the next provider; `delay` is zero unless rate limited
    SwitchProvider {
        from: usize,
        to: usize,
        attempt: u32,
        delay: Duration,
    },

    CacheHit(Box<NormalizedResponse>),

    Success {
        provider_index: usize,
        response: Box<NormalizedResponse>,
    },

    /// Every retry slot is spent
    Exhausted { attempts: u32, last_error: ProviderError },

    /// A fatal error ended the call
    Aborted(ProviderError),
}

impl DispatchState {
    /// Whether the call is over
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchState::CacheHit(_)
                | DispatchState::Success { .. }
                | DispatchState::Exhausted { .. }
                | DispatchState::Aborted(_)
        )
    }

    /// Short state name for logs
    pub fn name(&self) -> &'static str {
        match self {
            DispatchState::Idle => "idle",
            DispatchState::CacheCheck { .. } => "cache_check",
            DispatchState::Dispatching { .. } => "dispatching",
            DispatchState::RetryWait { .. } => "retry_wait",
            DispatchState::SwitchProvider { .. } => "switch_provider",
            DispatchState::CacheHit(_) => "cache_hit",
            DispatchState::Success { .. } => "success",
            DispatchState::Exhausted { .. } => "exhausted",
            DispatchState::Aborted(_) => "aborted",
        }
    }
}

/// Outcome of the side effect performed for the previous state
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// A call begins at chain position `cursor`
    Start { cursor: usize, skip_cache: bool },
    CacheHit(Box<NormalizedResponse>),
    CacheMiss,
    Succeeded(Box<NormalizedResponse>),
    Failed(ProviderError),
    /// A retry or switch delay has passed
    WaitElapsed,
}

/// Compute the next state.
///
/// Pairs that make no sense (for example `WaitElapsed` while dispatching)
/// leave the state unchanged.
pub fn transition(state: DispatchState, event: DispatchEvent, policy: &DispatchPolicy) -> DispatchState {
    match (state, event) {
        (DispatchState::Idle, DispatchEvent::Start { cursor, skip_cache }) => {
            let cursor = if cursor < policy.chain_len { cursor } else { 0 };
            if skip_cache {
                DispatchState::Dispatching {
                    provider_index: cursor,
                    attempt: 0,
                }
            } else {
                DispatchState::CacheCheck { cursor }
            }
        }

        (DispatchState::CacheCheck { .. }, DispatchEvent::CacheHit(response)) => DispatchState::CacheHit(response),

        (DispatchState::CacheCheck { cursor }, DispatchEvent::CacheMiss) => DispatchState::Dispatching {
            provider_index: cursor,
            attempt: 0,
        },

        (DispatchState::Dispatching { provider_index, .. }, DispatchEvent::Succeeded(response)) => {
            DispatchState::Success {
                provider_index,
                response,
            }
        }

        (DispatchState::Dispatching { provider_index, attempt }, DispatchEvent::Failed(error)) => {
            on_failure(provider_index, attempt, error, policy)
        }

        (
            DispatchState::RetryWait {
                provider_index,
                attempt,
                ..
            },
            DispatchEvent::WaitElapsed,
        ) => DispatchState::Dispatching {
            provider_index,
            attempt,
        },

        (DispatchState::SwitchProvider { to, attempt, .. }, DispatchEvent::WaitElapsed) => {
            DispatchState::Dispatching {
                provider_index: to,
                attempt,
            }
        }

        (state, _) => state,
    }
}

fn on_failure(provider_index: usize, attempt: u32, error: ProviderError, policy: &DispatchPolicy) -> DispatchState {
    if !error.is_retryable() {
        return DispatchState::Aborted(error);
    }

    if policy.auto_fallback && provider_index + 1 < policy.chain_len {
        let delay = if error.is_rate_limit() {
            policy.backoff.delay_after(attempt + 1, &error)
        } else {
            Duration::ZERO
        };

        return DispatchState::SwitchProvider {
            from: provider_index,
            to: provider_index + 1,
            attempt,
            delay,
        };
    }

    let attempt = attempt + 1;
    if attempt >= policy.max_retries {
        return DispatchState::Exhausted {
            attempts: attempt,
            last_error: error,
        };
    }

    DispatchState::RetryWait {
        provider_index,
        attempt,
        delay: policy.backoff.delay_after(attempt, &error),
    }
}
