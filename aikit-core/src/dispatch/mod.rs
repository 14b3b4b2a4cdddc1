//! Call orchestration: cache check, retry loop, provider fallback
//!
//! The retry loop is an explicit state machine (see [`state`]). The
//! [`Dispatcher`] owns the provider chain cursor and performs the side
//! effects each state requires.

pub mod dispatcher;
pub mod state;

pub use dispatcher::{DispatchStats, Dispatcher};
pub use state::{transition, DispatchEvent, DispatchPolicy, DispatchState};
