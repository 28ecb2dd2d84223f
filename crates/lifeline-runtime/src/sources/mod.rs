#![forbid(unsafe_code)]

//! Built-in sources scheduled on the [`EventQueue`](lifeline_core::EventQueue).
//!
//! - [`delayed`]: one value (or one error) after a fixed delay, then done.
//! - [`interval`]: ticks `0, 1, 2, ...` at a fixed cadence, never completes.
//!
//! Both deliver from queued tasks only; `subscribe` never emits synchronously.
//! Cancelling the subscription cancels the pending queue task.

pub mod delayed;
pub mod interval;

pub use delayed::delayed;
pub use interval::{MIN_PERIOD, interval};
