#![forbid(unsafe_code)]

//! Core: cooperative event queue and lifecycle tokens.
//!
//! # Role in Lifeline
//! `lifeline-core` is the scheduling layer. It owns the single-threaded event
//! queue that every asynchronous delivery goes through, and the lifecycle
//! scope/token pair that marks the end of an owning view.
//!
//! # Primary responsibilities
//! - **EventQueue**: virtual-clock timer queue; callers never block, delivery
//!   always happens from a later queued task.
//! - **LifecycleScope / LifecycleToken**: single-fire end-of-scope signal with
//!   synchronous listeners.
//!
//! # How it fits in the system
//! The runtime (`lifeline-runtime`) builds sources and the `bind_until` guard
//! on top of these two primitives. Nothing here knows about values, errors or
//! subscriptions.

pub mod event_queue;
pub mod lifecycle;

pub use event_queue::{EventQueue, TimerId};
pub use lifecycle::{LifecycleScope, LifecycleToken, ListenerKey};
