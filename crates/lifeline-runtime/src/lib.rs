#![forbid(unsafe_code)]

//! Runtime: subscriptions, sources and the lifecycle guard.
//!
//! # Role in Lifeline
//! `lifeline-runtime` turns the queue and lifecycle primitives from
//! `lifeline-core` into a small push-based reactive layer:
//!
//! - [`Source`]: cold description of an asynchronous producer.
//! - [`Subscription`]: the owner's revocable right to keep receiving values.
//! - [`bind_until`]: ties a source to a [`LifecycleToken`] so nothing is
//!   delivered once the owning scope has ended.
//! - [`sources`]: the one-shot delayed result and the periodic interval.
//! - [`reactive`]: version-tracked display state for presentation layers.
//! - [`leak_sink`]: JSONL evidence of deliveries that reached a dead owner.
//!
//! # How it fits in the system
//! The demo crate builds its views and the simulated user service on top of
//! these types. Everything here is single-threaded (`Rc`, `!Send`), matching
//! the cooperative queue.

pub mod guard;
pub mod leak_sink;
pub mod observer;
pub mod reactive;
pub mod source;
pub mod sources;
pub mod subscriber;
pub mod subscription;

pub use guard::bind_until;
pub use leak_sink::{LeakKind, LeakRecord, LeakSink, LeakSinkConfig, LeakSinkDestination};
pub use lifeline_core::{EventQueue, LifecycleScope, LifecycleToken};
pub use observer::Observer;
pub use reactive::{Observable, WatchGuard};
pub use source::Source;
pub use subscriber::Subscriber;
pub use subscription::{Subscription, SubscriptionGuard};
