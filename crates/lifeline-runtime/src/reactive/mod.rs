#![forbid(unsafe_code)]

//! Reactive display state.
//!
//! Views publish what the presentation layer should show through an
//! [`Observable`]. Presentation code either dirty-checks the version counter
//! or registers a watcher.
//!
//! # Invariants
//!
//! 1. The version increments exactly once per value-changing write.
//! 2. Watchers are notified in registration order.
//! 3. Writing a value equal to the current one is a no-op.
//! 4. A dropped [`WatchGuard`] is never called again.

pub mod observable;

pub use observable::{Observable, WatchGuard};
