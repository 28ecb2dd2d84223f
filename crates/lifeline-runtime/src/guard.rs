#![forbid(unsafe_code)]

//! Lifecycle-scoped cancellation guard.
//!
//! [`bind_until`] couples a subscription's lifetime to a [`LifecycleToken`].
//! The guarded source forwards values, errors and completion unchanged until
//! the token fires. When it fires, the guard synchronously retires the
//! downstream subscriber and unsubscribes from the upstream source, so no
//! queued callback can reach the observer afterwards.
//!
//! # Invariants
//!
//! 1. After the token fires, the observer sees nothing: no value, no error,
//!    no completion.
//! 2. An error or completion that arrives first is forwarded once; the guard
//!    then retires and deregisters its token listener.
//! 3. Subscribing while the token has already fired never starts the
//!    upstream producer.
//! 4. Cancelling the guarded subscription by hand behaves like an early fire
//!    for that subscription only; the token and its other listeners are
//!    untouched.

use crate::source::Source;
use lifeline_core::LifecycleToken;
use std::fmt;

/// Forward `source` until `token` fires.
pub fn bind_until<T: 'static, E: fmt::Debug + 'static>(
    source: &Source<T, E>,
    token: &LifecycleToken,
) -> Source<T, E> {
    let upstream = source.clone();
    let token = token.clone();
    Source::new(move |downstream| {
        if token.is_fired() {
            tracing::debug!(scope = token.label(), "guard bound to ended scope; retiring");
            downstream.retire();
            return;
        }

        let on_fire = downstream.clone();
        let scope = token.label();
        if let Some(key) = token.on_fire(move || {
            if on_fire.retire() {
                tracing::debug!(scope, "scope ended; guarded subscription retired");
            }
        }) {
            let token = token.clone();
            downstream.add_teardown(move || {
                token.remove_listener(key);
            });
        }

        let sub = upstream.subscribe(downstream.forwarder());
        downstream.add_teardown(move || {
            sub.unsubscribe();
        });
    })
}
