#![forbid(unsafe_code)]

//! Cold, push-based asynchronous sources.
//!
//! A [`Source`] is only a description: nothing runs until
//! [`Source::subscribe`] is called, and every subscription gets its own
//! producer run. Cloning a source is cheap and shares the description.
//!
//! # Example
//!
//! ```
//! use lifeline_runtime::{EventQueue, LifecycleScope, Observer, sources};
//! use std::time::Duration;
//!
//! let queue = EventQueue::new();
//! let scope = LifecycleScope::new("example");
//! let ticks = sources::interval(&queue, Duration::from_millis(10))
//!     .map(|n| n * 2)
//!     .bind_until(&scope.token());
//! let sub = ticks.subscribe(Observer::new(|n| println!("tick {n}")));
//! queue.advance(Duration::from_millis(25));
//! scope.fire();
//! assert!(sub.is_closed());
//! ```

use crate::observer::Observer;
use crate::subscriber::Subscriber;
use crate::subscription::{Subscription, SubscriptionCore};
use lifeline_core::LifecycleToken;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

type Producer<T, E> = dyn Fn(Subscriber<T, E>);

/// Cold asynchronous producer of `T` values that may fail with `E`.
pub struct Source<T, E = Infallible> {
    producer: Rc<Producer<T, E>>,
}

impl<T, E> Clone for Source<T, E> {
    fn clone(&self) -> Self {
        Self {
            producer: Rc::clone(&self.producer),
        }
    }
}

impl<T, E> fmt::Debug for Source<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source").finish_non_exhaustive()
    }
}

impl<T: 'static, E: fmt::Debug + 'static> Source<T, E> {
    /// Build a source from a producer.
    ///
    /// The producer runs once per subscription and must not block: it
    /// schedules work on the event queue and registers teardowns on the
    /// subscriber to cancel that work.
    pub fn new(producer: impl Fn(Subscriber<T, E>) + 'static) -> Self {
        Self {
            producer: Rc::new(producer),
        }
    }

    /// A source that terminates immediately without emitting.
    pub fn empty() -> Self {
        Self::new(|subscriber| subscriber.complete())
    }

    /// Start the producer and return the owner handle.
    pub fn subscribe(&self, observer: Observer<T, E>) -> Subscription {
        let core = SubscriptionCore::new();
        let subscriber = Subscriber::new(observer, Rc::clone(&core));
        (self.producer)(subscriber);
        Subscription::from_core(core)
    }

    /// Subscribe with a value callback only.
    pub fn subscribe_next(&self, next: impl FnMut(T) + 'static) -> Subscription {
        self.subscribe(Observer::new(next))
    }

    /// Transform every value.
    pub fn map<U: 'static>(&self, f: impl Fn(T) -> U + 'static) -> Source<U, E> {
        let upstream = self.clone();
        let f = Rc::new(f);
        Source::new(move |downstream: Subscriber<U, E>| {
            let f = Rc::clone(&f);
            let on_next = downstream.clone();
            let on_error = downstream.clone();
            let on_complete = downstream.clone();
            let sub = upstream.subscribe(
                Observer::new(move |value: T| on_next.next(f(value)))
                    .on_error(move |err: E| on_error.error(err))
                    .on_complete(move || on_complete.complete()),
            );
            downstream.add_teardown(move || {
                sub.unsubscribe();
            });
        })
    }

    /// Run a side effect on every value and pass it through unchanged.
    pub fn inspect(&self, f: impl Fn(&T) + 'static) -> Self {
        self.map(move |value| {
            f(&value);
            value
        })
    }

    /// Forward values until `token` fires. See [`bind_until`](crate::bind_until).
    pub fn bind_until(&self, token: &LifecycleToken) -> Self {
        crate::guard::bind_until(self, token)
    }
}
