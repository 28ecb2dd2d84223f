#![forbid(unsafe_code)]

//! Producer-side view of a subscription.
//!
//! Producers never talk to an [`Observer`] directly. They get a
//! [`Subscriber`], which checks the shared termination state before every
//! delivery. That check is what makes "no delivery after termination" a
//! property of the subscription layer instead of something every callback
//! has to remember.
//!
//! # Failure Modes
//!
//! - **Re-entrant delivery**: a callback that synchronously pushes another
//!   value into the *same* subscriber panics (RefCell borrow rules). Producers
//!   always deliver from a queued task, so this only happens with a
//!   hand-written producer that loops back into itself.

use crate::observer::Observer;
use crate::subscription::SubscriptionCore;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Cloneable delivery endpoint handed to a source's producer.
pub struct Subscriber<T, E> {
    observer: Rc<RefCell<Observer<T, E>>>,
    core: Rc<SubscriptionCore>,
}

impl<T, E> Clone for Subscriber<T, E> {
    fn clone(&self) -> Self {
        Self {
            observer: Rc::clone(&self.observer),
            core: Rc::clone(&self.core),
        }
    }
}

impl<T, E> fmt::Debug for Subscriber<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("closed", &self.core.is_closed())
            .finish_non_exhaustive()
    }
}

impl<T, E> Subscriber<T, E> {
    pub(crate) fn new(observer: Observer<T, E>, core: Rc<SubscriptionCore>) -> Self {
        Self {
            observer: Rc::new(RefCell::new(observer)),
            core,
        }
    }

    /// True once the subscription terminated for any reason.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Register cleanup for when the subscription terminates. Runs
    /// immediately if it already has.
    pub fn add_teardown(&self, teardown: impl FnOnce() + 'static) {
        self.core.add(Box::new(teardown));
    }

    /// Terminate without notifying the observer. Returns `true` only for the
    /// call that terminated it.
    pub fn retire(&self) -> bool {
        self.core.close()
    }
}

impl<T, E: fmt::Debug> Subscriber<T, E> {
    /// Deliver a value. Dropped silently once terminated.
    pub fn next(&self, value: T) {
        if self.core.is_closed() {
            return;
        }
        self.observer.borrow_mut().deliver_next(value);
    }

    /// Terminate with an error, delivered at most once.
    pub fn error(&self, err: E) {
        if !self.core.close() {
            return;
        }
        self.observer.borrow_mut().deliver_error(err);
    }

    /// Terminate normally, delivered at most once.
    pub fn complete(&self) {
        if !self.core.close() {
            return;
        }
        self.observer.borrow_mut().deliver_complete();
    }
}

impl<T: 'static, E: fmt::Debug + 'static> Subscriber<T, E> {
    /// Observer that forwards every event into this subscriber.
    pub fn forwarder(&self) -> Observer<T, E> {
        let on_next = self.clone();
        let on_error = self.clone();
        let on_complete = self.clone();
        Observer::new(move |value: T| on_next.next(value))
            .on_error(move |err: E| on_error.error(err))
            .on_complete(move || on_complete.complete())
    }
}
