#![forbid(unsafe_code)]

//! Subscription handles.
//!
//! A [`Subscription`] is the single owner's handle on a running source. It is
//! terminated by whichever happens first: an explicit [`Subscription::unsubscribe`],
//! the source completing, or the source failing. Termination runs the
//! registered teardowns exactly once.
//!
//! Dropping a `Subscription` does **not** terminate it: the producer keeps
//! running with nobody able to stop it. That is the dangling-subscription
//! defect, and it is kept reachable on purpose. Use
//! [`Subscription::into_guard`] for RAII termination.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

type Teardown = Box<dyn FnOnce()>;

/// Shared termination state between a [`Subscription`] and its producer.
pub(crate) struct SubscriptionCore {
    closed: Cell<bool>,
    teardowns: RefCell<Vec<Teardown>>,
}

impl SubscriptionCore {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            closed: Cell::new(false),
            teardowns: RefCell::new(Vec::new()),
        })
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Close and run teardowns. Returns `true` only for the closing call.
    pub(crate) fn close(&self) -> bool {
        if self.closed.replace(true) {
            return false;
        }
        let teardowns = std::mem::take(&mut *self.teardowns.borrow_mut());
        for teardown in teardowns {
            teardown();
        }
        true
    }

    /// Register a teardown; runs it immediately when already closed.
    pub(crate) fn add(&self, teardown: Teardown) {
        if self.is_closed() {
            teardown();
        } else {
            self.teardowns.borrow_mut().push(teardown);
        }
    }
}

/// Owner handle for a running source.
///
/// # Invariants
///
/// 1. After termination no value reaches the observer.
/// 2. `unsubscribe` on a terminated handle is a no-op returning `false`.
/// 3. Teardowns run once, in registration order.
#[must_use = "dropping a Subscription detaches it; keep it to be able to unsubscribe"]
pub struct Subscription {
    core: Rc<SubscriptionCore>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.core.is_closed())
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub(crate) fn from_core(core: Rc<SubscriptionCore>) -> Self {
        Self { core }
    }

    /// A handle that is already terminated.
    pub fn closed() -> Self {
        let core = SubscriptionCore::new();
        core.close();
        Self { core }
    }

    /// Terminate the subscription. Returns `true` only if this call did it.
    pub fn unsubscribe(&self) -> bool {
        let closed = self.core.close();
        if closed {
            tracing::trace!("subscription cancelled by owner");
        }
        closed
    }

    /// True once cancelled, completed or failed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Turn the handle into a guard that unsubscribes when dropped.
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard { inner: Some(self) }
    }
}

/// RAII wrapper: unsubscribes on drop.
#[derive(Debug)]
pub struct SubscriptionGuard {
    inner: Option<Subscription>,
}

impl SubscriptionGuard {
    /// True once the wrapped subscription terminated.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.as_ref().is_none_or(Subscription::is_closed)
    }

    /// Give the handle back without unsubscribing.
    pub fn disarm(mut self) -> Subscription {
        match self.inner.take() {
            Some(sub) => sub,
            None => Subscription::closed(),
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(sub) = self.inner.take() {
            sub.unsubscribe();
        }
    }
}
