#![forbid(unsafe_code)]

//! Single-fire end-of-scope signal.
//!
//! A [`LifecycleScope`] is owned by whatever has a well-defined end (a view,
//! a request, a session). It hands out [`LifecycleToken`]s that observers use
//! to register callbacks. The scope fires exactly once, either explicitly via
//! [`LifecycleScope::fire`] or implicitly when it is dropped.
//!
//! # Invariants
//!
//! 1. A token fires at most once and never un-fires.
//! 2. Listeners run synchronously inside `fire()`, in registration order,
//!    before `fire()` returns.
//! 3. A listener registered on an already-fired token runs immediately.
//! 4. Removing a listener that already ran (or was removed) is a no-op.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

type Listener = Box<dyn FnOnce()>;

/// Key returned by [`LifecycleToken::on_fire`], used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerKey(u64);

struct TokenInner {
    fired: Cell<bool>,
    next_key: Cell<u64>,
    listeners: RefCell<Vec<(ListenerKey, Listener)>>,
    label: &'static str,
}

/// Observer side of a lifecycle scope. Cheap to clone.
#[derive(Clone)]
pub struct LifecycleToken {
    inner: Rc<TokenInner>,
}

impl fmt::Debug for LifecycleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleToken")
            .field("label", &self.inner.label)
            .field("fired", &self.inner.fired.get())
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

impl LifecycleToken {
    fn with_label(label: &'static str) -> Self {
        Self {
            inner: Rc::new(TokenInner {
                fired: Cell::new(false),
                next_key: Cell::new(0),
                listeners: RefCell::new(Vec::new()),
                label,
            }),
        }
    }

    /// A token whose scope has already ended.
    #[must_use]
    pub fn already_fired() -> Self {
        let token = Self::with_label("already-fired");
        token.inner.fired.set(true);
        token
    }

    /// True once the owning scope has ended.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.inner.fired.get()
    }

    /// Label of the owning scope, for diagnostics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.inner.label
    }

    /// Number of listeners still waiting for the fire.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Register `callback` to run when the scope ends.
    ///
    /// If the token already fired, `callback` runs immediately and `None` is
    /// returned.
    pub fn on_fire(&self, callback: impl FnOnce() + 'static) -> Option<ListenerKey> {
        if self.is_fired() {
            callback();
            return None;
        }
        let key = ListenerKey(self.inner.next_key.get());
        self.inner.next_key.set(key.0 + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((key, Box::new(callback)));
        Some(key)
    }

    /// Deregister a listener. Returns `false` if it is no longer registered.
    pub fn remove_listener(&self, key: ListenerKey) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(k, _)| *k != key);
        listeners.len() != before
    }

    /// Fire the token. Returns `true` only for the call that fired it.
    fn fire(&self) -> bool {
        if self.inner.fired.replace(true) {
            return false;
        }
        // Take the listeners out first so they may touch the token freely.
        let listeners = std::mem::take(&mut *self.inner.listeners.borrow_mut());
        #[cfg(feature = "tracing")]
        tracing::debug!(
            scope = self.inner.label,
            listeners = listeners.len(),
            "lifecycle scope fired"
        );
        for (_, listener) in listeners {
            listener();
        }
        true
    }
}

/// Owner side of a lifecycle: fires its token once, at the latest on drop.
pub struct LifecycleScope {
    token: LifecycleToken,
}

impl fmt::Debug for LifecycleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleScope")
            .field("token", &self.token)
            .finish()
    }
}

impl LifecycleScope {
    /// Open a new scope. The label shows up in debug output and logs.
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            token: LifecycleToken::with_label(label),
        }
    }

    /// A token bound to this scope.
    #[must_use]
    pub fn token(&self) -> LifecycleToken {
        self.token.clone()
    }

    /// True once the scope has ended.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.token.is_fired()
    }

    /// End the scope. Returns `false` if it had already ended.
    pub fn fire(&self) -> bool {
        self.token.fire()
    }

    /// End the scope and consume it.
    pub fn destroy(self) -> bool {
        self.fire()
    }
}

impl Drop for LifecycleScope {
    fn drop(&mut self) {
        self.token.fire();
    }
}
