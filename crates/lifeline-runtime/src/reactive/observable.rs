#![forbid(unsafe_code)]

//! Version-tracked value with change watchers.
//!
//! # Design
//!
//! [`Observable<T>`] keeps its value in shared `Rc<RefCell<..>>` storage.
//! Watchers are held as `Weak` callbacks; the strong side lives in the
//! [`WatchGuard`] returned to the caller, so dropping the guard is enough to
//! stop notifications. Dead entries are pruned on the next change.
//!
//! [`Observable::changes`] exposes the change stream as a [`Source`], so a
//! consumer that should stop listening at the end of a lifecycle guards it
//! with `bind_until` like any other source.
//!
//! # Failure Modes
//!
//! - **Re-entrant write**: calling `set()` from inside a watcher panics
//!   (RefCell borrow rules). A watcher that writes back into what it watches
//!   is a feedback loop and should go through the event queue instead.

use crate::source::Source;
use std::cell::RefCell;
use std::convert::Infallible;
use std::fmt;
use std::rc::{Rc, Weak};

type WatcherRc<T> = Rc<dyn Fn(&T)>;
type WatcherWeak<T> = Weak<dyn Fn(&T)>;

struct ObservableInner<T> {
    value: T,
    version: u64,
    watchers: Vec<WatcherWeak<T>>,
}

/// Shared, version-tracked value. Clones share value and watchers.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("watchers", &inner.watchers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Wrap `value` at version 0 with no watchers.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                watchers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Number of value-changing writes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Registered watchers, including dropped ones not yet pruned.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.inner.borrow().watchers.len()
    }

    /// Replace the value; notifies watchers if it changed.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
    }

    /// Edit the value in place; notifies watchers if it changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let before = inner.value.clone();
            f(&mut inner.value);
            let changed = inner.value != before;
            if changed {
                inner.version += 1;
            }
            changed
        };
        if changed {
            self.notify();
        }
    }

    /// Call `watcher` with every new value until the guard is dropped.
    pub fn watch(&self, watcher: impl Fn(&T) + 'static) -> WatchGuard {
        let strong: WatcherRc<T> = Rc::new(watcher);
        self.inner
            .borrow_mut()
            .watchers
            .push(Rc::downgrade(&strong));
        WatchGuard {
            _strong: Box::new(strong),
        }
    }

    /// The change stream as a source. Each subscription sees the values
    /// written after it subscribed, never the current one.
    pub fn changes(&self) -> Source<T, Infallible> {
        let observable = self.clone();
        Source::new(move |subscriber| {
            let target = subscriber.clone();
            let guard = observable.watch(move |value: &T| target.next(value.clone()));
            subscriber.add_teardown(move || drop(guard));
        })
    }

    fn notify(&self) {
        // Collect live watchers first; no borrow may be held during calls.
        let (live, value): (Vec<WatcherRc<T>>, T) = {
            let mut inner = self.inner.borrow_mut();
            inner.watchers.retain(|w| w.strong_count() > 0);
            let live = inner.watchers.iter().filter_map(Weak::upgrade).collect();
            (live, inner.value.clone())
        };
        for watcher in &live {
            watcher(&value);
        }
    }
}

/// Keeps a watcher registered. Dropping it unregisters the watcher.
pub struct WatchGuard {
    // Type-erased `Rc<dyn Fn(&T)>`; the observable only holds the `Weak`.
    _strong: Box<dyn std::any::Any>,
}

impl fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchGuard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind_until;
    use lifeline_core::LifecycleScope;
    use std::cell::Cell;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        value: u64,
        running: bool,
    }

    fn counter() -> Observable<Counter> {
        Observable::new(Counter {
            value: 0,
            running: false,
        })
    }

    #[test]
    fn set_bumps_version_only_on_change() {
        let obs = counter();
        obs.update(|c| c.running = true);
        obs.update(|c| c.running = true);
        obs.set(Counter {
            value: 0,
            running: true,
        });
        assert_eq!(obs.version(), 1);
        obs.update(|c| c.value += 1);
        assert_eq!(obs.version(), 2);
        assert_eq!(obs.with(|c| c.value), 1);
    }

    #[test]
    fn watchers_see_new_values_in_order() {
        let obs = Observable::new(0u32);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = Rc::clone(&log);
        let _a = obs.watch(move |v| l1.borrow_mut().push(("a", *v)));
        let l2 = Rc::clone(&log);
        let _b = obs.watch(move |v| l2.borrow_mut().push(("b", *v)));
        obs.set(7);
        assert_eq!(*log.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn dropped_guard_is_pruned() {
        let obs = Observable::new(0u32);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let guard = obs.watch(move |_| h.set(h.get() + 1));
        obs.set(1);
        drop(guard);
        assert_eq!(obs.watcher_count(), 1);
        obs.set(2);
        assert_eq!(hits.get(), 1);
        assert_eq!(obs.watcher_count(), 0);
    }

    #[test]
    fn changes_source_can_be_guarded() {
        let obs = Observable::new(0u32);
        let scope = LifecycleScope::new("panel");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let sub = bind_until(&obs.changes(), &scope.token())
            .subscribe_next(move |v| s.borrow_mut().push(v));
        obs.set(1);
        obs.set(2);
        scope.fire();
        obs.set(3);
        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert!(sub.is_closed());
    }

    #[test]
    fn clones_share_state() {
        let a = Observable::new(String::from("idle"));
        let b = a.clone();
        b.set("running".into());
        assert_eq!(a.get(), "running");
        assert_eq!(a.version(), 1);
    }

    #[test]
    fn debug_format() {
        let dbg = format!("{:?}", Observable::new(42));
        assert!(dbg.contains("Observable"));
        assert!(dbg.contains("42"));
        assert!(dbg.contains("version"));
    }
}
