#![forbid(unsafe_code)]

//! View contract shared by the four demo views.
//!
//! A view is created by the router, initialised once, receives user actions,
//! and is destroyed once. Its display state lives in an [`Observable`] and its
//! delivery counters in [`ViewStats`]; both are reference-counted so that
//! anything still holding them after destruction (a dangling callback, or the
//! router's history) keeps working against the same data.

use crate::user_service::{User, UserService};
use lifeline_runtime::{EventQueue, LeakKind, LeakRecord, LeakSink, Observable};
use serde::Serialize;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Default period of the interval views.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(1000);

/// User action forwarded by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Load,
    LoadNext,
    Start,
    Stop,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Load, Action::LoadNext, Action::Start, Action::Stop];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::LoadNext => "load-next",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set once when the owning view is torn down.
///
/// Callbacks that outlive their view read it to avoid crashing. It does not
/// stop the work from happening.
#[derive(Debug, Clone, Default)]
pub struct DestructionFlag(Rc<Cell<bool>>);

impl DestructionFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark destroyed. Returns `true` only the first time.
    pub fn set(&self) -> bool {
        !self.0.replace(true)
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.get()
    }
}

#[derive(Debug, Default)]
struct StatsInner {
    accepted: Cell<u64>,
    after_destroy: Cell<u64>,
    errors: Cell<u64>,
}

/// Delivery counters of one view. Clones share the counters.
#[derive(Debug, Clone, Default)]
pub struct ViewStats {
    inner: Rc<StatsInner>,
}

/// Point-in-time copy of [`ViewStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Values accepted while the view was alive.
    pub accepted: u64,
    /// Callbacks that ran after the view was destroyed.
    pub after_destroy: u64,
    /// Errors delivered to the view.
    pub errors: u64,
}

impl ViewStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&self) {
        bump(&self.inner.accepted);
    }

    pub fn record_after_destroy(&self) {
        bump(&self.inner.after_destroy);
    }

    pub fn record_error(&self) {
        bump(&self.inner.errors);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.inner.accepted.get(),
            after_destroy: self.inner.after_destroy.get(),
            errors: self.inner.errors.get(),
        }
    }
}

fn bump(counter: &Cell<u64>) {
    counter.set(counter.get().saturating_add(1));
}

/// What a fetch view shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchDisplay {
    pub user_id: u32,
    pub user: Option<User>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for FetchDisplay {
    fn default() -> Self {
        Self {
            user_id: 1,
            user: None,
            loading: false,
            error: None,
        }
    }
}

/// What an interval view shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntervalDisplay {
    pub counter: u64,
    /// Virtual time of the last tick, in milliseconds.
    pub last_update_ms: u64,
    pub running: bool,
}

/// Display state of any view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayState {
    Fetch(FetchDisplay),
    Interval(IntervalDisplay),
}

impl DisplayState {
    #[must_use]
    pub fn as_fetch(&self) -> Option<&FetchDisplay> {
        match self {
            Self::Fetch(display) => Some(display),
            Self::Interval(_) => None,
        }
    }

    #[must_use]
    pub fn as_interval(&self) -> Option<&IntervalDisplay> {
        match self {
            Self::Interval(display) => Some(display),
            Self::Fetch(_) => None,
        }
    }
}

/// Edit the fetch part of `state`. No-op for interval state.
pub(crate) fn edit_fetch(state: &Observable<DisplayState>, f: impl FnOnce(&mut FetchDisplay)) {
    state.update(|s| {
        if let DisplayState::Fetch(display) = s {
            f(display);
        }
    });
}

/// Edit the interval part of `state`. No-op for fetch state.
pub(crate) fn edit_interval(state: &Observable<DisplayState>, f: impl FnOnce(&mut IntervalDisplay)) {
    state.update(|s| {
        if let DisplayState::Interval(display) = s {
            f(display);
        }
    });
}

/// Everything a view needs from its host.
#[derive(Debug, Clone)]
pub struct ViewContext {
    pub queue: EventQueue,
    pub service: UserService,
    pub tick_period: Duration,
    pub leak_sink: Option<LeakSink>,
}

impl ViewContext {
    #[must_use]
    pub fn new(queue: &EventQueue, service: UserService) -> Self {
        Self {
            queue: queue.clone(),
            service,
            tick_period: DEFAULT_TICK_PERIOD,
            leak_sink: None,
        }
    }

    #[must_use]
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    #[must_use]
    pub fn with_leak_sink(mut self, sink: Option<LeakSink>) -> Self {
        self.leak_sink = sink;
        self
    }

    /// Virtual time in milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.queue.now().as_millis()).unwrap_or(u64::MAX)
    }

    /// Write leak evidence if a sink is configured. Sink failures are logged
    /// and otherwise ignored.
    pub fn report_leak(&self, owner: &str, kind: LeakKind, detail: impl Into<String>) {
        let Some(sink) = &self.leak_sink else {
            return;
        };
        let record = LeakRecord::new(owner, kind, self.now_ms(), detail);
        if let Err(err) = sink.record(&record) {
            warn!(owner, error = %err, "failed to write leak record");
        }
    }
}

/// A routed view.
pub trait View {
    /// Route-style name used in logs and leak records.
    fn name(&self) -> &'static str;

    /// Called once, right after creation.
    fn on_init(&mut self);

    /// Called once, right before the view is dropped.
    fn on_destroy(&mut self);

    /// Handle a user action. Actions a view does not support are ignored.
    fn handle(&mut self, action: Action);

    /// Shared display state.
    fn display(&self) -> Observable<DisplayState>;

    /// Shared delivery counters.
    fn stats(&self) -> ViewStats;
}
