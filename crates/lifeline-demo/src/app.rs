#![forbid(unsafe_code)]

//! Router: owns the current view and its lifecycle.
//!
//! Navigation always finishes tearing the outgoing view down (its
//! `on_destroy`, then drop, which fires any scope it owns) before the
//! incoming view is created and initialised. Each visit is kept in the
//! history together with the view's shared stats, so deliveries that happen
//! after a view is gone still show up against the right visit.
//!
//! While a view is mounted the router also follows its display changes. That
//! subscription is bound to a per-mount scope, so writes a dangling callback
//! makes into a destroyed view are never counted as updates.

use crate::view::{Action, DisplayState, StatsSnapshot, View, ViewContext, ViewStats};
use crate::views::{DanglingCallBadView, GoodView, IntervalBadView, IntervalGoodView};
use lifeline_runtime::{LifecycleScope, Observable};
use serde::Serialize;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info};

/// One routable view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    /// `bad`: user fetch without a guard.
    Bad,
    /// `good`: guarded user fetch.
    Good,
    IntervalBad,
    IntervalGood,
}

impl Route {
    pub const ALL: [Route; 4] = [Route::Bad, Route::Good, Route::IntervalBad, Route::IntervalGood];

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Bad => "bad",
            Self::Good => "good",
            Self::IntervalBad => "interval-bad",
            Self::IntervalGood => "interval-good",
        }
    }

    /// Resolve a path. Leading slashes are ignored; the empty path
    /// redirects to [`Route::Bad`].
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.trim().trim_start_matches('/');
        if path.is_empty() {
            return Some(Self::Bad);
        }
        Self::ALL.into_iter().find(|route| route.path() == path)
    }

    fn create(self, ctx: ViewContext) -> Box<dyn View> {
        match self {
            Self::Bad => Box::new(DanglingCallBadView::new(ctx)),
            Self::Good => Box::new(GoodView::new(ctx)),
            Self::IntervalBad => Box::new(IntervalBadView::new(ctx)),
            Self::IntervalGood => Box::new(IntervalGoodView::new(ctx)),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Lifecycle transitions in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "route", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Created(Route),
    Destroyed(Route),
}

/// One visit to a route.
#[derive(Debug, Clone)]
pub struct Visit {
    pub route: Route,
    pub entered_at_ms: u64,
    pub left_at_ms: Option<u64>,
    pub stats: ViewStats,
    pub display: Observable<DisplayState>,
    display_updates: Rc<Cell<u64>>,
}

impl Visit {
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Display changes seen while the view was mounted.
    #[must_use]
    pub fn display_updates(&self) -> u64 {
        self.display_updates.get()
    }
}

struct Mounted {
    route: Route,
    view: Box<dyn View>,
    scope: LifecycleScope,
}

/// Routes between the demo views.
pub struct App {
    ctx: ViewContext,
    current: Option<Mounted>,
    history: Vec<Visit>,
    lifecycle: Vec<LifecycleEvent>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("current", &self.current_route())
            .field("visits", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl App {
    #[must_use]
    pub fn new(ctx: ViewContext) -> Self {
        Self {
            ctx,
            current: None,
            history: Vec::new(),
            lifecycle: Vec::new(),
        }
    }

    /// Destroy the current view, then create and initialise `route`.
    pub fn navigate(&mut self, route: Route) {
        let from = self.current_route();
        self.unmount();
        info!(from = from.map(Route::path), to = route.path(), "navigate");

        let mut view = route.create(self.ctx.clone());
        view.on_init();
        self.lifecycle.push(LifecycleEvent::Created(route));

        let scope = LifecycleScope::new(route.path());
        let display = view.display();
        let display_updates = Rc::new(Cell::new(0));
        let updates = Rc::clone(&display_updates);
        let _ = display
            .changes()
            .bind_until(&scope.token())
            .subscribe_next(move |_| {
                updates.set(updates.get() + 1);
                debug!(route = route.path(), updates = updates.get(), "display changed");
            });

        self.history.push(Visit {
            route,
            entered_at_ms: self.ctx.now_ms(),
            left_at_ms: None,
            stats: view.stats(),
            display,
            display_updates,
        });
        self.current = Some(Mounted { route, view, scope });
    }

    /// Navigate by path. Returns the resolved route, or `None` for an unknown
    /// path (nothing changes in that case).
    pub fn navigate_path(&mut self, path: &str) -> Option<Route> {
        let route = Route::parse(path)?;
        self.navigate(route);
        Some(route)
    }

    /// Forward `action` to the current view. Returns `false` when no view is
    /// mounted.
    pub fn dispatch(&mut self, action: Action) -> bool {
        match self.current.as_mut() {
            Some(mounted) => {
                debug!(route = mounted.route.path(), action = action.as_str(), "dispatch");
                mounted.view.handle(action);
                true
            }
            None => false,
        }
    }

    /// Destroy the current view without mounting another.
    pub fn close(&mut self) {
        self.unmount();
    }

    fn unmount(&mut self) {
        let Some(Mounted { route, mut view, scope }) = self.current.take() else {
            return;
        };
        scope.fire();
        view.on_destroy();
        drop(view);
        self.lifecycle.push(LifecycleEvent::Destroyed(route));
        let now = self.ctx.now_ms();
        if let Some(visit) = self.history.last_mut() {
            visit.left_at_ms = Some(now);
        }
    }

    #[must_use]
    pub fn current_route(&self) -> Option<Route> {
        self.current.as_ref().map(|mounted| mounted.route)
    }

    /// Display state of the current view.
    #[must_use]
    pub fn current_display(&self) -> Option<DisplayState> {
        self.current.as_ref().map(|mounted| mounted.view.display().get())
    }

    #[must_use]
    pub fn history(&self) -> &[Visit] {
        &self.history
    }

    #[must_use]
    pub fn lifecycle(&self) -> &[LifecycleEvent] {
        &self.lifecycle
    }

    #[must_use]
    pub fn context(&self) -> &ViewContext {
        &self.ctx
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::tests::{context, ms};

    #[test]
    fn empty_path_redirects_to_bad() {
        assert_eq!(Route::parse(""), Some(Route::Bad));
        assert_eq!(Route::parse("/"), Some(Route::Bad));
        assert_eq!(Route::parse("/interval-good"), Some(Route::IntervalGood));
        assert_eq!(Route::parse("elsewhere"), None);
    }

    #[test]
    fn outgoing_view_is_destroyed_before_incoming_is_created() {
        let mut app = App::new(context(&[]));
        app.navigate(Route::Good);
        app.navigate(Route::IntervalBad);
        app.navigate(Route::Bad);
        assert_eq!(
            app.lifecycle(),
            &[
                LifecycleEvent::Created(Route::Good),
                LifecycleEvent::Destroyed(Route::Good),
                LifecycleEvent::Created(Route::IntervalBad),
                LifecycleEvent::Destroyed(Route::IntervalBad),
                LifecycleEvent::Created(Route::Bad),
            ]
        );
    }

    #[test]
    fn history_keeps_stats_of_destroyed_views() {
        let mut app = App::new(context(&[]));
        let queue = app.context().queue.clone();
        app.navigate(Route::Bad);
        app.dispatch(Action::Load);
        queue.advance(ms(1000));
        app.navigate(Route::Good);
        queue.advance(ms(3000));

        let history = app.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].route, Route::Bad);
        assert_eq!(history[0].left_at_ms, Some(1000));
        assert_eq!(history[0].snapshot().after_destroy, 1);
        assert_eq!(history[1].left_at_ms, None);
    }

    #[test]
    fn guarded_view_leaves_nothing_behind() {
        let mut app = App::new(context(&[]));
        let queue = app.context().queue.clone();
        app.navigate(Route::IntervalGood);
        app.dispatch(Action::Start);
        queue.advance(ms(2500));
        app.navigate(Route::Good);
        assert_eq!(queue.pending(), 0);
        queue.advance(ms(5000));
        assert_eq!(app.history()[0].snapshot().accepted, 2);
        assert_eq!(app.history()[0].snapshot().after_destroy, 0);
    }

    #[test]
    fn display_updates_stop_counting_at_unmount() {
        let mut app = App::new(context(&[]));
        let queue = app.context().queue.clone();
        app.navigate(Route::IntervalBad);
        app.dispatch(Action::Start);
        queue.advance(ms(1500));
        app.navigate(Route::IntervalGood);
        app.dispatch(Action::Start);
        queue.advance(ms(2000));

        // start, then one tick at 1000
        assert_eq!(app.history()[0].display_updates(), 2);
        // The detached ticker kept writing into the stale view.
        assert_eq!(app.history()[0].snapshot().after_destroy, 2);
        // start, then ticks at 2500 and 3500
        assert_eq!(app.history()[1].display_updates(), 3);

        app.close();
        queue.advance(ms(2000));
        assert_eq!(app.history()[1].display_updates(), 3);
    }

    #[test]
    fn dispatch_without_view() {
        let mut app = App::new(context(&[]));
        assert!(!app.dispatch(Action::Load));
        assert_eq!(app.navigate_path(""), Some(Route::Bad));
        assert!(app.dispatch(Action::Load));
        assert_eq!(app.navigate_path("nowhere"), None);
        assert_eq!(app.current_route(), Some(Route::Bad));
    }

    #[test]
    fn close_destroys_current() {
        let mut app = App::new(context(&[]));
        app.navigate(Route::IntervalGood);
        app.dispatch(Action::Start);
        app.close();
        assert_eq!(app.current_route(), None);
        assert_eq!(app.context().queue.pending(), 0);
    }
}
