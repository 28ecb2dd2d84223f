#![forbid(unsafe_code)]

//! Periodic counter guarded by the view's lifecycle scope.
//!
//! The handle is kept so `stop` can cancel it; destruction closes it through
//! the guard whether or not `stop` was called.

use crate::view::{
    Action, DestructionFlag, DisplayState, IntervalDisplay, View, ViewContext, ViewStats,
    edit_interval,
};
use lifeline_runtime::{LifecycleScope, Observable, Subscription, sources};
use tracing::{error, info};

const NAME: &str = "interval-good";

pub struct IntervalGoodView {
    ctx: ViewContext,
    scope: LifecycleScope,
    state: Observable<DisplayState>,
    destroyed: DestructionFlag,
    stats: ViewStats,
    ticker: Option<Subscription>,
}

impl IntervalGoodView {
    #[must_use]
    pub fn new(ctx: ViewContext) -> Self {
        Self {
            ctx,
            scope: LifecycleScope::new(NAME),
            state: Observable::new(DisplayState::Interval(IntervalDisplay::default())),
            destroyed: DestructionFlag::new(),
            stats: ViewStats::new(),
            ticker: None,
        }
    }

    fn is_running(&self) -> bool {
        self.state.with(|s| s.as_interval().is_some_and(|i| i.running))
    }

    fn start(&mut self) {
        if self.is_running() {
            return;
        }
        edit_interval(&self.state, |i| i.running = true);
        info!(view = NAME, period = ?self.ctx.tick_period, "interval started");

        let (state, destroyed, stats, ctx) = (
            self.state.clone(),
            self.destroyed.clone(),
            self.stats.clone(),
            self.ctx.clone(),
        );
        let ticker = sources::interval(&self.ctx.queue, self.ctx.tick_period)
            .bind_until(&self.scope.token())
            .subscribe_next(move |_tick| {
                if destroyed.is_set() {
                    error!(view = NAME, "unexpected tick after destruction");
                    stats.record_after_destroy();
                    return;
                }
                let now_ms = ctx.now_ms();
                stats.record_accepted();
                edit_interval(&state, |i| {
                    i.counter += 1;
                    i.last_update_ms = now_ms;
                });
                let counter = state.with(|s| s.as_interval().map_or(0, |i| i.counter));
                info!(view = NAME, counter, now_ms, "tick");
            });
        self.ticker = Some(ticker);
    }

    fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.unsubscribe();
            edit_interval(&self.state, |i| i.running = false);
            info!(view = NAME, "interval stopped");
        }
    }
}

impl View for IntervalGoodView {
    fn name(&self) -> &'static str {
        NAME
    }

    fn on_init(&mut self) {
        info!(view = NAME, "view created");
    }

    fn on_destroy(&mut self) {
        self.destroyed.set();
        self.scope.fire();
        let was_running = self.is_running();
        edit_interval(&self.state, |i| i.running = false);
        info!(view = NAME, was_running, "view destroyed; interval closed by its guard");
    }

    fn handle(&mut self, action: Action) {
        match action {
            Action::Start => self.start(),
            Action::Stop => self.stop(),
            Action::Load | Action::LoadNext => {}
        }
    }

    fn display(&self) -> Observable<DisplayState> {
        self.state.clone()
    }

    fn stats(&self) -> ViewStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::tests::{context, ms};

    #[test]
    fn destroy_stops_ticks() {
        let ctx = context(&[]);
        let queue = ctx.queue.clone();
        let mut view = IntervalGoodView::new(ctx);
        view.handle(Action::Start);
        queue.advance(ms(2500));
        let stats = view.stats();
        view.on_destroy();
        drop(view);
        queue.advance(ms(5000));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.accepted, 2);
        assert_eq!(snapshot.after_destroy, 0);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn stop_then_destroy_is_safe() {
        let ctx = context(&[]);
        let queue = ctx.queue.clone();
        let mut view = IntervalGoodView::new(ctx);
        view.handle(Action::Start);
        queue.advance(ms(1500));
        view.handle(Action::Stop);
        assert_eq!(queue.pending(), 0);
        assert!(!view.display().get().as_interval().unwrap().running);
        view.on_destroy();
        queue.advance(ms(3000));
        assert_eq!(view.stats().snapshot().accepted, 1);
    }

    #[test]
    fn stop_without_start_is_noop() {
        let ctx = context(&[]);
        let mut view = IntervalGoodView::new(ctx);
        view.handle(Action::Stop);
        assert_eq!(view.display().version(), 0);
    }

    #[test]
    fn restart_after_stop_runs_one_ticker() {
        let ctx = context(&[]);
        let queue = ctx.queue.clone();
        let mut view = IntervalGoodView::new(ctx);
        view.handle(Action::Start);
        view.handle(Action::Stop);
        view.handle(Action::Start);
        assert_eq!(queue.pending(), 1);
        queue.advance(ms(2000));
        assert_eq!(view.display().get().as_interval().unwrap().counter, 2);
    }
}
