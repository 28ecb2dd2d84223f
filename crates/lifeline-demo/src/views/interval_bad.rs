#![forbid(unsafe_code)]

//! Periodic counter without a lifecycle guard.
//!
//! `start` subscribes to an interval and throws the handle away. `stop` can
//! only clear the running flag: the ticks keep coming, and keep coming after
//! the view is destroyed. Starting again after a stop adds a second ticker.

use crate::view::{
    Action, DestructionFlag, DisplayState, IntervalDisplay, View, ViewContext, ViewStats,
    edit_interval,
};
use lifeline_runtime::{LeakKind, Observable, sources};
use std::cell::Cell;
use std::rc::Rc;
use tracing::{error, info, warn};

const NAME: &str = "interval-bad";

pub struct IntervalBadView {
    ctx: ViewContext,
    state: Observable<DisplayState>,
    destroyed: DestructionFlag,
    stats: ViewStats,
    detached: Rc<Cell<u32>>,
}

impl IntervalBadView {
    #[must_use]
    pub fn new(ctx: ViewContext) -> Self {
        Self {
            ctx,
            state: Observable::new(DisplayState::Interval(IntervalDisplay::default())),
            destroyed: DestructionFlag::new(),
            stats: ViewStats::new(),
            detached: Rc::new(Cell::new(0)),
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
        let _ = sources::interval(&self.ctx.queue, self.ctx.tick_period).subscribe_next(move |tick| {
            let now_ms = ctx.now_ms();
            if destroyed.is_set() {
                error!(view = NAME, tick = tick + 1, "interval fired on a destroyed view");
                stats.record_after_destroy();
                ctx.report_leak(NAME, LeakKind::PostDestroyDelivery, format!("tick {}", tick + 1));
            } else {
                stats.record_accepted();
            }
            edit_interval(&state, |i| {
                i.counter += 1;
                i.last_update_ms = now_ms;
            });
            if !destroyed.is_set() {
                info!(view = NAME, counter = state.with(counter), now_ms, "tick");
            }
        });
        self.detached.set(self.detached.get() + 1);
    }

    fn stop(&mut self) {
        edit_interval(&self.state, |i| i.running = false);
        let detached = self.detached.get();
        info!(view = NAME, "stop requested");
        if detached > 0 {
            warn!(view = NAME, detached, "no handle kept; the interval keeps ticking in the background");
            self.ctx.report_leak(
                NAME,
                LeakKind::StopWithoutHandle,
                format!("{detached} interval(s) still running"),
            );
        }
    }
}

fn counter(state: &DisplayState) -> u64 {
    state.as_interval().map_or(0, |i| i.counter)
}

impl View for IntervalBadView {
    fn name(&self) -> &'static str {
        NAME
    }

    fn on_init(&mut self) {
        info!(view = NAME, "view created");
    }

    fn on_destroy(&mut self) {
        self.destroyed.set();
        info!(view = NAME, "view destroyed");
        let detached = self.detached.get();
        if detached > 0 {
            warn!(view = NAME, detached, "leak: the interval keeps running after destruction");
            self.ctx.report_leak(
                NAME,
                LeakKind::LiveAtDestroy,
                format!("{detached} interval(s) still running"),
            );
        }
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
