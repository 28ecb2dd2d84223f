#![forbid(unsafe_code)]

//! User fetch without a lifecycle guard.
//!
//! The subscription handle is dropped as soon as the request starts, so
//! nothing can cancel it. When the view is destroyed first, the response
//! still arrives one latency later, the callback finds the destruction flag
//! set, and mutates the stale state anyway.

use crate::user_service::{FetchError, User};
use crate::view::{
    Action, DestructionFlag, DisplayState, FetchDisplay, View, ViewContext, ViewStats, edit_fetch,
};
use lifeline_runtime::{LeakKind, Observable, Observer};
use std::cell::Cell;
use std::rc::Rc;
use tracing::{error, info, warn};

const NAME: &str = "dangling-call-bad";

pub struct DanglingCallBadView {
    ctx: ViewContext,
    state: Observable<DisplayState>,
    destroyed: DestructionFlag,
    stats: ViewStats,
    in_flight: Rc<Cell<u32>>,
}

impl DanglingCallBadView {
    #[must_use]
    pub fn new(ctx: ViewContext) -> Self {
        Self {
            ctx,
            state: Observable::new(DisplayState::Fetch(FetchDisplay::default())),
            destroyed: DestructionFlag::new(),
            stats: ViewStats::new(),
            in_flight: Rc::new(Cell::new(0)),
        }
    }

    fn load(&self) {
        let user_id = self.state.with(|s| s.as_fetch().map_or(1, |f| f.user_id));
        edit_fetch(&self.state, |f| {
            f.loading = true;
            f.error = None;
        });
        self.in_flight.set(self.in_flight.get() + 1);

        let (state, destroyed, stats, ctx) = (
            self.state.clone(),
            self.destroyed.clone(),
            self.stats.clone(),
            self.ctx.clone(),
        );
        let on_next = move |user: User| {
            if destroyed.is_set() {
                error!(view = NAME, user_id = user.id, "callback ran on a destroyed view");
                stats.record_after_destroy();
                ctx.report_leak(NAME, LeakKind::PostDestroyDelivery, format!("user {}", user.id));
                edit_fetch(&state, |f| {
                    f.user = Some(user);
                    f.loading = false;
                });
                warn!(view = NAME, "state mutated on a destroyed view");
            } else {
                info!(view = NAME, user_id = user.id, "response received");
                stats.record_accepted();
                edit_fetch(&state, |f| {
                    f.user = Some(user);
                    f.loading = false;
                });
            }
        };

        let (state, destroyed, stats, ctx) = (
            self.state.clone(),
            self.destroyed.clone(),
            self.stats.clone(),
            self.ctx.clone(),
        );
        let in_flight = Rc::clone(&self.in_flight);
        let on_error = move |err: FetchError| {
            in_flight.set(in_flight.get().saturating_sub(1));
            error!(view = NAME, error = %err, "fetch failed");
            stats.record_error();
            if destroyed.is_set() {
                stats.record_after_destroy();
                ctx.report_leak(NAME, LeakKind::PostDestroyDelivery, err.to_string());
            }
            edit_fetch(&state, |f| {
                f.loading = false;
                f.error = Some(err.to_string());
            });
        };

        let in_flight = Rc::clone(&self.in_flight);
        // The handle is dropped right away: nothing can cancel this request.
        let _ = self.ctx.service.get_user_data(user_id, NAME).subscribe(
            Observer::new(on_next)
                .on_error(on_error)
                .on_complete(move || in_flight.set(in_flight.get().saturating_sub(1))),
        );
    }

    fn load_next(&self) {
        edit_fetch(&self.state, |f| {
            f.user_id += 1;
            f.user = None;
        });
        self.load();
    }
}

impl View for DanglingCallBadView {
    fn name(&self) -> &'static str {
        NAME
    }

    fn on_init(&mut self) {
        info!(view = NAME, "view created");
    }

    fn on_destroy(&mut self) {
        self.destroyed.set();
        info!(view = NAME, "view destroyed");
        let pending = self.in_flight.get();
        if pending > 0 {
            warn!(view = NAME, pending, "orphaned subscription: the response callback will still run");
            self.ctx
                .report_leak(NAME, LeakKind::LiveAtDestroy, format!("{pending} request(s) in flight"));
        }
    }

    fn handle(&mut self, action: Action) {
        match action {
            Action::Load => self.load(),
            Action::LoadNext => self.load_next(),
            Action::Start | Action::Stop => {}
        }
    }

    fn display(&self) -> Observable<DisplayState> {
        self.state.clone()
    }

    fn stats(&self) -> ViewStats {
        self.stats.clone()
    }
}
