#![forbid(unsafe_code)]

//! User fetch guarded by the view's lifecycle scope.

use crate::user_service::{FetchError, User};
use crate::view::{
    Action, DestructionFlag, DisplayState, FetchDisplay, View, ViewContext, ViewStats, edit_fetch,
};
use lifeline_runtime::{LifecycleScope, Observable, Observer, SubscriptionGuard};
use tracing::{error, info};

const NAME: &str = "good";

pub struct GoodView {
    ctx: ViewContext,
    scope: LifecycleScope,
    state: Observable<DisplayState>,
    destroyed: DestructionFlag,
    stats: ViewStats,
    request: Option<SubscriptionGuard>,
}

impl GoodView {
    #[must_use]
    pub fn new(ctx: ViewContext) -> Self {
        Self {
            ctx,
            scope: LifecycleScope::new(NAME),
            state: Observable::new(DisplayState::Fetch(FetchDisplay::default())),
            destroyed: DestructionFlag::new(),
            stats: ViewStats::new(),
            request: None,
        }
    }

    fn load(&mut self) {
        // A newer request supersedes one still in flight; dropping the
        // guard cancels it.
        if let Some(previous) = self.request.take()
            && !previous.is_closed()
        {
            info!(view = NAME, "superseded request cancelled");
        }

        let user_id = self.state.with(|s| s.as_fetch().map_or(1, |f| f.user_id));
        edit_fetch(&self.state, |f| {
            f.loading = true;
            f.error = None;
        });

        let (state, destroyed, stats) =
            (self.state.clone(), self.destroyed.clone(), self.stats.clone());
        let on_next = move |user: User| {
            if destroyed.is_set() {
                // Unreachable while the guard holds.
                error!(view = NAME, user_id = user.id, "unexpected delivery after destruction");
                stats.record_after_destroy();
                return;
            }
            info!(view = NAME, user_id = user.id, "response received");
            stats.record_accepted();
            edit_fetch(&state, |f| {
                f.user = Some(user);
                f.loading = false;
            });
        };

        let (state, stats) = (self.state.clone(), self.stats.clone());
        let on_error = move |err: FetchError| {
            error!(view = NAME, error = %err, "fetch failed");
            stats.record_error();
            edit_fetch(&state, |f| {
                f.loading = false;
                f.error = Some(err.to_string());
            });
        };

        let request = self
            .ctx
            .service
            .get_user_data(user_id, NAME)
            .bind_until(&self.scope.token())
            .subscribe(Observer::new(on_next).on_error(on_error));
        self.request = Some(request.into_guard());
    }

    fn load_next(&mut self) {
        edit_fetch(&self.state, |f| {
            f.user_id += 1;
            f.user = None;
        });
        self.load();
    }
}

impl View for GoodView {
    fn name(&self) -> &'static str {
        NAME
    }

    fn on_init(&mut self) {
        info!(view = NAME, "view created");
    }

    fn on_destroy(&mut self) {
        self.destroyed.set();
        self.scope.fire();
        info!(view = NAME, "view destroyed; guarded subscriptions closed");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::tests::{context, ms};

    #[test]
    fn response_lands_while_alive() {
        let ctx = context(&[]);
        let queue = ctx.queue.clone();
        let mut view = GoodView::new(ctx);
        view.on_init();
        view.handle(Action::Load);
        queue.advance(ms(3000));
        assert_eq!(view.display().get().as_fetch().unwrap().user.as_ref().map(|u| u.id), Some(1));
        assert_eq!(view.stats().snapshot().accepted, 1);
    }

    #[test]
    fn destroy_cancels_in_flight_request() {
        let ctx = context(&[]);
        let queue = ctx.queue.clone();
        let mut view = GoodView::new(ctx);
        view.handle(Action::Load);
        queue.advance(ms(1000));
        let stats = view.stats();
        let display = view.display();
        view.on_destroy();
        drop(view);

        assert_eq!(queue.pending(), 0);
        queue.advance(ms(5000));
        assert_eq!(stats.snapshot().accepted, 0);
        assert_eq!(stats.snapshot().after_destroy, 0);
        assert!(display.get().as_fetch().unwrap().user.is_none());
    }

    #[test]
    fn newer_load_supersedes_older() {
        let ctx = context(&[]);
        let queue = ctx.queue.clone();
        let mut view = GoodView::new(ctx);
        view.handle(Action::Load);
        queue.advance(ms(1000));
        view.handle(Action::LoadNext);
        assert_eq!(queue.pending(), 1);
        queue.advance(ms(5000));
        assert_eq!(view.stats().snapshot().accepted, 1);
        assert_eq!(view.display().get().as_fetch().unwrap().user.as_ref().map(|u| u.id), Some(2));
    }

    #[test]
    fn error_before_destroy_is_forwarded() {
        let ctx = context(&[1]);
        let queue = ctx.queue.clone();
        let mut view = GoodView::new(ctx);
        view.handle(Action::Load);
        queue.advance(ms(3000));
        assert_eq!(view.stats().snapshot().errors, 1);
        assert!(view.display().get().as_fetch().unwrap().error.is_some());
        view.on_destroy();
        assert_eq!(view.stats().snapshot().errors, 1);
    }
}
