#![forbid(unsafe_code)]

//! Periodic tick source.

use crate::source::Source;
use crate::subscriber::Subscriber;
use lifeline_core::{EventQueue, TimerId};
use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;
use std::time::Duration;

/// Smallest accepted period. Shorter periods are clamped up to it so a tick
/// can never starve the queue.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Emit `0, 1, 2, ...` every `period`, first tick one period after
/// subscribing. Never completes; only cancellation stops it.
pub fn interval(queue: &EventQueue, period: Duration) -> Source<u64, Infallible> {
    let queue = queue.clone();
    let period = period.max(MIN_PERIOD);
    Source::new(move |subscriber| {
        let timer = Rc::new(TickTimer {
            queue: queue.clone(),
            period,
            pending: Cell::new(None),
        });
        arm(&timer, subscriber.clone(), 0);
        subscriber.add_teardown(move || timer.disarm());
    })
}

struct TickTimer {
    queue: EventQueue,
    period: Duration,
    pending: Cell<Option<TimerId>>,
}

impl TickTimer {
    fn disarm(&self) {
        if let Some(id) = self.pending.take() {
            self.queue.cancel(id);
        }
    }
}

/// Schedule tick `n`. The next tick is armed only after `n` was delivered,
/// which keeps ticks strictly ordered.
fn arm(timer: &Rc<TickTimer>, subscriber: Subscriber<u64, Infallible>, n: u64) {
    let next = Rc::clone(timer);
    let id = timer.queue.schedule(timer.period, move || {
        next.pending.set(None);
        if subscriber.is_closed() {
            return;
        }
        subscriber.next(n);
        if !subscriber.is_closed() {
            arm(&next, subscriber, n + 1);
        }
    });
    timer.pending.set(Some(id));
}
