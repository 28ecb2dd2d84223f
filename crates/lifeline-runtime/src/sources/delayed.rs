#![forbid(unsafe_code)]

//! One-shot delayed result.

use crate::source::Source;
use lifeline_core::EventQueue;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// Resolve once, `delay` after subscribing, then terminate.
///
/// `resolve` runs inside the queued task, not at subscribe time. `Ok` is
/// delivered as one value followed by completion; `Err` as one error.
/// Exactly one of the two happens unless the subscription is cancelled
/// first, in which case neither does and `resolve` is never called.
pub fn delayed<T, E, F>(queue: &EventQueue, delay: Duration, resolve: F) -> Source<T, E>
where
    T: 'static,
    E: fmt::Debug + 'static,
    F: Fn() -> Result<T, E> + 'static,
{
    let queue = queue.clone();
    let resolve = Rc::new(resolve);
    Source::new(move |subscriber| {
        let resolve = Rc::clone(&resolve);
        let target = subscriber.clone();
        let id = queue.schedule(delay, move || {
            if target.is_closed() {
                return;
            }
            match resolve() {
                Ok(value) => {
                    target.next(value);
                    target.complete();
                }
                Err(err) => target.error(err),
            }
        });
        let queue = queue.clone();
        subscriber.add_teardown(move || {
            queue.cancel(id);
        });
    })
}
