#![forbid(unsafe_code)]

//! Callback bundle handed to [`Source::subscribe`](crate::Source::subscribe).

use std::fmt;

type NextFn<T> = Box<dyn FnMut(T)>;
type ErrorFn<E> = Box<dyn FnMut(E)>;
type CompleteFn = Box<dyn FnMut()>;

/// Value, error and completion callbacks for one subscription.
///
/// Only the value callback is mandatory. An error that arrives without an
/// error callback is logged at `warn` level and otherwise dropped; it never
/// panics the host.
pub struct Observer<T, E> {
    next: NextFn<T>,
    error: Option<ErrorFn<E>>,
    complete: Option<CompleteFn>,
}

impl<T, E> fmt::Debug for Observer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("on_error", &self.error.is_some())
            .field("on_complete", &self.complete.is_some())
            .finish_non_exhaustive()
    }
}

impl<T, E: fmt::Debug> Observer<T, E> {
    /// Observer with a value callback only.
    pub fn new(next: impl FnMut(T) + 'static) -> Self {
        Self {
            next: Box::new(next),
            error: None,
            complete: None,
        }
    }

    /// Set the error callback.
    #[must_use]
    pub fn on_error(mut self, error: impl FnMut(E) + 'static) -> Self {
        self.error = Some(Box::new(error));
        self
    }

    /// Set the completion callback.
    #[must_use]
    pub fn on_complete(mut self, complete: impl FnMut() + 'static) -> Self {
        self.complete = Some(Box::new(complete));
        self
    }

    pub(crate) fn deliver_next(&mut self, value: T) {
        (self.next)(value);
    }

    pub(crate) fn deliver_error(&mut self, err: E) {
        match self.error.as_mut() {
            Some(on_error) => on_error(err),
            None => tracing::warn!(error = ?err, "unhandled source error"),
        }
    }

    pub(crate) fn deliver_complete(&mut self) {
        if let Some(on_complete) = self.complete.as_mut() {
            on_complete();
        }
    }
}
