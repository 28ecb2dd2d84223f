#![forbid(unsafe_code)]

//! Single-threaded cooperative event queue with a virtual clock.
//!
//! # Design
//!
//! [`EventQueue`] keeps pending tasks in a `BTreeMap` keyed by
//! `(due, seq)`. The sequence number breaks ties, so tasks with the same due
//! time run in the order they were scheduled. Time only moves when the owner
//! calls [`EventQueue::advance`] (or one of the run helpers), which keeps
//! every test fully deterministic.
//!
//! # Invariants
//!
//! 1. Tasks run in `(due, seq)` order.
//! 2. `now()` never decreases.
//! 3. No internal borrow is held while a task runs, so tasks may schedule or
//!    cancel other tasks (including themselves).
//! 4. A cancelled task never runs.
//!
//! # Failure Modes
//!
//! - **Self-rescheduling at zero delay**: a task that always re-posts itself
//!   keeps `advance` busy forever. Periodic producers must use a positive
//!   period; `run_until_idle` takes an explicit task limit for this reason.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

type Task = Box<dyn FnOnce()>;

/// Handle to a scheduled task, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId {
    due: Duration,
    seq: u64,
}

impl TimerId {
    /// Virtual time at which the task is due.
    #[must_use]
    pub fn due(&self) -> Duration {
        self.due
    }
}

struct QueueInner {
    now: Duration,
    next_seq: u64,
    tasks: BTreeMap<TimerId, Task>,
    executed: u64,
}

/// Cooperative event queue. Cloning shares the same queue.
pub struct EventQueue {
    inner: Rc<RefCell<QueueInner>>,
}

impl Clone for EventQueue {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventQueue")
            .field("now", &inner.now)
            .field("pending", &inner.tasks.len())
            .field("executed", &inner.executed)
            .finish()
    }
}

impl EventQueue {
    /// Create an empty queue with the clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(QueueInner {
                now: Duration::ZERO,
                next_seq: 0,
                tasks: BTreeMap::new(),
                executed: 0,
            })),
        }
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.borrow().tasks.len()
    }

    /// Total number of tasks run since creation.
    #[must_use]
    pub fn executed(&self) -> u64 {
        self.inner.borrow().executed
    }

    /// Due time of the earliest pending task.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.inner.borrow().tasks.keys().next().map(TimerId::due)
    }

    /// Schedule `task` to run `delay` after the current time.
    pub fn schedule(&self, delay: Duration, task: impl FnOnce() + 'static) -> TimerId {
        let due = self.now().saturating_add(delay);
        self.schedule_at(due, task)
    }

    /// Schedule `task` at an absolute virtual time.
    ///
    /// A due time in the past is clamped to `now()`, so the task runs on the
    /// next turn of the queue rather than retroactively.
    pub fn schedule_at(&self, due: Duration, task: impl FnOnce() + 'static) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let due = due.max(inner.now);
        let id = TimerId {
            due,
            seq: inner.next_seq,
        };
        inner.next_seq += 1;
        inner.tasks.insert(id, Box::new(task));
        #[cfg(feature = "tracing")]
        tracing::trace!(
            due_ms = u64::try_from(due.as_millis()).unwrap_or(u64::MAX),
            seq = id.seq,
            "task scheduled"
        );
        id
    }

    /// Queue `task` for the next turn without advancing time.
    pub fn post(&self, task: impl FnOnce() + 'static) -> TimerId {
        self.schedule(Duration::ZERO, task)
    }

    /// Cancel a pending task. Returns `false` if it already ran or was
    /// cancelled before.
    pub fn cancel(&self, id: TimerId) -> bool {
        let removed = self.inner.borrow_mut().tasks.remove(&id).is_some();
        #[cfg(feature = "tracing")]
        {
            if removed {
                tracing::trace!(seq = id.seq, "task cancelled");
            }
        }
        removed
    }

    /// True if the task is still waiting to run.
    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.inner.borrow().tasks.contains_key(&id)
    }

    /// Advance the clock by `by`, running every task that falls due inside
    /// the window. Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now().saturating_add(by);
        self.advance_to(target)
    }

    /// Advance the clock to `target`, running due tasks in order.
    pub fn advance_to(&self, target: Duration) -> usize {
        let mut ran = 0;
        while let Some(task) = self.pop_due(target) {
            task();
            ran += 1;
        }
        let mut inner = self.inner.borrow_mut();
        if target > inner.now {
            inner.now = target;
        }
        ran
    }

    /// Run the earliest pending task, jumping the clock to its due time.
    /// Returns `false` if the queue is empty.
    pub fn run_next(&self) -> bool {
        let Some(due) = self.next_due() else {
            return false;
        };
        match self.pop_due(due) {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty or `limit` tasks have run.
    /// Returns the number of tasks run.
    pub fn run_until_idle(&self, limit: usize) -> usize {
        let mut ran = 0;
        while ran < limit && self.run_next() {
            ran += 1;
        }
        ran
    }

    /// Remove every pending task without running it.
    pub fn clear(&self) -> usize {
        let tasks = std::mem::take(&mut self.inner.borrow_mut().tasks);
        tasks.len()
    }

    fn pop_due(&self, target: Duration) -> Option<Task> {
        let mut inner = self.inner.borrow_mut();
        let id = *inner.tasks.keys().next()?;
        if id.due > target {
            return None;
        }
        let task = inner.tasks.remove(&id)?;
        inner.now = inner.now.max(id.due);
        inner.executed += 1;
        Some(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn starts_empty_at_zero() {
        let queue = EventQueue::new();
        assert_eq!(queue.now(), Duration::ZERO);
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.next_due(), None);
    }

    #[test]
    fn schedule_does_not_run_synchronously() {
        let queue = EventQueue::new();
        let ran = Rc::new(Cell::new(false));
        let ran_clone = Rc::clone(&ran);
        queue.post(move || ran_clone.set(true));
        assert!(!ran.get());
        assert_eq!(queue.advance(Duration::ZERO), 1);
        assert!(ran.get());
    }

    #[test]
    fn runs_in_due_order() {
        let queue = EventQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (delay, tag) in [(30, 'c'), (10, 'a'), (20, 'b')] {
            let log = Rc::clone(&log);
            queue.schedule(ms(delay), move || log.borrow_mut().push(tag));
        }
        queue.advance(ms(100));
        assert_eq!(*log.borrow(), vec!['a', 'b', 'c']);
    }

    #[test]
    fn ties_run_fifo() {
        let queue = EventQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in 0..5 {
            let log = Rc::clone(&log);
            queue.schedule(ms(10), move || log.borrow_mut().push(tag));
        }
        queue.advance(ms(10));
        assert_eq!(*log.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn clock_moves_to_task_due_time() {
        let queue = EventQueue::new();
        let seen = Rc::new(Cell::new(Duration::ZERO));
        let seen_clone = Rc::clone(&seen);
        let q = queue.clone();
        queue.schedule(ms(250), move || seen_clone.set(q.now()));
        queue.advance(ms(1000));
        assert_eq!(seen.get(), ms(250));
        assert_eq!(queue.now(), ms(1000));
    }

    #[test]
    fn advance_stops_at_window_end() {
        let queue = EventQueue::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        queue.schedule(ms(500), move || c.set(c.get() + 1));
        assert_eq!(queue.advance(ms(499)), 0);
        assert_eq!(count.get(), 0);
        assert_eq!(queue.advance(ms(1)), 1);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn cancel_prevents_run_and_is_idempotent() {
        let queue = EventQueue::new();
        let ran = Rc::new(Cell::new(false));
        let ran_clone = Rc::clone(&ran);
        let id = queue.schedule(ms(5), move || ran_clone.set(true));
        assert!(queue.is_pending(id));
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        queue.advance(ms(10));
        assert!(!ran.get());
    }

    #[test]
    fn tasks_can_schedule_within_window() {
        let queue = EventQueue::new();
        let count = Rc::new(Cell::new(0));
        let q = queue.clone();
        let c = Rc::clone(&count);
        queue.schedule(ms(10), move || {
            c.set(c.get() + 1);
            let c2 = Rc::clone(&c);
            q.schedule(ms(10), move || c2.set(c2.get() + 1));
        });
        assert_eq!(queue.advance(ms(20)), 2);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn task_scheduled_past_window_waits() {
        let queue = EventQueue::new();
        let q = queue.clone();
        queue.schedule(ms(10), move || {
            q.schedule(ms(100), || {});
        });
        queue.advance(ms(50));
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.next_due(), Some(ms(110)));
    }

    #[test]
    fn schedule_at_past_is_clamped() {
        let queue = EventQueue::new();
        queue.advance(ms(100));
        let id = queue.schedule_at(ms(10), || {});
        assert_eq!(id.due(), ms(100));
    }

    #[test]
    fn run_until_idle_respects_limit() {
        let queue = EventQueue::new();
        for i in 0..10 {
            queue.schedule(ms(i), || {});
        }
        assert_eq!(queue.run_until_idle(4), 4);
        assert_eq!(queue.pending(), 6);
        assert_eq!(queue.run_until_idle(usize::MAX), 6);
        assert_eq!(queue.now(), ms(9));
        assert_eq!(queue.executed(), 10);
    }

    #[test]
    fn clear_drops_pending() {
        let queue = EventQueue::new();
        queue.schedule(ms(1), || {});
        queue.schedule(ms(2), || {});
        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn clear_releases_tasks_holding_the_queue() {
        struct Flag(Rc<Cell<bool>>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let queue = EventQueue::new();
        let dropped = Rc::new(Cell::new(false));
        let flag = Flag(Rc::clone(&dropped));
        let handle = queue.clone();
        queue.schedule(ms(1000), move || {
            let _ = (&handle, &flag);
        });
        assert_eq!(queue.clear(), 1);
        assert!(dropped.get());
    }

    #[test]
    fn far_future_due_is_kept() {
        let queue = EventQueue::new();
        let id = queue.schedule_at(Duration::MAX, || {});
        assert_eq!(queue.next_due(), Some(Duration::MAX));
        assert_eq!(queue.advance(ms(1000)), 0);
        assert!(queue.is_pending(id));
    }

    #[test]
    fn debug_format() {
        let queue = EventQueue::new();
        let dbg = format!("{queue:?}");
        assert!(dbg.contains("EventQueue"));
        assert!(dbg.contains("pending"));
    }
}
