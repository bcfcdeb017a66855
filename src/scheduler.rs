//! The scheduler collaborator: runs a task at a future time. The core only
//! uses it for token expiry; everything else in a login flow is a short
//! chain of suspensions with no time-driven behavior.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

/// Invokes a task once `delay` has elapsed. Implementations may run the task
/// on any thread; tasks must be self-contained.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: ScheduledTask);
}

/// Production scheduler: one spawned tokio task per scheduled invalidation.
pub struct TokioScheduler;

impl TokioScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(TokioScheduler)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

/// Deterministic scheduler driven by hand. Tasks fire when [`advance`]
/// moves the logical clock past their due time, in due-time order.
/// Used by tests and single-threaded embeddings that own their clock.
///
/// [`advance`]: ManualScheduler::advance
pub struct ManualScheduler {
    inner: Mutex<ManualInner>,
}

struct ManualInner {
    now: Duration,
    tasks: Vec<(Duration, ScheduledTask)>,
}

impl ManualScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(ManualScheduler {
            inner: Mutex::new(ManualInner { now: Duration::ZERO, tasks: Vec::new() }),
        })
    }

    /// Moves the logical clock forward and runs every task that came due.
    pub fn advance(&self, dt: Duration) {
        let due = {
            let mut inner = self.inner.lock();
            inner.now += dt;
            let now = inner.now;
            let mut due: Vec<(Duration, ScheduledTask)> = Vec::new();
            let mut remaining = Vec::new();
            for entry in inner.tasks.drain(..) {
                if entry.0 <= now {
                    due.push(entry);
                } else {
                    remaining.push(entry);
                }
            }
            inner.tasks = remaining;
            due.sort_by_key(|(at, _)| *at);
            due
        };
        // run outside the guard: a task may schedule follow-ups
        for (_, task) in due {
            task();
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().tasks.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) {
        let mut inner = self.inner.lock();
        let at = inner.now + delay;
        inner.tasks.push((at, task));
    }
}
