//! Deferred tasks with generation-based cancellation.
//!
//! A [`Deferred`] slot holds at most one scheduled task. Scheduling a new
//! task bumps the generation, so any [`TaskToken`] handed out earlier is
//! stale and will never fire. The host drives time by calling
//! [`Deferred::fire_if_due`] from its event loop (timer callback,
//! animation frame, or the async driver).
//!
//! ```text
//!  schedule() ──► gen 1, deadline t0+500ms
//!  schedule() ──► gen 2, deadline t1+500ms   (gen 1 token now stale)
//!  cancel()   ──► gen 3, no deadline          (gen 2 token now stale)
//! ```

use std::time::{Duration, Instant};

/// Handle to one scheduled run of a [`Deferred`] slot. Compare it with
/// the token [`Deferred::fire_if_due`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskToken {
    generation: u64,
}

/// A single cancellable deferred task.
#[derive(Debug, Clone, Default)]
pub struct Deferred {
    generation: u64,
    deadline: Option<Instant>,
}

impl Deferred {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the task to run `delay` after `now`, superseding any
    /// pending run.
    pub fn schedule(&mut self, now: Instant, delay: Duration) -> TaskToken {
        self.generation += 1;
        self.deadline = Some(now + delay);
        TaskToken {
            generation: self.generation,
        }
    }

    /// Cancel the pending run, if any. Outstanding tokens become stale.
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.deadline.take().is_some();
        self.generation += 1;
        was_pending
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the pending run if its deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> Option<TaskToken> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(TaskToken {
                    generation: self.generation,
                })
            }
            _ => None,
        }
    }
}
