//! Single-slot debounce scheduling.
//!
//! A `DebounceSlot` holds at most one pending task. Scheduling again
//! replaces the task (last-write-wins) and pushes the deadline out by the
//! debounce window, but never past `max_wait` from when the burst started.
//! Time is always passed in, so callers decide whether it is real.

use std::time::{Duration, Instant};

#[derive(Debug)]
struct Pending<T> {
    task: T,
    first_scheduled: Instant,
    deadline: Instant,
}

/// One pending task with a trailing-debounce deadline
#[derive(Debug)]
pub struct DebounceSlot<T> {
    delay: Duration,
    max_wait: Duration,
    pending: Option<Pending<T>>,
}

impl<T> DebounceSlot<T> {
    pub fn new(delay: Duration, max_wait: Duration) -> Self {
        Self {
            delay,
            max_wait: max_wait.max(delay),
            pending: None,
        }
    }

    /// Replace the pending task and recompute its deadline
    pub fn schedule(&mut self, now: Instant, task: T) {
        let first_scheduled = self
            .pending
            .as_ref()
            .map(|p| p.first_scheduled)
            .unwrap_or(now);
        let deadline = (now + self.delay).min(first_scheduled + self.max_wait);
        self.pending = Some(Pending {
            task,
            first_scheduled,
            deadline,
        });
    }

    /// Take the task if its deadline has passed
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some(p) if p.deadline <= now => self.take(),
            _ => None,
        }
    }

    /// Take the task regardless of its deadline
    pub fn take(&mut self) -> Option<T> {
        self.pending.take().map(|p| p.task)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
