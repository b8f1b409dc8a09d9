//! Deferred task queue with cancellable handles.
//!
//! The queue never reads a clock or spawns a thread: the owner passes the
//! current time in and collects whatever became due. This keeps debounce and
//! sweep timing deterministic under test.

use crate::types::Timestamp;
use std::collections::BTreeMap;
use std::time::Duration;

/// Handle to a scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

/// Time-ordered queue of pending tasks.
#[derive(Debug)]
pub struct Scheduler<T> {
    /// Keyed by (due time, handle) so equal deadlines fire in scheduling order.
    queue: BTreeMap<(Timestamp, TimerHandle), T>,
    /// Due time of each live handle.
    due: BTreeMap<TimerHandle, Timestamp>,
    next_handle: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            queue: BTreeMap::new(),
            due: BTreeMap::new(),
            next_handle: 1,
        }
    }

    /// Schedule `task` to become due `delay` after `now`.
    pub fn schedule(&mut self, now: Timestamp, delay: Duration, task: T) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;

        let at = now.after(delay);
        self.queue.insert((at, handle), task);
        self.due.insert(handle, at);
        handle
    }

    /// Drop a pending task. Returns the task if it had not fired yet.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<T> {
        let at = self.due.remove(&handle)?;
        self.queue.remove(&(at, handle))
    }

    /// Whether `handle` is scheduled and has not fired or been cancelled.
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.due.contains_key(&handle)
    }

    /// Remove and return every task due at or before `now`, earliest first.
    pub fn drain_due(&mut self, now: Timestamp) -> Vec<T> {
        let mut fired = Vec::new();

        while let Some(entry) = self.queue.first_entry() {
            let (at, handle) = *entry.key();
            if at > now {
                break;
            }
            fired.push(entry.remove());
            self.due.remove(&handle);
        }

        fired
    }

    /// Earliest pending deadline.
    pub fn next_due(&self) -> Option<Timestamp> {
        self.queue.keys().next().map(|(at, _)| *at)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
