//! FIFO of procedures suspended on one lockable entity's lock.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::procedure::Procedure;

/// Suspended procedures waiting for a single entity's lock to become
/// available.
///
/// Kept deliberately separate from an `EntityQueue`'s runnable FIFO
/// (spec §9 "Event queues vs runnable queues"): runnable order is
/// dispatched by the `FairQueue` and is independent of wake order, which is
/// always FIFO here.
#[derive(Debug, Default)]
pub struct EventWaitQueue {
    waiters: VecDeque<Arc<dyn Procedure>>,
}

impl EventWaitQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend a procedure on this event.
    pub fn suspend(&mut self, proc: Arc<dyn Procedure>) {
        self.waiters.push_back(proc);
    }

    /// Whether any procedure is suspended here.
    #[must_use]
    pub fn has_waiters(&self) -> bool {
        !self.waiters.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Pop exactly one waiter, in FIFO order. Used by exclusive-lock
    /// release paths, which grant at most one successor per transition.
    pub fn pop_one(&mut self) -> Option<Arc<dyn Procedure>> {
        self.waiters.pop_front()
    }

    /// Drain every waiter, in FIFO order. Used by shared-lock release
    /// paths, which can wake every suspended reader at once.
    pub fn drain_all(&mut self) -> Vec<Arc<dyn Procedure>> {
        self.waiters.drain(..).collect()
    }

    /// Remove a specific procedure from this wait queue, e.g. on Executor
    /// cancellation. O(queue) as required by spec §5.
    pub fn remove(&mut self, proc_id: crate::procedure::ProcId) -> Option<Arc<dyn Procedure>> {
        let index = self.waiters.iter().position(|p| p.proc_id() == proc_id)?;
        self.waiters.remove(index)
    }
}
