//! Round-robin dispatch over currently-runnable `EntityQueue`s, weighted by
//! priority.
//!
//! Priority is expressed as the number of consecutive dispatches a queue
//! gets before rotation, not as preemption (spec §4.4). A queue is a member
//! of this structure iff it has at least one dispatchable procedure and is
//! not parked for exclusive-lock execution — maintaining that invariant is
//! the caller's (the `Scheduler`'s) responsibility; `FairQueue` itself just
//! tracks membership and rotation order.

use std::collections::VecDeque;

/// One entry in the rotation: an opaque queue handle plus the quantum it
/// was granted when it last became the cursor.
#[derive(Debug, Clone, Copy)]
struct Member<H> {
    handle: H,
    priority: u32,
}

/// Circular round-robin list of queue handles, substituting a `VecDeque`
/// (front = cursor) for the source's intrusive doubly-linked list — the
/// same index-handle substitution used throughout this crate (see
/// `arena.rs`).
#[derive(Debug)]
pub struct FairQueue<H> {
    members: VecDeque<Member<H>>,
    /// Dispatches remaining for the current cursor before it rotates.
    current_quantum: u32,
}

impl<H: Copy + Eq> Default for FairQueue<H> {
    fn default() -> Self {
        Self {
            members: VecDeque::new(),
            current_quantum: 0,
        }
    }
}

impl<H: Copy + Eq> FairQueue<H> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queues currently linked into the rotation.
    #[must_use]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn contains(&self, handle: H) -> bool {
        self.members.iter().any(|m| m.handle == handle)
    }

    /// Link `handle` into the rotation with the given priority. A no-op if
    /// already linked (re-linking an already-linked queue must not reset
    /// its position or quantum).
    pub fn add(&mut self, handle: H, priority: u32) {
        if self.contains(handle) {
            return;
        }
        let was_empty = self.members.is_empty();
        self.members.push_back(Member { handle, priority });
        if was_empty {
            self.current_quantum = priority.max(1);
        }
    }

    /// Unlink `handle` from the rotation, if present. If it was the
    /// cursor, the cursor advances to the next member first.
    pub fn remove(&mut self, handle: H) -> bool {
        let Some(index) = self.members.iter().position(|m| m.handle == handle) else {
            return false;
        };
        self.members.remove(index);
        if index == 0 {
            self.current_quantum = self.members.front().map_or(0, |m| m.priority.max(1));
        }
        true
    }

    /// Advance the cursor to the next member, resetting the quantum to the
    /// new cursor's priority.
    fn rotate(&mut self) {
        if let Some(member) = self.members.pop_front() {
            self.members.push_back(member);
        }
        self.current_quantum = self.members.front().map_or(0, |m| m.priority.max(1));
    }

    /// Select the next dispatchable handle.
    ///
    /// `is_available` tells whether the given handle's head procedure can
    /// actually run right now (spec's `isAvailable`). If the cursor is not
    /// available, rotate until a runnable queue is found or the rotation
    /// comes full circle (`None`). Skipping a queue this way resets its
    /// quantum when it next becomes the cursor; only a *successful*
    /// dispatch decrements the current quantum.
    pub fn poll(&mut self, is_available: impl Fn(H) -> bool) -> Option<H> {
        if self.members.is_empty() {
            return None;
        }
        let start = self.members.front().unwrap().handle;
        loop {
            let front = *self.members.front().unwrap();
            if is_available(front.handle) {
                if self.current_quantum == 0 {
                    self.current_quantum = front.priority.max(1);
                }
                self.current_quantum -= 1;
                if self.current_quantum == 0 {
                    self.rotate();
                }
                return Some(front.handle);
            }

            self.rotate();
            if self.members.front().map(|m| m.handle) == Some(start) {
                return None;
            }
        }
    }
}
