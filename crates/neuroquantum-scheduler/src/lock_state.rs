//! Per-entity reader/writer lock state with parent-procedure inheritance.

use crate::procedure::ProcId;

/// Reader/writer lock for a single lockable entity (table, server,
/// namespace, or region).
///
/// Invariant: `exclusive_owner.is_some() => shared_count == 0`. All methods
/// are O(1) and are only ever called while the scheduler holds `schedLock`
/// (see `neuroquantum_scheduler::scheduler`'s module docs), so no internal
/// synchronization is needed here.
#[derive(Debug, Default, Clone, Copy)]
pub struct LockState {
    exclusive_owner: Option<ProcId>,
    shared_count: u32,
}

impl LockState {
    /// A fresh, unlocked state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the entity currently has an exclusive owner.
    #[must_use]
    pub fn is_exclusively_locked(&self) -> bool {
        self.exclusive_owner.is_some()
    }

    /// The current exclusive owner, if any.
    #[must_use]
    pub fn exclusive_owner(&self) -> Option<ProcId> {
        self.exclusive_owner
    }

    /// Current shared-lock count.
    #[must_use]
    pub fn shared_count(&self) -> u32 {
        self.shared_count
    }

    /// Attempt to take a shared lock. Succeeds iff there is no exclusive
    /// owner.
    pub fn try_shared_lock(&mut self) -> bool {
        if self.exclusive_owner.is_some() {
            return false;
        }
        self.shared_count += 1;
        true
    }

    /// Release a shared lock previously granted by `try_shared_lock`.
    ///
    /// Returns `true` iff the count reached zero — callers use this to
    /// decide whether to re-link the queue into its `FairQueue` or drain an
    /// `EventWaitQueue`.
    pub fn release_shared_lock(&mut self) -> bool {
        debug_assert!(self.shared_count > 0, "releasing a shared lock nobody holds");
        self.shared_count = self.shared_count.saturating_sub(1);
        self.shared_count == 0
    }

    /// Attempt to take the exclusive lock for `proc_id`, given its parent
    /// and root procedure ids for inheritance checks.
    ///
    /// If the entity is already locked — exclusively, or shared by one or
    /// more readers — this does **not** change the owner; it returns
    /// whether `proc_id` has lock access through parent/root inheritance
    /// (spec §4.1). A shared hold has no single owner to inherit through,
    /// so it always refuses (even a child of the procedure that took the
    /// shared lock gets `false` here). Otherwise `proc_id` becomes the new
    /// owner and this returns `true`. Never grants while `shared_count > 0`:
    /// doing so would violate `exclusive != NONE => shared == 0`.
    pub fn try_exclusive_lock(
        &mut self,
        proc_id: ProcId,
        parent_proc_id: Option<ProcId>,
        root_proc_id: Option<ProcId>,
    ) -> bool {
        match self.exclusive_owner {
            Some(owner) => has_lock_access(owner, proc_id, parent_proc_id, root_proc_id),
            None if self.shared_count > 0 => false,
            None => {
                self.exclusive_owner = Some(proc_id);
                true
            }
        }
    }

    /// Release the exclusive lock iff `proc_id` is the *direct* owner.
    ///
    /// Returns `true` if the owner was cleared. A call from a child
    /// procedure that only inherited the lock through its parent returns
    /// `false` and leaves the owner untouched — releasing "its" lock must
    /// never clear the parent's exclusive lock. This is the
    /// `TransientNotHeld` outcome from spec §7: not an error, but
    /// observable.
    pub fn release_exclusive_lock(&mut self, proc_id: ProcId) -> bool {
        if self.exclusive_owner == Some(proc_id) {
            self.exclusive_owner = None;
            true
        } else {
            false
        }
    }

    /// Whether `proc_id` has lock access: it is the owner, or its parent
    /// or root procedure is the owner. Checked transitively only through
    /// the root, never through an arbitrary ancestor chain.
    #[must_use]
    pub fn has_lock_access(
        &self,
        proc_id: ProcId,
        parent_proc_id: Option<ProcId>,
        root_proc_id: Option<ProcId>,
    ) -> bool {
        match self.exclusive_owner {
            Some(owner) => has_lock_access(owner, proc_id, parent_proc_id, root_proc_id),
            None => false,
        }
    }

    /// Whether `proc_id`'s parent or root is the current owner (used by
    /// `waitRegion(s)` to decide whether a child can skip re-acquiring the
    /// table lock its parent already holds).
    #[must_use]
    pub fn has_parent_lock(&self, parent_proc_id: Option<ProcId>, root_proc_id: Option<ProcId>) -> bool {
        match self.exclusive_owner {
            Some(owner) => Some(owner) == parent_proc_id || Some(owner) == root_proc_id,
            None => false,
        }
    }
}

fn has_lock_access(
    owner: ProcId,
    proc_id: ProcId,
    parent_proc_id: Option<ProcId>,
    root_proc_id: Option<ProcId>,
) -> bool {
    owner == proc_id || Some(owner) == parent_proc_id || Some(owner) == root_proc_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_excludes_shared() {
        let mut lock = LockState::new();
        assert!(lock.try_exclusive_lock(1, None, None));
        assert!(!lock.try_shared_lock());
        assert_eq!(lock.shared_count(), 0);
    }

    #[test]
    fn shared_excludes_exclusive() {
        let mut lock = LockState::new();
        assert!(lock.try_shared_lock());
        assert!(lock.try_shared_lock());
        assert!(!lock.try_exclusive_lock(1, None, None));
        assert_eq!(lock.exclusive_owner(), None);
    }

    #[test]
    fn shared_hold_refuses_exclusive_even_for_a_child_of_the_reader() {
        let mut lock = LockState::new();
        // Proc 1 takes a shared (reader) lock; no exclusive owner exists.
        assert!(lock.try_shared_lock());
        // A child of proc 1 has nothing to inherit: a shared hold has no
        // single owner, so this must still refuse, not silently grant
        // ownership (which would violate exclusive != NONE => shared == 0).
        assert!(!lock.try_exclusive_lock(2, Some(1), Some(1)));
        assert_eq!(lock.exclusive_owner(), None);
        assert_eq!(lock.shared_count(), 1);
    }

    #[test]
    fn second_exclusive_request_checks_inheritance_without_changing_owner() {
        let mut lock = LockState::new();
        assert!(lock.try_exclusive_lock(1, None, None));
        // Unrelated procedure: no access, owner untouched.
        assert!(!lock.try_exclusive_lock(2, None, None));
        assert_eq!(lock.exclusive_owner(), Some(1));
        // Child of the owner: has access, owner still untouched.
        assert!(lock.try_exclusive_lock(3, Some(1), Some(1)));
        assert_eq!(lock.exclusive_owner(), Some(1));
    }

    #[test]
    fn child_release_does_not_clear_parent_owner() {
        let mut lock = LockState::new();
        lock.try_exclusive_lock(1, None, None);
        // Child "releasing" does nothing to the parent's lock.
        assert!(!lock.release_exclusive_lock(3));
        assert_eq!(lock.exclusive_owner(), Some(1));
        // The actual owner can release it.
        assert!(lock.release_exclusive_lock(1));
        assert_eq!(lock.exclusive_owner(), None);
    }

    #[test]
    fn root_inheritance_not_just_direct_parent() {
        let mut lock = LockState::new();
        lock.try_exclusive_lock(1, None, None);
        // Grandchild: parent is proc 5 (unrelated), but root is 1.
        assert!(lock.has_lock_access(9, Some(5), Some(1)));
        // Neither parent nor root matches: no access.
        assert!(!lock.has_lock_access(9, Some(5), Some(6)));
    }
}
