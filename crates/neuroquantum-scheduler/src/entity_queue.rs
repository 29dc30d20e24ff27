//! Lockable entities and the runnable FIFOs bound to them.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::arena::arena_id;
use crate::error::{SchedulerError, SchedulerResult};
use crate::event_queue::EventWaitQueue;
use crate::keyed_index::ShardedId;
use crate::lock_state::LockState;
use crate::procedure::{
    EncodedRegionName, NamespaceName, Procedure, ServerName, ServerOperationType, TableName,
    TableOperationType, NAMESPACE_SYSTEM_TABLE,
};

arena_id!(
    /// Stable handle into the table `KeyedIndex`'s arena.
    TableQueueId
);
arena_id!(
    /// Stable handle into the namespace `KeyedIndex`'s arena.
    NamespaceQueueId
);

/// Stable handle into a server bucket's arena. A server's `ShardedId` is
/// bucket-qualified, so `ShardedKeyedIndex::get`/`get_mut` never need the
/// server name back — only the `FairQueue` handle.
pub type ServerQueueId = ShardedId;

/// FIFO of runnable procedures bound to one `EntityQueue`, with an explicit
/// front-push for yielded and child procedures (spec §4.2 `add`).
#[derive(Debug, Default)]
pub struct RunnableFifo {
    items: VecDeque<Arc<dyn Procedure>>,
}

impl RunnableFifo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a procedure. `front = true` is required for yielded procedures
    /// and for children inheriting a parent's exclusive lock — the child
    /// must run before other siblings.
    pub fn add(&mut self, proc: Arc<dyn Procedure>, front: bool) {
        if front {
            self.items.push_front(proc);
        } else {
            self.items.push_back(proc);
        }
    }

    #[must_use]
    pub fn peek_front(&self) -> Option<&Arc<dyn Procedure>> {
        self.items.front()
    }

    pub fn pop_front(&mut self) -> Option<Arc<dyn Procedure>> {
        self.items.pop_front()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Lightweight lock-state plus wait queue for a single region, keyed by
/// encoded region name inside its `TableQueue`. Its only lock mode is
/// exclusive: region-level reads ride on the table's shared lock, so there
/// is nothing for a region-level shared lock to add.
#[derive(Debug, Default)]
pub struct RegionEvent {
    pub lock: LockState,
    pub event: EventWaitQueue,
}

impl RegionEvent {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this region has no holder and no waiters — the condition
    /// under which it is dropped from its `TableQueue`'s region map.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        !self.lock.is_exclusively_locked() && self.event.is_empty()
    }
}

/// Classifies whether the head of a table's FIFO needs the table's
/// exclusive lock before it can run (spec §4.2).
pub(crate) fn table_requires_exclusive_lock(
    table: &TableName,
    op: TableOperationType,
) -> SchedulerResult<bool> {
    use TableOperationType::{
        Assign, Create, Delete, Disable, Edit, Enable, Merge, Read, RegionEdit, Split, Unassign,
    };
    match op {
        Create | Delete | Disable | Enable => Ok(true),
        Edit => Ok(table.as_str() != NAMESPACE_SYSTEM_TABLE),
        Read => Ok(false),
        Split | Merge | Assign | Unassign | RegionEdit => Ok(false),
    }
}

/// A lockable table entity and the runnable procedures bound to it.
#[derive(Debug)]
pub struct TableQueue {
    pub key: TableName,
    pub namespace: NamespaceName,
    pub priority: u32,
    pub runnables: RunnableFifo,
    pub lock_state: LockState,
    pub event: EventWaitQueue,
    pub regions: BTreeMap<EncodedRegionName, RegionEvent>,
}

impl TableQueue {
    #[must_use]
    pub fn new(key: TableName, namespace: NamespaceName, priority: u32) -> Self {
        Self {
            key,
            namespace,
            priority,
            runnables: RunnableFifo::new(),
            lock_state: LockState::new(),
            event: EventWaitQueue::new(),
            regions: BTreeMap::new(),
        }
    }

    /// Whether this queue's head can be dispatched: non-empty, the
    /// namespace (passed in by the caller, since it lives in a separate
    /// `KeyedIndex`) holds no exclusive lock, and either the table holds no
    /// exclusive lock or its head procedure has lock access to it.
    #[must_use]
    pub fn is_available(&self, namespace_exclusively_locked: bool) -> bool {
        if self.runnables.is_empty() || namespace_exclusively_locked {
            return false;
        }
        let Some(head) = self.runnables.peek_front() else {
            return false;
        };
        if !self.lock_state.is_exclusively_locked() {
            return true;
        }
        self.lock_state
            .has_lock_access(head.proc_id(), head.parent_proc_id(), head.root_proc_id())
    }

    /// Whether the head procedure of this queue's FIFO requires the table's
    /// exclusive lock to run.
    pub fn head_requires_exclusive_lock(&self) -> SchedulerResult<Option<bool>> {
        let Some(head) = self.runnables.peek_front() else {
            return Ok(None);
        };
        match head.capability() {
            crate::procedure::ProcedureCapability::Table { table, op } => {
                table_requires_exclusive_lock(&table, op).map(Some)
            }
            crate::procedure::ProcedureCapability::Server { .. } => {
                Err(SchedulerError::UnsupportedProcedure(head.proc_id()))
            }
        }
    }
}

/// A lockable server entity (used for crash-recovery procedures).
#[derive(Debug)]
pub struct ServerQueue {
    pub key: ServerName,
    pub priority: u32,
    pub runnables: RunnableFifo,
    pub lock_state: LockState,
    pub event: EventWaitQueue,
}

impl ServerQueue {
    #[must_use]
    pub fn new(key: ServerName, priority: u32) -> Self {
        Self {
            key,
            priority,
            runnables: RunnableFifo::new(),
            lock_state: LockState::new(),
            event: EventWaitQueue::new(),
        }
    }

    /// Server queues ignore namespace locking entirely: available iff not
    /// exclusively locked and not empty.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !self.runnables.is_empty() && !self.lock_state.is_exclusively_locked()
    }

    pub fn head_requires_exclusive_lock(&self) -> SchedulerResult<Option<bool>> {
        let Some(head) = self.runnables.peek_front() else {
            return Ok(None);
        };
        match head.capability() {
            crate::procedure::ProcedureCapability::Server { op, .. } => {
                Ok(Some(matches!(op, ServerOperationType::CrashHandler)))
            }
            crate::procedure::ProcedureCapability::Table { .. } => {
                Err(SchedulerError::UnsupportedProcedure(head.proc_id()))
            }
        }
    }
}

/// A degenerate `EntityQueue` used only for its lock state and event: no
/// runnables FIFO, no dispatch participation. Tables interact with their
/// namespace only through the namespace's shared lock (`waitTableSharedLock`
/// on the namespace system table acquires it).
#[derive(Debug, Default)]
pub struct NamespaceQueue {
    pub lock_state: LockState,
    pub event: EventWaitQueue,
}

impl NamespaceQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestProcedure;

    #[test]
    fn table_queue_unavailable_when_empty() {
        let table = TableQueue::new("t1".into(), "default".into(), 1);
        assert!(!table.is_available(false));
    }

    #[test]
    fn table_queue_unavailable_under_namespace_xlock() {
        let mut table = TableQueue::new("t1".into(), "default".into(), 1);
        table.runnables.add(TestProcedure::table(1, "t1"), false);
        assert!(!table.is_available(true));
    }

    #[test]
    fn table_queue_available_when_xlock_owner_is_head() {
        let mut table = TableQueue::new("t1".into(), "default".into(), 1);
        let proc = TestProcedure::table(1, "t1");
        table.lock_state.try_exclusive_lock(1, None, None);
        table.runnables.add(proc, false);
        assert!(table.is_available(false));
    }

    #[test]
    fn table_queue_unavailable_when_xlock_held_by_other() {
        let mut table = TableQueue::new("t1".into(), "default".into(), 1);
        table.lock_state.try_exclusive_lock(1, None, None);
        table.runnables.add(TestProcedure::table(2, "t1"), false);
        assert!(!table.is_available(false));
    }

    #[test]
    fn namespace_system_table_edit_does_not_require_xlock() {
        assert!(!table_requires_exclusive_lock(
            &TableName::from(NAMESPACE_SYSTEM_TABLE),
            TableOperationType::Edit
        )
        .unwrap());
        assert!(table_requires_exclusive_lock(&TableName::from("user_table"), TableOperationType::Edit)
            .unwrap());
    }

    #[test]
    fn region_rw_ops_do_not_require_table_xlock() {
        for op in [
            TableOperationType::Split,
            TableOperationType::Merge,
            TableOperationType::Assign,
            TableOperationType::Unassign,
            TableOperationType::RegionEdit,
        ] {
            assert!(!table_requires_exclusive_lock(&TableName::from("t1"), op).unwrap());
        }
    }

    #[test]
    fn region_event_quiescent_only_without_holder_or_waiters() {
        let mut region = RegionEvent::new();
        assert!(region.is_quiescent());
        region.lock.try_exclusive_lock(1, None, None);
        assert!(!region.is_quiescent());
        region.lock.release_exclusive_lock(1);
        assert!(region.is_quiescent());
    }
}
