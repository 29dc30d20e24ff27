//! The top-level façade: enqueue, dequeue, yield, lock acquire/release, and
//! completion cleanup.
//!
//! This is Level 6 of `neuroquantum_core::concurrency`'s lock hierarchy — a
//! plain [`std::sync::Mutex`], not `tokio::sync`. The Scheduler is called
//! synchronously from Executor worker threads (never `.await`ed), so there is
//! nothing async to avoid blocking; a blocking mutex plus a co-located
//! [`Condvar`] is the right tool, exactly as that module's guidelines
//! prescribe for synchronous utility code.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::config::SchedulerConfig;
use crate::entity_queue::{
    NamespaceQueue, NamespaceQueueId, RegionEvent, ServerQueue, ServerQueueId, TableQueue,
    TableQueueId,
};
use crate::error::{SchedulerError, SchedulerResult};
use crate::fair_queue::FairQueue;
use crate::keyed_index::{KeyedIndex, ShardedKeyedIndex};
use crate::procedure::{
    EncodedRegionName, FailureKind, NamespaceName, Procedure, ProcedureCapability, ServerName,
    TableName, TableOperationType, TerminalOutcome, META_TABLE, NAMESPACE_SYSTEM_TABLE,
    SYSTEM_TABLE_PREFIX,
};

/// The Master Procedure Scheduler: fair dispatch plus hierarchical locking
/// for the long-running administrative procedures the Executor runs.
///
/// All mutation goes through the single `state` mutex (spec §5's `schedLock`);
/// this crate does not implement the optional per-`TableQueue` monitor the
/// spec allows for region fan-out, trading that performance optimization for
/// a single, easy-to-reason-about critical section (see `DESIGN.md`).
#[derive(Debug)]
pub struct Scheduler {
    state: Mutex<SchedulerState>,
    cond: Condvar,
    config: SchedulerConfig,
}

#[derive(Debug)]
struct SchedulerState {
    tables: KeyedIndex<TableName, TableQueue, TableQueueId>,
    namespaces: KeyedIndex<NamespaceName, NamespaceQueue, NamespaceQueueId>,
    servers: ShardedKeyedIndex<ServerName, ServerQueue>,
    table_fair_queue: FairQueue<TableQueueId>,
    server_fair_queue: FairQueue<ServerQueueId>,
    runnable_count: usize,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        let bucket_count = config.server_bucket_count;
        Self {
            state: Mutex::new(SchedulerState {
                tables: KeyedIndex::new(),
                namespaces: KeyedIndex::new(),
                servers: ShardedKeyedIndex::new(bucket_count),
                table_fair_queue: FairQueue::new(),
                server_fair_queue: FairQueue::new(),
                runnable_count: 0,
            }),
            cond: Condvar::new(),
            config,
        }
    }

    // ---- naming helpers --------------------------------------------------

    /// Extracts the namespace a table belongs to from its qualified name
    /// (`"namespace:qualifier"`); unqualified names belong to `"default"`.
    fn namespace_of(table: &TableName) -> NamespaceName {
        match table.as_str().split_once(':') {
            Some((ns, _)) => NamespaceName::from(ns),
            None => NamespaceName::from("default"),
        }
    }

    fn priority_for_table(&self, table: &TableName) -> u32 {
        if table.as_str() == META_TABLE {
            self.config.meta_table_priority
        } else if table.as_str().starts_with(SYSTEM_TABLE_PREFIX) {
            self.config.system_table_priority
        } else {
            self.config.user_table_priority
        }
    }

    // ---- lazy creation -----------------------------------------------------

    fn get_or_create_table_id(&self, state: &mut SchedulerState, table: &TableName) -> TableQueueId {
        if let Some(id) = state.tables.get_id(table) {
            return id;
        }
        let namespace = Self::namespace_of(table);
        let priority = self.priority_for_table(table);
        let id = state
            .tables
            .insert(table.clone(), TableQueue::new(table.clone(), namespace, priority));
        tracing::debug!(table = %table, "created table queue");
        id
    }

    fn get_or_create_namespace_id(
        &self,
        state: &mut SchedulerState,
        namespace: &NamespaceName,
    ) -> NamespaceQueueId {
        if let Some(id) = state.namespaces.get_id(namespace) {
            return id;
        }
        state.namespaces.insert(namespace.clone(), NamespaceQueue::new())
    }

    fn get_or_create_server_id(&self, state: &mut SchedulerState, server: &ServerName) -> ServerQueueId {
        if let Some(id) = state.servers.get_id(server) {
            return id;
        }
        let id = state
            .servers
            .insert(server.clone(), ServerQueue::new(server.clone(), 1));
        tracing::debug!(server = %server, "created server queue");
        id
    }

    // ---- FairQueue linking ---------------------------------------------

    /// Link `id` into the table `FairQueue` iff it actually has a
    /// dispatchable head right now: non-empty, and either unlocked or
    /// locked with the head holding lock access (spec's `isAvailable`,
    /// ignoring the namespace factor — matching `enqueue`'s existing scope).
    /// Linking a queue that is empty or whose head cannot run would violate
    /// the "linked iff dispatchable" membership invariant (spec §8.5) and
    /// leave `FairQueue::poll` rotating past a permanently-dead member.
    fn link_table(state: &mut SchedulerState, id: TableQueueId) {
        let linkable = state.tables.get(id).is_some_and(|t| t.is_available(false));
        if linkable {
            let priority = state.tables.get(id).expect("checked linkable above").priority;
            state.table_fair_queue.add(id, priority);
        }
    }

    fn unlink_table(state: &mut SchedulerState, id: TableQueueId) {
        state.table_fair_queue.remove(id);
    }

    /// Link `id` into the server `FairQueue` iff it is actually available:
    /// non-empty and not exclusively locked (spec's server `isAvailable`).
    fn link_server(state: &mut SchedulerState, id: ServerQueueId) {
        let linkable = state.servers.get(id).is_some_and(ServerQueue::is_available);
        if linkable {
            let priority = state.servers.get(id).expect("checked linkable above").priority;
            state.server_fair_queue.add(id, priority);
        }
    }

    fn unlink_server(state: &mut SchedulerState, id: ServerQueueId) {
        state.server_fair_queue.remove(id);
    }

    /// Push a woken procedure back to the front of its own capability's
    /// runnable FIFO and ensure that queue is linked, so the Executor
    /// re-dispatches it to retry the lock call it suspended on.
    fn requeue_woken(&self, state: &mut SchedulerState, proc: Arc<dyn Procedure>) {
        match proc.capability() {
            ProcedureCapability::Table { table, .. } => {
                let id = self.get_or_create_table_id(state, &table);
                if let Some(t) = state.tables.get_mut(id) {
                    t.runnables.add(proc, true);
                    state.runnable_count += 1;
                }
                Self::link_table(state, id);
            }
            ProcedureCapability::Server { server, .. } => {
                let id = self.get_or_create_server_id(state, &server);
                if let Some(s) = state.servers.get_mut(id) {
                    s.runnables.add(proc, true);
                    state.runnable_count += 1;
                }
                Self::link_server(state, id);
            }
        }
    }

    fn drain_namespace_event(&self, state: &mut SchedulerState, ns_id: NamespaceQueueId) -> usize {
        let Some(ns) = state.namespaces.get_mut(ns_id) else {
            return 0;
        };
        let waiters = ns.event.drain_all();
        let count = waiters.len();
        for p in waiters {
            self.requeue_woken(state, p);
        }
        count
    }

    fn drain_table_event(&self, state: &mut SchedulerState, table_id: TableQueueId) -> usize {
        let Some(t) = state.tables.get_mut(table_id) else {
            return 0;
        };
        let waiters = t.event.drain_all();
        let count = waiters.len();
        for p in waiters {
            self.requeue_woken(state, p);
        }
        count
    }

    fn wake_poll_if_needed(&self, woken: usize) {
        if woken > 0 {
            self.cond.notify_all();
        }
    }

    // ---- enqueue / dequeue / yield ---------------------------------------

    /// Classify `proc` by capability, look up or create its entity queue,
    /// append it (front-pushed iff `add_front`), and link the queue into its
    /// `FairQueue` iff it is immediately dispatchable.
    pub fn enqueue(&self, proc: Arc<dyn Procedure>, add_front: bool) -> SchedulerResult<()> {
        let mut state = self.state.lock().unwrap();
        match proc.capability() {
            ProcedureCapability::Table { table, .. } => {
                let id = self.get_or_create_table_id(&mut state, &table);
                self.link_if_runnable_table(&mut state, id, &proc, add_front)?;
            }
            ProcedureCapability::Server { server, .. } => {
                let id = self.get_or_create_server_id(&mut state, &server);
                self.link_if_runnable_server(&mut state, id, &proc, add_front)?;
            }
        }
        drop(state);
        self.wake_poll_if_needed(1);
        Ok(())
    }

    fn link_if_runnable_table(
        &self,
        state: &mut SchedulerState,
        id: TableQueueId,
        proc: &Arc<dyn Procedure>,
        add_front: bool,
    ) -> SchedulerResult<()> {
        let locked;
        let has_access;
        let has_parent_access;
        {
            let t = state.tables.get(id).expect("just created or looked up");
            locked = t.lock_state.is_exclusively_locked();
            has_access =
                t.lock_state
                    .has_lock_access(proc.proc_id(), proc.parent_proc_id(), proc.root_proc_id());
            has_parent_access = t.lock_state.has_parent_lock(proc.parent_proc_id(), proc.root_proc_id());
        }

        let should_link = if !locked || has_access {
            true
        } else if has_parent_access {
            if !add_front {
                return Err(SchedulerError::ChildFrontPushViolation(proc.proc_id()));
            }
            true
        } else {
            false
        };

        let t = state.tables.get_mut(id).expect("just created or looked up");
        t.runnables.add(Arc::clone(proc), add_front);
        state.runnable_count += 1;
        if should_link {
            Self::link_table(state, id);
        }
        Ok(())
    }

    fn link_if_runnable_server(
        &self,
        state: &mut SchedulerState,
        id: ServerQueueId,
        proc: &Arc<dyn Procedure>,
        add_front: bool,
    ) -> SchedulerResult<()> {
        let locked;
        let has_access;
        let has_parent_access;
        {
            let s = state.servers.get(id).expect("just created or looked up");
            locked = s.lock_state.is_exclusively_locked();
            has_access =
                s.lock_state
                    .has_lock_access(proc.proc_id(), proc.parent_proc_id(), proc.root_proc_id());
            has_parent_access = s.lock_state.has_parent_lock(proc.parent_proc_id(), proc.root_proc_id());
        }

        let should_link = if !locked || has_access {
            true
        } else if has_parent_access {
            if !add_front {
                return Err(SchedulerError::ChildFrontPushViolation(proc.proc_id()));
            }
            true
        } else {
            false
        };

        let s = state.servers.get_mut(id).expect("just created or looked up");
        s.runnables.add(Arc::clone(proc), add_front);
        state.runnable_count += 1;
        if should_link {
            Self::link_server(state, id);
        }
        Ok(())
    }

    /// Re-enqueue `proc` at the front of its entity queue's FIFO.
    pub fn yield_proc(&self, proc: Arc<dyn Procedure>) -> SchedulerResult<()> {
        self.enqueue(proc, true)
    }

    /// Select the next runnable procedure. Server queues strictly preempt
    /// table queues.
    pub fn dequeue(&self) -> Option<Arc<dyn Procedure>> {
        let mut state = self.state.lock().unwrap();
        if let Some(proc) = self.dequeue_from_server(&mut state) {
            return Some(proc);
        }
        self.dequeue_from_table(&mut state)
    }

    /// Block until a procedure is runnable or `timeout` elapses, retrying
    /// [`Self::dequeue`] on each wake. Convenience for an Executor thread
    /// pool built on the condition variable documented in spec §5; the core
    /// `dequeue()` above stays the exact, non-blocking API the spec names.
    pub fn dequeue_wait(&self, timeout: Duration) -> Option<Arc<dyn Procedure>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(proc) = self.dequeue_from_server(&mut state) {
                return Some(proc);
            }
            if let Some(proc) = self.dequeue_from_table(&mut state) {
                return Some(proc);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, timed_out) = self.cond.wait_timeout(state, remaining).unwrap();
            state = guard;
            if timed_out.timed_out() && state.runnable_count == 0 {
                return None;
            }
        }
    }

    fn dequeue_from_server(&self, state: &mut SchedulerState) -> Option<Arc<dyn Procedure>> {
        let id = {
            let servers = &state.servers;
            state
                .server_fair_queue
                .poll(|id| servers.get(id).is_some_and(ServerQueue::is_available))
        }?;
        let proc = state.servers.get_mut(id)?.runnables.pop_front()?;
        state.runnable_count -= 1;

        let requires_xlock = matches!(proc.capability(), ProcedureCapability::Server { op, .. } if matches!(op, crate::procedure::ServerOperationType::CrashHandler));
        let is_empty = state.servers.get(id).is_some_and(|s| s.runnables.is_empty());

        if is_empty || requires_xlock {
            Self::unlink_server(state, id);
        } else {
            let owner = state.servers.get(id).and_then(|s| s.lock_state.exclusive_owner());
            if owner.is_some() {
                let next_is_sibling = state
                    .servers
                    .get(id)
                    .and_then(|s| s.runnables.peek_front())
                    .is_some_and(|next| next.parent_proc_id() == owner || next.root_proc_id() == owner);
                if !next_is_sibling {
                    Self::unlink_server(state, id);
                }
            }
        }

        tracing::debug!(proc_id = proc.proc_id(), "dequeued server procedure");
        Some(proc)
    }

    fn dequeue_from_table(&self, state: &mut SchedulerState) -> Option<Arc<dyn Procedure>> {
        let id = {
            let tables = &state.tables;
            let namespaces = &state.namespaces;
            state.table_fair_queue.poll(|id| {
                tables.get(id).is_some_and(|t| {
                    let ns_locked = namespaces
                        .get_id(&t.namespace)
                        .and_then(|ns_id| namespaces.get(ns_id))
                        .is_some_and(|ns| ns.lock_state.is_exclusively_locked());
                    t.is_available(ns_locked)
                })
            })
        }?;
        let proc = state.tables.get_mut(id)?.runnables.pop_front()?;
        state.runnable_count -= 1;

        let requires_xlock = match proc.capability() {
            ProcedureCapability::Table { table, op } => {
                crate::entity_queue::table_requires_exclusive_lock(&table, op).unwrap_or(false)
            }
            ProcedureCapability::Server { .. } => false,
        };
        let is_empty = state.tables.get(id).is_some_and(|t| t.runnables.is_empty());

        if is_empty || requires_xlock {
            Self::unlink_table(state, id);
        } else {
            let owner = state.tables.get(id).and_then(|t| t.lock_state.exclusive_owner());
            if owner.is_some() {
                let next_is_sibling = state
                    .tables
                    .get(id)
                    .and_then(|t| t.runnables.peek_front())
                    .is_some_and(|next| next.parent_proc_id() == owner || next.root_proc_id() == owner);
                if !next_is_sibling {
                    Self::unlink_table(state, id);
                }
            }
        }

        tracing::debug!(proc_id = proc.proc_id(), "dequeued table procedure");
        Some(proc)
    }

    // ---- table exclusive / shared locks -----------------------------------

    pub fn wait_table_exclusive_lock(
        &self,
        proc: Arc<dyn Procedure>,
        table: &TableName,
    ) -> SchedulerResult<bool> {
        let mut state = self.state.lock().unwrap();
        let waited = self.wait_table_exclusive_lock_locked(&mut state, proc, table)?;
        Ok(waited)
    }

    fn wait_table_exclusive_lock_locked(
        &self,
        state: &mut SchedulerState,
        proc: Arc<dyn Procedure>,
        table: &TableName,
    ) -> SchedulerResult<bool> {
        let namespace = Self::namespace_of(table);
        let ns_id = self.get_or_create_namespace_id(state, &namespace);

        if !state.namespaces.get_mut(ns_id).unwrap().lock_state.try_shared_lock() {
            state.namespaces.get_mut(ns_id).unwrap().event.suspend(Arc::clone(&proc));
            tracing::debug!(proc_id = proc.proc_id(), table = %table, "suspended on namespace shared lock");
            return Ok(true);
        }

        let table_id = self.get_or_create_table_id(state, table);
        let acquired = state
            .tables
            .get_mut(table_id)
            .unwrap()
            .lock_state
            .try_exclusive_lock(proc.proc_id(), proc.parent_proc_id(), proc.root_proc_id());

        if acquired {
            Self::unlink_table(state, table_id);
            tracing::debug!(proc_id = proc.proc_id(), table = %table, "acquired table exclusive lock");
            Ok(false)
        } else {
            let ns_drained = state.namespaces.get_mut(ns_id).unwrap().lock_state.release_shared_lock();
            if ns_drained {
                self.drain_namespace_event(state, ns_id);
            }
            state.tables.get_mut(table_id).unwrap().event.suspend(proc.clone());
            tracing::debug!(proc_id = proc.proc_id(), table = %table, "suspended on table exclusive lock");
            Ok(true)
        }
    }

    pub fn wake_table_exclusive_lock(&self, proc: &Arc<dyn Procedure>, table: &TableName) {
        let mut state = self.state.lock().unwrap();
        self.wake_table_exclusive_lock_locked(&mut state, proc, table);
    }

    fn wake_table_exclusive_lock_locked(
        &self,
        state: &mut SchedulerState,
        proc: &Arc<dyn Procedure>,
        table: &TableName,
    ) {
        let Some(table_id) = state.tables.get_id(table) else {
            return;
        };
        let mut woken = 0;

        let released = state
            .tables
            .get_mut(table_id)
            .unwrap()
            .lock_state
            .release_exclusive_lock(proc.proc_id());
        if released {
            woken += self.drain_table_event(state, table_id);
        }

        let namespace = Self::namespace_of(table);
        if let Some(ns_id) = state.namespaces.get_id(&namespace) {
            let ns_drained = state.namespaces.get_mut(ns_id).unwrap().lock_state.release_shared_lock();
            if ns_drained {
                woken += self.drain_namespace_event(state, ns_id);
            }
        }

        Self::link_table(state, table_id);
        self.wake_poll_if_needed(woken);
    }

    pub fn wait_table_shared_lock(&self, proc: Arc<dyn Procedure>, table: &TableName) -> SchedulerResult<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(self.wait_table_shared_lock_locked(&mut state, proc, table))
    }

    fn wait_table_shared_lock_locked(
        &self,
        state: &mut SchedulerState,
        proc: Arc<dyn Procedure>,
        table: &TableName,
    ) -> bool {
        let namespace = Self::namespace_of(table);
        let ns_id = self.get_or_create_namespace_id(state, &namespace);

        if !state.namespaces.get_mut(ns_id).unwrap().lock_state.try_shared_lock() {
            state.namespaces.get_mut(ns_id).unwrap().event.suspend(Arc::clone(&proc));
            return true;
        }

        let table_id = self.get_or_create_table_id(state, table);
        let acquired = state.tables.get_mut(table_id).unwrap().lock_state.try_shared_lock();
        if acquired {
            false
        } else {
            let ns_drained = state.namespaces.get_mut(ns_id).unwrap().lock_state.release_shared_lock();
            if ns_drained {
                self.drain_namespace_event(state, ns_id);
            }
            state.tables.get_mut(table_id).unwrap().event.suspend(proc);
            true
        }
    }

    pub fn wake_table_shared_lock(&self, proc: &Arc<dyn Procedure>, table: &TableName) {
        let mut state = self.state.lock().unwrap();
        self.wake_table_shared_lock_locked(&mut state, proc, table);
    }

    /// Shared-lock release is not tied to a specific owner (any holder can
    /// call it); `_proc` is accepted only so every wake_* method shares the
    /// same call shape.
    fn wake_table_shared_lock_locked(
        &self,
        state: &mut SchedulerState,
        _proc: &Arc<dyn Procedure>,
        table: &TableName,
    ) {
        let Some(table_id) = state.tables.get_id(table) else {
            return;
        };
        let mut woken = 0;

        let table_zero = state.tables.get_mut(table_id).unwrap().lock_state.release_shared_lock();
        if table_zero {
            Self::link_table(state, table_id);
        }

        let namespace = Self::namespace_of(table);
        if let Some(ns_id) = state.namespaces.get_id(&namespace) {
            let ns_zero = state.namespaces.get_mut(ns_id).unwrap().lock_state.release_shared_lock();
            if ns_zero {
                woken += self.drain_namespace_event(state, ns_id);
            }
        }

        self.wake_poll_if_needed(woken);
    }

    // ---- regions -----------------------------------------------------------

    pub fn wait_region(
        &self,
        proc: Arc<dyn Procedure>,
        table: &TableName,
        region: EncodedRegionName,
    ) -> SchedulerResult<bool> {
        self.wait_regions(proc, table, &[region])
    }

    pub fn wait_regions(
        &self,
        proc: Arc<dyn Procedure>,
        table: &TableName,
        regions: &[EncodedRegionName],
    ) -> SchedulerResult<bool> {
        let mut sorted = regions.to_vec();
        sorted.sort();
        for pair in sorted.windows(2) {
            if pair[0] == pair[1] {
                return Err(SchedulerError::DuplicateRegionInRequest(table.clone(), pair[0].clone()));
            }
        }

        let mut state = self.state.lock().unwrap();
        let has_parent = proc.parent_proc_id().is_some();

        let table_id = if has_parent {
            self.get_or_create_table_id(&mut state, table)
        } else if self.wait_table_shared_lock_locked(&mut state, Arc::clone(&proc), table) {
            // Suspended acquiring the table's shared lock (or its namespace's);
            // the procedure is already parked, nothing left to unwind here.
            return Ok(true);
        } else {
            state.tables.get_id(table).expect("just acquired its shared lock")
        };

        let mut acquired_regions: Vec<EncodedRegionName> = Vec::new();
        let mut failed: Option<EncodedRegionName> = None;
        for region in &sorted {
            let t = state.tables.get_mut(table_id).unwrap();
            let entry = t.regions.entry(region.clone()).or_insert_with(RegionEvent::new);
            let acquired =
                entry
                    .lock
                    .try_exclusive_lock(proc.proc_id(), proc.parent_proc_id(), proc.root_proc_id());
            if acquired {
                acquired_regions.push(region.clone());
            } else {
                failed = Some(region.clone());
                break;
            }
        }

        let Some(failed_region) = failed else {
            return Ok(false);
        };

        for region in acquired_regions.iter().rev() {
            let t = state.tables.get_mut(table_id).unwrap();
            if let Some(entry) = t.regions.get_mut(region) {
                entry.lock.release_exclusive_lock(proc.proc_id());
                if entry.is_quiescent() {
                    t.regions.remove(region);
                }
            }
        }

        {
            let t = state.tables.get_mut(table_id).unwrap();
            let entry = t.regions.entry(failed_region).or_insert_with(RegionEvent::new);
            entry.event.suspend(Arc::clone(&proc));
        }

        if !has_parent {
            let table_zero = state.tables.get_mut(table_id).unwrap().lock_state.release_shared_lock();
            if table_zero {
                Self::link_table(&mut state, table_id);
            }
            let namespace = Self::namespace_of(table);
            if let Some(ns_id) = state.namespaces.get_id(&namespace) {
                let ns_zero = state.namespaces.get_mut(ns_id).unwrap().lock_state.release_shared_lock();
                if ns_zero {
                    self.drain_namespace_event(&mut state, ns_id);
                }
            }
        }

        tracing::debug!(proc_id = proc.proc_id(), table = %table, "suspended on region lock");
        Ok(true)
    }

    pub fn wake_region(&self, proc: &Arc<dyn Procedure>, table: &TableName, region: EncodedRegionName) {
        self.wake_regions(proc, table, &[region]);
    }

    pub fn wake_regions(&self, proc: &Arc<dyn Procedure>, table: &TableName, regions: &[EncodedRegionName]) {
        let mut sorted = regions.to_vec();
        sorted.sort();

        let mut state = self.state.lock().unwrap();
        let Some(table_id) = state.tables.get_id(table) else {
            return;
        };

        let mut woken_procs: Vec<Arc<dyn Procedure>> = Vec::new();
        for region in &sorted {
            let t = state.tables.get_mut(table_id).unwrap();
            let Some(entry) = t.regions.get_mut(region) else {
                continue;
            };
            entry.lock.release_exclusive_lock(proc.proc_id());
            if let Some(next) = entry.event.pop_one() {
                woken_procs.push(next);
            }
            if entry.is_quiescent() {
                t.regions.remove(region);
            }
        }

        for p in woken_procs.into_iter().rev() {
            self.requeue_woken(&mut state, p);
        }

        if proc.parent_proc_id().is_none() {
            let table_zero = state.tables.get_mut(table_id).unwrap().lock_state.release_shared_lock();
            if table_zero {
                Self::link_table(&mut state, table_id);
            }
            let namespace = Self::namespace_of(table);
            if let Some(ns_id) = state.namespaces.get_id(&namespace) {
                let ns_zero = state.namespaces.get_mut(ns_id).unwrap().lock_state.release_shared_lock();
                if ns_zero {
                    self.drain_namespace_event(&mut state, ns_id);
                }
            }
        }

        self.wake_poll_if_needed(1);
    }

    // ---- namespace exclusive lock -----------------------------------------

    pub fn wait_namespace_exclusive_lock(
        &self,
        proc: Arc<dyn Procedure>,
        namespace: &NamespaceName,
    ) -> SchedulerResult<bool> {
        let mut state = self.state.lock().unwrap();
        let ns_table = TableName::from(NAMESPACE_SYSTEM_TABLE);

        if self.wait_table_shared_lock_locked(&mut state, Arc::clone(&proc), &ns_table) {
            return Ok(true);
        }

        let ns_id = self.get_or_create_namespace_id(&mut state, namespace);
        let acquired = state
            .namespaces
            .get_mut(ns_id)
            .unwrap()
            .lock_state
            .try_exclusive_lock(proc.proc_id(), proc.parent_proc_id(), proc.root_proc_id());

        if acquired {
            Ok(false)
        } else {
            self.wake_table_shared_lock_locked(&mut state, &proc, &ns_table);
            state.namespaces.get_mut(ns_id).unwrap().event.suspend(proc);
            Ok(true)
        }
    }

    pub fn wake_namespace_exclusive_lock(&self, proc: &Arc<dyn Procedure>, namespace: &NamespaceName) {
        let mut state = self.state.lock().unwrap();

        if let Some(ns_id) = state.namespaces.get_id(namespace) {
            let released = state
                .namespaces
                .get_mut(ns_id)
                .unwrap()
                .lock_state
                .release_exclusive_lock(proc.proc_id());
            if released {
                self.drain_namespace_event(&mut state, ns_id);
            }
        }

        let ns_table = TableName::from(NAMESPACE_SYSTEM_TABLE);
        self.wake_table_shared_lock_locked(&mut state, proc, &ns_table);
        self.wake_poll_if_needed(1);
    }

    // ---- server exclusive lock ---------------------------------------------

    pub fn wait_server_exclusive_lock(&self, proc: Arc<dyn Procedure>, server: &ServerName) -> SchedulerResult<bool> {
        let mut state = self.state.lock().unwrap();
        let id = self.get_or_create_server_id(&mut state, server);
        let acquired = state
            .servers
            .get_mut(id)
            .unwrap()
            .lock_state
            .try_exclusive_lock(proc.proc_id(), proc.parent_proc_id(), proc.root_proc_id());

        if acquired {
            Self::unlink_server(&mut state, id);
            Ok(false)
        } else {
            state.servers.get_mut(id).unwrap().event.suspend(proc);
            Ok(true)
        }
    }

    pub fn wake_server_exclusive_lock(&self, proc: &Arc<dyn Procedure>, server: &ServerName) {
        let mut state = self.state.lock().unwrap();
        let Some(id) = state.servers.get_id(server) else {
            return;
        };
        let released = state
            .servers
            .get_mut(id)
            .unwrap()
            .lock_state
            .release_exclusive_lock(proc.proc_id());
        if released {
            Self::link_server(&mut state, id);
            let woken = {
                let waiters = state.servers.get_mut(id).unwrap().event.drain_all();
                let count = waiters.len();
                for p in waiters {
                    self.requeue_woken(&mut state, p);
                }
                count
            };
            self.wake_poll_if_needed(woken);
        }
    }

    // ---- completion & lifecycle --------------------------------------------

    /// Infer from `outcome` whether `proc`'s table no longer exists, and if
    /// so attempt [`Self::mark_table_as_deleted`].
    pub fn completion_cleanup(&self, proc: &Arc<dyn Procedure>, outcome: TerminalOutcome) -> SchedulerResult<()> {
        let ProcedureCapability::Table { table, op } = proc.capability() else {
            return Ok(());
        };

        let deleted = match &outcome {
            TerminalOutcome::Success => op == TableOperationType::Delete,
            TerminalOutcome::Failed(kind) => match op {
                TableOperationType::Create => !matches!(kind, FailureKind::TableExists),
                _ => matches!(kind, FailureKind::TableNotFound),
            },
        };

        if deleted {
            self.mark_table_as_deleted(&table, proc)?;
        }
        Ok(())
    }

    /// If `table`'s queue is empty and a fresh exclusive lock proves it
    /// quiescent, unlink it from the `FairQueue` and drop it from the
    /// `KeyedIndex`. Returns `false` (queue stays) if new work raced in.
    pub fn mark_table_as_deleted(&self, table: &TableName, proc: &Arc<dyn Procedure>) -> SchedulerResult<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(table_id) = state.tables.get_id(table) else {
            return Ok(true);
        };

        if !state.tables.get(table_id).unwrap().runnables.is_empty() {
            return Ok(false);
        }

        let acquired = state
            .tables
            .get_mut(table_id)
            .unwrap()
            .lock_state
            .try_exclusive_lock(proc.proc_id(), proc.parent_proc_id(), proc.root_proc_id());
        if !acquired {
            return Ok(false);
        }

        if !state.tables.get(table_id).unwrap().runnables.is_empty() {
            return Ok(false);
        }

        Self::unlink_table(&mut state, table_id);
        state.tables.remove(table);
        tracing::info!(table = %table, "table queue removed: table deleted");
        Ok(true)
    }

    /// Total runnable procedure count across every entity queue.
    #[must_use]
    pub fn size(&self) -> usize {
        self.state.lock().unwrap().runnable_count
    }
}
