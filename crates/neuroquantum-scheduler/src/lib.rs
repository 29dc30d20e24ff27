//! # Master Procedure Scheduler
//!
//! Decides which long-running administrative procedure — create/delete a
//! table, enable/disable a table, reassign a region, recover a crashed
//! server — runs next, and enforces the locking that keeps concurrent
//! procedures from corrupting shared cluster state.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          Scheduler                           │
//! │                                                               │
//! │   ┌─────────────┐ preempts  ┌─────────────┐                   │
//! │   │ server      │◄──────────│ table       │   FairQueue       │
//! │   │ FairQueue   │           │ FairQueue   │   round-robin,    │
//! │   └──────┬──────┘           └──────┬──────┘   priority quanta │
//! │          │                         │                          │
//! │   ┌──────▼──────┐           ┌──────▼──────┐                   │
//! │   │ ServerQueue │           │ TableQueue  │──► NamespaceQueue  │
//! │   │ (sharded    │           │ (regions,   │    (shared lock   │
//! │   │  KeyedIndex)│           │  LockState) │     per table op) │
//! │   └─────────────┘           └─────────────┘                   │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! - **Fair, priority-weighted dispatch** (`fair_queue`) across tables and
//!   servers, with server work strictly preempting table work.
//! - **Hierarchical reader/writer locking** (`lock_state`, `entity_queue`):
//!   namespace → table → region, plus a per-server exclusive lock, with
//!   parent-procedure lock inheritance.
//! - **Suspension/wake semantics** (`event_queue`) keyed on lockable
//!   entities, so blocked procedures impose no polling cost.
//!
//! Out of scope, by design: the Procedure Executor (the thread pool that
//! actually runs procedures), the Procedure Store (durable procedure log),
//! and procedure type definitions — this crate sees a procedure only through
//! the [`procedure::Procedure`] trait and its [`procedure::ProcedureCapability`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use neuroquantum_scheduler::{Scheduler, SchedulerConfig};
//! use neuroquantum_scheduler::procedure::{Procedure, ProcedureCapability, TableOperationType};
//!
//! # #[derive(Debug)]
//! # struct MyProcedure;
//! # impl Procedure for MyProcedure {
//! #     fn proc_id(&self) -> u64 { 1 }
//! #     fn parent_proc_id(&self) -> Option<u64> { None }
//! #     fn root_proc_id(&self) -> Option<u64> { None }
//! #     fn capability(&self) -> ProcedureCapability {
//! #         ProcedureCapability::Table { table: "user:orders".into(), op: TableOperationType::Create }
//! #     }
//! # }
//! let scheduler = Scheduler::new(SchedulerConfig::default());
//! scheduler.enqueue(Arc::new(MyProcedure), false).unwrap();
//! let proc = scheduler.dequeue().unwrap();
//! assert_eq!(proc.proc_id(), 1);
//! ```

pub mod arena;
pub mod config;
pub mod entity_queue;
pub mod error;
pub mod event_queue;
pub mod fair_queue;
pub mod keyed_index;
pub mod lock_state;
pub mod procedure;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{SchedulerConfig, SchedulerConfigBuilder};
pub use error::{SchedulerError, SchedulerResult};
pub use procedure::{Procedure, ProcedureCapability, TerminalOutcome};
pub use scheduler::Scheduler;
