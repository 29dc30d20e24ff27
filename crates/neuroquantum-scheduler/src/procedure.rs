//! The procedure model seen by the scheduler.
//!
//! A `Procedure` is opaque to the scheduler beyond the capability it
//! exposes: the scheduler never inspects what a procedure actually does,
//! only which entity it touches and what kind of lock that touch requires.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Unique identifier for a procedure, assigned by the Procedure Store.
pub type ProcId = u64;

macro_rules! entity_key {
    ($name:ident) => {
        /// Comparable, cheaply-cloneable entity key.
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Arc<str>);

        impl $name {
            #[must_use]
            pub fn new(value: impl Into<Arc<str>>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

entity_key!(TableName);
entity_key!(ServerName);
entity_key!(NamespaceName);

/// Prefix shared by every system table name. A table whose name starts with
/// this prefix is a system table for priority classification purposes;
/// everything else is a user table.
pub const SYSTEM_TABLE_PREFIX: &str = "system:";

/// Name of the single meta table, which tracks region-to-server
/// assignments cluster-wide and is given the highest dispatch priority.
pub const META_TABLE: &str = "system:meta";

/// Name of the system table that tracks namespace metadata.
///
/// Concurrent `EDIT` operations against this table are allowed (see
/// `requireExclusiveLock`'s carve-out for the namespace system table).
pub const NAMESPACE_SYSTEM_TABLE: &str = "system:namespace";

// Region identifier, already in its globally-ordered encoded form. Sorting
// `Vec<EncodedRegionName>` before acquiring region locks is the scheduler's
// deadlock-avoidance mechanism (spec §4.5 `waitRegion(s)`).
entity_key!(EncodedRegionName);

/// Administrative operation kinds against a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableOperationType {
    Create,
    Delete,
    Enable,
    Disable,
    Edit,
    Read,
    Split,
    Merge,
    Assign,
    Unassign,
    RegionEdit,
}

/// Administrative operation kinds against a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerOperationType {
    CrashHandler,
    Other,
}

/// What a procedure is about, from the scheduler's point of view.
///
/// A procedure implements at most one of these; the scheduler treats a
/// procedure reporting neither as a `SchedulerError::UnsupportedProcedure`.
#[derive(Debug, Clone)]
pub enum ProcedureCapability {
    Table {
        table: TableName,
        op: TableOperationType,
    },
    Server {
        server: ServerName,
        op: ServerOperationType,
    },
}

/// A long-running administrative procedure, as seen by the scheduler.
///
/// Procedures form a tree: a child's `parent_proc_id` points at the
/// procedure that spawned it, and `root_proc_id` points at the tree's root
/// (`None` parent/root means the procedure is itself a root). Lock
/// inheritance (`LockState::has_parent_lock`) is checked transitively only
/// through the root, never through an arbitrary ancestor chain.
pub trait Procedure: fmt::Debug + Send + Sync {
    /// This procedure's unique identifier.
    fn proc_id(&self) -> ProcId;

    /// The procedure that spawned this one, if any.
    fn parent_proc_id(&self) -> Option<ProcId>;

    /// The root of this procedure's tree, if it is not itself the root.
    fn root_proc_id(&self) -> Option<ProcId>;

    /// What entity this procedure touches and how.
    fn capability(&self) -> ProcedureCapability;
}

/// Terminal outcome of a procedure, as reported by the Executor to
/// `Scheduler::completion_cleanup`.
///
/// The scheduler does not parse arbitrary executor error types (that
/// coupling belongs to the out-of-scope Executor); the Executor is
/// responsible for classifying its own terminal error into one of these
/// three buckets before calling `completion_cleanup`.
#[derive(Debug, Clone)]
pub enum TerminalOutcome {
    /// The procedure completed successfully.
    Success,
    /// The procedure failed.
    Failed(FailureKind),
}

/// Classification of a procedure's terminal failure, used by
/// `completion_cleanup` to infer whether the procedure's table still
/// exists. This inference is advisory only — `markTableAsDeleted` is the
/// authoritative check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The table the procedure targeted already existed (only meaningful
    /// for a failed `CREATE`).
    TableExists,
    /// The table the procedure targeted does not exist.
    TableNotFound,
    /// Any other failure; defaults to "table exists" per spec §7.
    Other(String),
}
