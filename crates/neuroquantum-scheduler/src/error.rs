//! Scheduler error types and result definitions.

use thiserror::Error;

use crate::procedure::{EncodedRegionName, ProcId, TableName, TableOperationType};

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Programming errors raised by misuse of the scheduler API.
///
/// Per the scheduler's failure semantics, every operation is total and
/// non-failing at the API level; these variants are raised only when the
/// caller (the Executor) violates an invariant the scheduler relies on.
/// They are not meant to be recovered from — the caller should fail fast.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// A procedure implementing neither `TableCapability` nor
    /// `ServerCapability` was enqueued.
    #[error("procedure {0} implements no table or server capability")]
    UnsupportedProcedure(ProcId),

    /// `requireExclusiveLock` was asked to classify an operation type that
    /// has no defined locking rule for the given table.
    #[error("unexpected table operation {op:?} for table {table}")]
    UnexpectedOperation {
        table: TableName,
        op: TableOperationType,
    },

    /// A region appeared twice in a single `waitRegions`/`wakeRegions` call.
    #[error("duplicate region {1} in request for table {0}")]
    DuplicateRegionInRequest(TableName, EncodedRegionName),

    /// A child or yielded procedure was enqueued without `add_front = true`.
    #[error("procedure {0} must be front-pushed (child or yield)")]
    ChildFrontPushViolation(ProcId),
}
