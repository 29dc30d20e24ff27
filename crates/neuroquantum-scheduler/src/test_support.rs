//! Minimal `Procedure` implementations shared by this crate's unit tests.

use std::sync::Arc;

use crate::procedure::{
    Procedure, ProcedureCapability, ServerName, ServerOperationType, TableName, TableOperationType,
};

/// A bare-bones procedure used to exercise scheduler behavior without
/// pulling in a real Procedure Executor.
#[derive(Debug)]
pub struct TestProcedure {
    proc_id: u64,
    parent_proc_id: Option<u64>,
    root_proc_id: Option<u64>,
    capability: ProcedureCapability,
}

impl TestProcedure {
    #[must_use]
    pub fn table(proc_id: u64, table: impl Into<TableName>) -> Arc<dyn Procedure> {
        Self::table_op(proc_id, table, TableOperationType::Create)
    }

    #[must_use]
    pub fn table_op(
        proc_id: u64,
        table: impl Into<TableName>,
        op: TableOperationType,
    ) -> Arc<dyn Procedure> {
        Arc::new(Self {
            proc_id,
            parent_proc_id: None,
            root_proc_id: None,
            capability: ProcedureCapability::Table {
                table: table.into(),
                op,
            },
        })
    }

    #[must_use]
    pub fn child_of(
        proc_id: u64,
        parent: &Arc<dyn Procedure>,
        table: impl Into<TableName>,
        op: TableOperationType,
    ) -> Arc<dyn Procedure> {
        let root = parent.root_proc_id().unwrap_or_else(|| parent.proc_id());
        Arc::new(Self {
            proc_id,
            parent_proc_id: Some(parent.proc_id()),
            root_proc_id: Some(root),
            capability: ProcedureCapability::Table {
                table: table.into(),
                op,
            },
        })
    }

    #[must_use]
    pub fn server(proc_id: u64, server: impl Into<ServerName>, op: ServerOperationType) -> Arc<dyn Procedure> {
        Arc::new(Self {
            proc_id,
            parent_proc_id: None,
            root_proc_id: None,
            capability: ProcedureCapability::Server {
                server: server.into(),
                op,
            },
        })
    }
}

impl Procedure for TestProcedure {
    fn proc_id(&self) -> u64 {
        self.proc_id
    }

    fn parent_proc_id(&self) -> Option<u64> {
        self.parent_proc_id
    }

    fn root_proc_id(&self) -> Option<u64> {
        self.root_proc_id
    }

    fn capability(&self) -> ProcedureCapability {
        self.capability.clone()
    }
}
