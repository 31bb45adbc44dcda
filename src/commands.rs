//! Structured grid commands and the dispatch table
//!
//! The original console wired row actions as executable strings on markup
//! attributes. Here the core only ever emits typed commands; the
//! presentation boundary binds handlers in a `CommandTable` and looks them
//! up by command name. The core never constructs anything executable.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::rows::RowIdentity;

/// The two ends of a relation, as seen from a target grid.
///
/// `to_key` is the column on the target rows pointing back at the owner
/// (the constraint key); `from_key` is the owner-side collection named in
/// the bulk-removal route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEnds {
    pub from_key: String,
    pub to_key: String,
}

impl RelationEnds {
    pub fn new(from_key: &str, to_key: &str) -> Self {
        Self {
            from_key: from_key.to_string(),
            to_key: to_key.to_string(),
        }
    }
}

/// A row-level action emitted by a table type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RowCommand {
    Edit {
        identity: RowIdentity,
    },
    Duplicate {
        identity: RowIdentity,
    },
    Delete {
        identity: RowIdentity,
    },
    /// Replaces `Delete` under a relation scope: severs the relationship,
    /// not the entity
    RemoveFromRelation {
        identity: RowIdentity,
    },
    OpenRelationTable {
        target_kind: String,
        owner: RowIdentity,
        ends: RelationEnds,
    },
    ShowLogs {
        identity: RowIdentity,
        runtime: Option<String>,
    },
    ShowResults {
        identity: RowIdentity,
        runtime: Option<String>,
    },
    ShowResult {
        id: u64,
    },
    CopyResult {
        id: u64,
    },
    Run {
        identity: RowIdentity,
    },
    ParameterizedRun {
        identity: RowIdentity,
    },
    ShowDeviceData {
        identity: RowIdentity,
    },
    ShowDeviceResults {
        identity: RowIdentity,
    },
    OpenConnection {
        identity: RowIdentity,
    },
    ShowGitHistory {
        identity: RowIdentity,
    },
    UpdatePool {
        id: u64,
    },
    PauseTask {
        id: u64,
    },
    ResumeTask {
        id: u64,
    },
    ShowSessionLog {
        id: u64,
    },
    ExportService {
        id: u64,
    },
    /// Scope the service grid to one workflow's children
    FilterWorkflowChildren {
        workflow_id: u64,
    },
}

impl RowCommand {
    /// Stable name used for dispatch-table lookup
    pub fn name(&self) -> &'static str {
        match self {
            RowCommand::Edit { .. } => "edit",
            RowCommand::Duplicate { .. } => "duplicate",
            RowCommand::Delete { .. } => "delete",
            RowCommand::RemoveFromRelation { .. } => "remove_from_relation",
            RowCommand::OpenRelationTable { .. } => "open_relation_table",
            RowCommand::ShowLogs { .. } => "show_logs",
            RowCommand::ShowResults { .. } => "show_results",
            RowCommand::ShowResult { .. } => "show_result",
            RowCommand::CopyResult { .. } => "copy_result",
            RowCommand::Run { .. } => "run",
            RowCommand::ParameterizedRun { .. } => "parameterized_run",
            RowCommand::ShowDeviceData { .. } => "show_device_data",
            RowCommand::ShowDeviceResults { .. } => "show_device_results",
            RowCommand::OpenConnection { .. } => "open_connection",
            RowCommand::ShowGitHistory { .. } => "show_git_history",
            RowCommand::UpdatePool { .. } => "update_pool",
            RowCommand::PauseTask { .. } => "pause_task",
            RowCommand::ResumeTask { .. } => "resume_task",
            RowCommand::ShowSessionLog { .. } => "show_session_log",
            RowCommand::ExportService { .. } => "export_service",
            RowCommand::FilterWorkflowChildren { .. } => "filter_workflow_children",
        }
    }
}

/// A control-bar element declared by a table type, in display order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum Control {
    ColumnDisplay,
    Refresh,
    AdvancedSearch,
    ClearSearch,
    CopyToClipboard,
    /// "New" on top-level grids, "Add" under a relation scope
    New,
    BulkEdit,
    Export,
    /// "Bulk deletion" on top-level grids, bulk relation removal under a
    /// relation scope
    BulkDelete,
    /// Run a service against every row matching the current filter
    RunOnAll,
    Calendar,
    UpdateAllPools,
    Compare,
    SchedulerResume,
    SchedulerPause,
    ImportService,
    /// Service grid: hierarchical vs flat display, rides in the search form
    HierarchyToggle,
    /// Configuration grid: lines-of-context slider, rides in the search form
    ContextSlider,
}

/// Handler bound to a command name
pub type CommandHandler = Box<dyn Fn(&RowCommand) + Send + Sync>;

/// Command-name → handler table, owned by the presentation boundary
#[derive(Default)]
pub struct CommandTable {
    handlers: HashMap<&'static str, CommandHandler>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(
        &mut self,
        name: &'static str,
        handler: impl Fn(&RowCommand) + Send + Sync + 'static,
    ) {
        self.handlers.insert(name, Box::new(handler));
    }

    /// Dispatch a command; returns false when nothing is bound to it
    pub fn dispatch(&self, command: &RowCommand) -> bool {
        match self.handlers.get(command.name()) {
            Some(handler) => {
                handler(command);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn identity() -> RowIdentity {
        RowIdentity {
            id: 1,
            name: "r1".to_string(),
            kind: "device".to_string(),
        }
    }

    #[test]
    fn test_dispatch_bound_command() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut table = CommandTable::new();
        let counter = Arc::clone(&hits);
        table.bind("edit", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let dispatched = table.dispatch(&RowCommand::Edit {
            identity: identity(),
        });
        assert!(dispatched);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_unbound_command() {
        let table = CommandTable::new();
        assert!(!table.dispatch(&RowCommand::Delete {
            identity: identity()
        }));
    }
}
