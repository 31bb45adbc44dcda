//! The builtin entity catalogue
//!
//! One behavior per entity kind the console grids. Most kinds only declare
//! columns and a control set; the ones with bespoke needs (hierarchical
//! naming, status badges, derived relation links) override the matching
//! capability and nothing else.

use std::sync::Arc;

use serde_json::json;

use crate::columns::ColumnSpec;
use crate::commands::{Control, RelationEnds, RowCommand};
use crate::errors::GridError;
use crate::protocol::{FormPayload, SortSpec};
use crate::rows::{display_value, RawRecord, RenderRow, RowIdentity};
use crate::table::relation::RelationScope;

use super::{default_row_commands, Registry, TableBehavior};

/// Register every builtin kind into a fresh registry
pub fn registry() -> Result<Registry, GridError> {
    let mut registry = Registry::new();
    register_all(&mut registry)?;
    Ok(registry)
}

pub fn register_all(registry: &mut Registry) -> Result<(), GridError> {
    registry.register("device", Arc::new(DeviceTable))?;
    registry.register("configuration", Arc::new(ConfigurationTable))?;
    registry.register("link", Arc::new(LinkTable))?;
    registry.register("pool", Arc::new(PoolTable))?;
    registry.register("service", Arc::new(ServiceTable))?;
    registry.register("run", Arc::new(RunTable))?;
    registry.register("result", Arc::new(ResultTable { target: None, full: false }))?;
    registry.register(
        "full_result",
        Arc::new(ResultTable {
            target: Some("result"),
            full: true,
        }),
    )?;
    registry.register(
        "device_result",
        Arc::new(ResultTable {
            target: Some("result"),
            full: false,
        }),
    )?;
    registry.register("task", Arc::new(TaskTable))?;
    registry.register("user", Arc::new(UserTable))?;
    registry.register("access", Arc::new(AccessTable))?;
    registry.register("credential", Arc::new(CredentialTable))?;
    registry.register("server", Arc::new(ServerTable))?;
    registry.register("changelog", Arc::new(ChangelogTable))?;
    registry.register("session", Arc::new(SessionTable))?;
    registry.register("event", Arc::new(EventTable))?;
    Ok(())
}

/// Attach an in-grid link opening a relation-scoped table of `target_kind`
/// rows owned by this row.
fn relation_link(
    row: &mut RenderRow,
    cell_key: &str,
    target_kind: &str,
    from_key: &str,
    to_key: &str,
) {
    let mut label = target_kind.to_string();
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    label.push('s');
    let command = RowCommand::OpenRelationTable {
        target_kind: target_kind.to_string(),
        owner: row.identity.clone(),
        ends: RelationEnds::new(from_key, to_key),
    };
    row.set_link(cell_key, label, command);
}

// ─────────────────────────────────────────────────────────────────────────────
// Inventory kinds
// ─────────────────────────────────────────────────────────────────────────────

struct DeviceTable;

impl TableBehavior for DeviceTable {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text("name", "Name"),
            ColumnSpec::text("description", "Description").hidden(),
            ColumnSpec::text("ip_address", "IP Address"),
            ColumnSpec::text("vendor", "Vendor"),
            ColumnSpec::text("model", "Model"),
            ColumnSpec::text("operating_system", "Operating System").hidden(),
            ColumnSpec::text("os_version", "OS Version").hidden(),
            ColumnSpec::text("location", "Location").hidden(),
            ColumnSpec::new("port", "Port").hidden(),
            ColumnSpec::new("last_runtime", "Last Runtime").hidden(),
            ColumnSpec::new("services", "Services").not_exportable(),
            ColumnSpec::new("tasks", "Tasks").not_exportable(),
            ColumnSpec::new("pools", "Pools").not_exportable(),
        ]
    }

    fn decorate(&self, row: &mut RenderRow, _raw: &RawRecord) {
        for target in ["service", "task", "pool"] {
            relation_link(row, &format!("{}s", target), target, &format!("{}s", target), "devices");
        }
    }

    fn controls(&self) -> Vec<Control> {
        vec![
            Control::ColumnDisplay,
            Control::Refresh,
            Control::AdvancedSearch,
            Control::ClearSearch,
            Control::CopyToClipboard,
            Control::New,
            Control::BulkEdit,
            Control::Export,
            Control::RunOnAll,
            Control::BulkDelete,
        ]
    }

    fn row_commands(
        &self,
        row: &RenderRow,
        _raw: &RawRecord,
        relation: Option<&RelationScope>,
    ) -> Vec<RowCommand> {
        let identity = row.identity.clone();
        let mut commands = vec![
            RowCommand::ShowDeviceData {
                identity: identity.clone(),
            },
            RowCommand::ShowDeviceResults {
                identity: identity.clone(),
            },
            RowCommand::OpenConnection {
                identity: identity.clone(),
            },
        ];
        commands.extend(default_row_commands(row, relation));
        commands.insert(
            commands.len() - 1,
            RowCommand::Run { identity },
        );
        commands
    }
}

/// Configuration grids show device-held data, so they query the device
/// filter target rather than their own.
struct ConfigurationTable;

impl TableBehavior for ConfigurationTable {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text("name", "Name"),
            ColumnSpec::text("ip_address", "IP Address"),
            ColumnSpec::text("model", "Model").hidden(),
            ColumnSpec::new("last_runtime", "Last Runtime"),
            ColumnSpec::text("configuration", "Configuration"),
        ]
    }

    fn decorate(&self, row: &mut RenderRow, raw: &RawRecord) {
        // Success/failure values anywhere in the record become badges
        for (key, value) in raw {
            let Some(text) = value.as_str() else { continue };
            match text.to_lowercase().as_str() {
                "success" => row.set_badge(key, "Success", true),
                "failure" => row.set_badge(key, "Failure", false),
                _ => {}
            }
        }
    }

    fn controls(&self) -> Vec<Control> {
        vec![
            Control::ColumnDisplay,
            Control::ContextSlider,
            Control::Refresh,
            Control::ClearSearch,
            Control::CopyToClipboard,
            Control::BulkEdit,
            Control::Export,
            Control::BulkDelete,
        ]
    }

    fn row_commands(
        &self,
        row: &RenderRow,
        _raw: &RawRecord,
        _relation: Option<&RelationScope>,
    ) -> Vec<RowCommand> {
        let identity = row.identity.clone();
        vec![
            RowCommand::ShowDeviceData {
                identity: identity.clone(),
            },
            RowCommand::ShowGitHistory {
                identity: identity.clone(),
            },
            RowCommand::Edit { identity },
        ]
    }

    fn filter_target(&self) -> Option<&'static str> {
        Some("device")
    }
}

struct LinkTable;

impl TableBehavior for LinkTable {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text("name", "Name"),
            ColumnSpec::text("description", "Description").hidden(),
            ColumnSpec::text("subtype", "Subtype"),
            ColumnSpec::text("source_name", "Source"),
            ColumnSpec::text("destination_name", "Destination"),
            ColumnSpec::new("pools", "Pools").not_exportable(),
        ]
    }

    fn decorate(&self, row: &mut RenderRow, _raw: &RawRecord) {
        relation_link(row, "pools", "pool", "pools", "links");
    }

    fn controls(&self) -> Vec<Control> {
        vec![
            Control::ColumnDisplay,
            Control::Refresh,
            Control::AdvancedSearch,
            Control::ClearSearch,
            Control::CopyToClipboard,
            Control::New,
            Control::BulkEdit,
            Control::Export,
            Control::BulkDelete,
        ]
    }
}

struct PoolTable;

impl TableBehavior for PoolTable {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text("name", "Name"),
            ColumnSpec::text("description", "Description").hidden(),
            ColumnSpec::new("last_modified", "Last Modified").hidden(),
            ColumnSpec::boolean("never_update", "Never Update")
                .with_labels("Yes", "No")
                .hidden(),
            ColumnSpec::new("objects", "Objects").not_exportable(),
            ColumnSpec::new("devices", "Devices").not_exportable(),
            ColumnSpec::new("links", "Links").not_exportable(),
            ColumnSpec::new("services", "Services").not_exportable(),
            ColumnSpec::new("users", "Users").not_exportable(),
        ]
    }

    fn decorate(&self, row: &mut RenderRow, raw: &RawRecord) {
        let mut summary = Vec::new();
        for target in ["device", "link", "service", "user"] {
            let count = raw
                .get(&format!("{}_number", target))
                .map(display_value)
                .unwrap_or_else(|| "0".to_string());
            summary.push(format!("{} {}s", count, target));
            relation_link(row, &format!("{}s", target), target, &format!("{}s", target), "pools");
        }
        row.set_text("objects", summary.join(" - "));
    }

    fn controls(&self) -> Vec<Control> {
        vec![
            Control::ColumnDisplay,
            Control::Refresh,
            Control::AdvancedSearch,
            Control::ClearSearch,
            Control::CopyToClipboard,
            Control::New,
            Control::Export,
            Control::UpdateAllPools,
            Control::RunOnAll,
            Control::BulkDelete,
        ]
    }

    fn row_commands(
        &self,
        row: &RenderRow,
        _raw: &RawRecord,
        relation: Option<&RelationScope>,
    ) -> Vec<RowCommand> {
        let identity = row.identity.clone();
        let mut commands = vec![RowCommand::UpdatePool { id: identity.id }];
        commands.extend(default_row_commands(row, relation));
        commands.insert(commands.len() - 1, RowCommand::Run { identity });
        commands
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Automation kinds
// ─────────────────────────────────────────────────────────────────────────────

struct ServiceTable;

impl TableBehavior for ServiceTable {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text("name", "Name"),
            ColumnSpec::text("type", "Type"),
            ColumnSpec::text("description", "Description").hidden(),
            ColumnSpec::text("creator", "Creator"),
            ColumnSpec::boolean("shared", "Shared").with_labels("Shared", "Not Shared"),
            ColumnSpec::new("last_modified", "Last Modified").hidden(),
            ColumnSpec::new("devices", "Devices").not_exportable(),
            ColumnSpec::new("pools", "Pools").not_exportable(),
        ]
    }

    fn decorate(&self, row: &mut RenderRow, raw: &RawRecord) {
        // Workflows link to their own children; plain services keep their name
        if row.identity.kind == "workflow" {
            let label = raw
                .get("scoped_name")
                .map(display_value)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| row.identity.name.clone());
            row.set_link(
                "name",
                label,
                RowCommand::FilterWorkflowChildren {
                    workflow_id: row.identity.id,
                },
            );
        }
        for target in ["device", "pool"] {
            relation_link(
                row,
                &format!("{}s", target),
                target,
                &format!("target_{}s", target),
                "target_services",
            );
        }
    }

    fn controls(&self) -> Vec<Control> {
        vec![
            Control::ColumnDisplay,
            Control::HierarchyToggle,
            Control::Refresh,
            Control::AdvancedSearch,
            Control::ClearSearch,
            Control::CopyToClipboard,
            Control::New,
            Control::ImportService,
            Control::BulkEdit,
            Control::Export,
            Control::BulkDelete,
        ]
    }

    fn row_commands(
        &self,
        row: &RenderRow,
        _raw: &RawRecord,
        relation: Option<&RelationScope>,
    ) -> Vec<RowCommand> {
        let identity = row.identity.clone();
        let mut commands = vec![
            RowCommand::ShowLogs {
                identity: identity.clone(),
                runtime: None,
            },
            RowCommand::ShowResults {
                identity: identity.clone(),
                runtime: None,
            },
        ];
        commands.extend(default_row_commands(row, relation));
        let tail = commands.len() - 1;
        commands.insert(tail, RowCommand::ExportService { id: identity.id });
        commands.insert(
            commands.len() - 1,
            RowCommand::Run {
                identity: identity.clone(),
            },
        );
        commands.insert(commands.len() - 1, RowCommand::ParameterizedRun { identity });
        commands
    }

    fn periodic_refresh(&self) -> bool {
        true
    }
}

struct RunTable;

impl TableBehavior for RunTable {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text("runtime", "Runtime"),
            ColumnSpec::new("duration", "Duration").hidden(),
            ColumnSpec::text("service_name", "Service"),
            ColumnSpec::text("creator", "Creator"),
            ColumnSpec::text("status", "Status"),
            ColumnSpec::new("progress", "Progress"),
        ]
    }

    fn default_sort(&self) -> Option<SortSpec> {
        Some(SortSpec::desc("runtime"))
    }

    fn controls(&self) -> Vec<Control> {
        vec![
            Control::ColumnDisplay,
            Control::AdvancedSearch,
            Control::ClearSearch,
            Control::Refresh,
            Control::Calendar,
        ]
    }

    fn row_commands(
        &self,
        row: &RenderRow,
        raw: &RawRecord,
        _relation: Option<&RelationScope>,
    ) -> Vec<RowCommand> {
        // Logs and results open against the service that ran, not the run row
        let service = raw
            .get("service_properties")
            .and_then(|value| value.as_object())
            .map(|properties| RowIdentity {
                id: properties.get("id").and_then(|id| id.as_u64()).unwrap_or_default(),
                name: properties.get("name").map(display_value).unwrap_or_default(),
                kind: properties
                    .get("type")
                    .and_then(|kind| kind.as_str())
                    .unwrap_or("service")
                    .to_string(),
            })
            .unwrap_or_else(|| row.identity.clone());
        let runtime = raw.get("runtime").map(display_value);
        vec![
            RowCommand::ShowLogs {
                identity: service.clone(),
                runtime: runtime.clone(),
            },
            RowCommand::ShowResults {
                identity: service,
                runtime,
            },
        ]
    }

    fn prefilter(&self) -> bool {
        true
    }

    fn periodic_refresh(&self) -> bool {
        true
    }
}

/// Result grids come in three flavors sharing one shape: plain, full
/// (adds the `full_result` marker) and per-device; the derived ones query
/// the `result` filter target.
struct ResultTable {
    target: Option<&'static str>,
    full: bool,
}

impl TableBehavior for ResultTable {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text("runtime", "Runtime"),
            ColumnSpec::boolean("success", "Status").with_labels("Success", "Failure"),
            ColumnSpec::text("service_name", "Service"),
            ColumnSpec::text("device_name", "Device"),
            ColumnSpec::new("v1", "V1").not_exportable(),
            ColumnSpec::new("v2", "V2").not_exportable(),
        ]
    }

    fn default_sort(&self) -> Option<SortSpec> {
        Some(SortSpec::desc("runtime"))
    }

    fn decorate(&self, row: &mut RenderRow, raw: &RawRecord) {
        let success = raw.get("success").and_then(|value| value.as_bool()).unwrap_or(false);
        row.set_badge("success", if success { "Success" } else { "Failure" }, success);
    }

    fn controls(&self) -> Vec<Control> {
        vec![Control::Compare, Control::Refresh, Control::ClearSearch]
    }

    fn row_commands(
        &self,
        row: &RenderRow,
        _raw: &RawRecord,
        _relation: Option<&RelationScope>,
    ) -> Vec<RowCommand> {
        vec![
            RowCommand::ShowResult { id: row.identity.id },
            RowCommand::CopyResult { id: row.identity.id },
        ]
    }

    fn filter_target(&self) -> Option<&'static str> {
        self.target
    }

    fn extra_filter_payload(&self) -> FormPayload {
        let mut extra = FormPayload::new();
        if self.full {
            extra.insert("full_result".to_string(), json!(true));
        }
        extra
    }
}

struct TaskTable;

impl TableBehavior for TaskTable {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text("name", "Name"),
            ColumnSpec::text("description", "Description").hidden(),
            ColumnSpec::text("service_name", "Service"),
            ColumnSpec::boolean("is_active", "Status").with_labels("Active", "Paused"),
            ColumnSpec::new("periodicity", "Periodicity"),
            ColumnSpec::new("next_run_time", "Next Run").hidden(),
            ColumnSpec::new("devices", "Devices").not_exportable(),
            ColumnSpec::new("pools", "Pools").not_exportable(),
        ]
    }

    fn decorate(&self, row: &mut RenderRow, raw: &RawRecord) {
        let periodicity = if raw.get("scheduling_mode").and_then(|mode| mode.as_str())
            == Some("standard")
        {
            format!(
                "{} {}",
                raw.get("frequency").map(display_value).unwrap_or_default(),
                raw.get("frequency_unit").map(display_value).unwrap_or_default(),
            )
        } else {
            raw.get("crontab_expression").map(display_value).unwrap_or_default()
        };
        row.set_text("periodicity", periodicity);
        for target in ["device", "pool"] {
            relation_link(row, &format!("{}s", target), target, &format!("{}s", target), "tasks");
        }
    }

    fn controls(&self) -> Vec<Control> {
        vec![
            Control::ColumnDisplay,
            Control::Refresh,
            Control::AdvancedSearch,
            Control::ClearSearch,
            Control::Calendar,
            Control::New,
            Control::BulkEdit,
            Control::SchedulerResume,
            Control::SchedulerPause,
            Control::BulkDelete,
        ]
    }

    fn row_commands(
        &self,
        row: &RenderRow,
        raw: &RawRecord,
        relation: Option<&RelationScope>,
    ) -> Vec<RowCommand> {
        let is_active = raw.get("is_active").and_then(|value| value.as_bool()).unwrap_or(false);
        let scheduling = if is_active {
            RowCommand::PauseTask { id: row.identity.id }
        } else {
            RowCommand::ResumeTask { id: row.identity.id }
        };
        let mut commands = default_row_commands(row, relation);
        commands.insert(commands.len() - 1, scheduling);
        commands
    }

    fn periodic_refresh(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Administration kinds
// ─────────────────────────────────────────────────────────────────────────────

struct UserTable;

impl TableBehavior for UserTable {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text("name", "Name"),
            ColumnSpec::text("email", "Email"),
            ColumnSpec::text("groups", "Groups"),
            ColumnSpec::boolean("is_admin", "Admin"),
            ColumnSpec::new("pools", "Pools").not_exportable(),
        ]
    }

    fn decorate(&self, row: &mut RenderRow, _raw: &RawRecord) {
        relation_link(row, "pools", "pool", "pools", "users");
    }

    fn controls(&self) -> Vec<Control> {
        vec![
            Control::ColumnDisplay,
            Control::Refresh,
            Control::AdvancedSearch,
            Control::ClearSearch,
            Control::CopyToClipboard,
            Control::New,
            Control::BulkEdit,
            Control::Export,
            Control::BulkDelete,
        ]
    }
}

struct AccessTable;

impl TableBehavior for AccessTable {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text("name", "Name"),
            ColumnSpec::text("description", "Description").hidden(),
            ColumnSpec::text("access_type", "Access Type"),
            ColumnSpec::new("user_pools", "User Pools"),
            ColumnSpec::new("access_pools", "Access Pools"),
        ]
    }

    fn controls(&self) -> Vec<Control> {
        vec![
            Control::ColumnDisplay,
            Control::Refresh,
            Control::AdvancedSearch,
            Control::ClearSearch,
            Control::New,
            Control::Export,
            Control::BulkDelete,
        ]
    }
}

struct CredentialTable;

impl TableBehavior for CredentialTable {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text("name", "Name"),
            ColumnSpec::text("description", "Description").hidden(),
            ColumnSpec::text("subtype", "Type"),
            ColumnSpec::text("username", "Username"),
            ColumnSpec::new("priority", "Priority"),
        ]
    }

    fn controls(&self) -> Vec<Control> {
        vec![
            Control::ColumnDisplay,
            Control::Refresh,
            Control::ClearSearch,
            Control::New,
            Control::BulkEdit,
            Control::Export,
            Control::BulkDelete,
        ]
    }
}

struct ServerTable;

impl TableBehavior for ServerTable {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text("name", "Name"),
            ColumnSpec::text("description", "Description").hidden(),
            ColumnSpec::text("ip_address", "IP Address"),
            ColumnSpec::new("weight", "Weight"),
            ColumnSpec::text("status", "Status"),
        ]
    }

    fn controls(&self) -> Vec<Control> {
        vec![
            Control::ColumnDisplay,
            Control::Refresh,
            Control::ClearSearch,
            Control::New,
            Control::BulkEdit,
            Control::Export,
            Control::BulkDelete,
        ]
    }
}

struct ChangelogTable;

impl TableBehavior for ChangelogTable {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text("time", "Time"),
            ColumnSpec::text("user", "User"),
            ColumnSpec::text("severity", "Severity"),
            ColumnSpec::text("content", "Content"),
        ]
    }

    fn default_sort(&self) -> Option<SortSpec> {
        Some(SortSpec::desc("time"))
    }

    fn controls(&self) -> Vec<Control> {
        vec![
            Control::ColumnDisplay,
            Control::Refresh,
            Control::ClearSearch,
            Control::New,
            Control::Export,
        ]
    }
}

struct SessionTable;

impl TableBehavior for SessionTable {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text("name", "Name"),
            ColumnSpec::text("user", "User"),
            ColumnSpec::new("timestamp", "Timestamp"),
        ]
    }

    fn controls(&self) -> Vec<Control> {
        vec![Control::ColumnDisplay, Control::Refresh, Control::BulkDelete]
    }

    fn row_commands(
        &self,
        row: &RenderRow,
        _raw: &RawRecord,
        _relation: Option<&RelationScope>,
    ) -> Vec<RowCommand> {
        vec![RowCommand::ShowSessionLog { id: row.identity.id }]
    }
}

struct EventTable;

impl TableBehavior for EventTable {
    fn columns(&self) -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::text("name", "Name"),
            ColumnSpec::text("log_source", "Log Source"),
            ColumnSpec::text("log_content", "Log Content"),
        ]
    }

    fn controls(&self) -> Vec<Control> {
        vec![
            Control::ColumnDisplay,
            Control::Refresh,
            Control::ClearSearch,
            Control::New,
            Control::Export,
            Control::BulkDelete,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> RawRecord {
        json!({
            "id": 7,
            "name": "sample",
            "type": "device",
            "success": true,
            "is_active": true,
        })
        .as_object()
        .expect("object literal")
        .clone()
    }

    #[test]
    fn test_every_kind_registers() {
        let registry = registry().expect("builtin registration");
        for kind in [
            "device",
            "configuration",
            "link",
            "pool",
            "service",
            "run",
            "result",
            "full_result",
            "device_result",
            "task",
            "user",
            "access",
            "credential",
            "server",
            "changelog",
            "session",
            "event",
        ] {
            assert!(registry.get(kind).is_ok(), "missing kind {}", kind);
        }
    }

    #[test]
    fn test_decoration_never_drops_identity() {
        let registry = registry().expect("builtin registration");
        let raw = sample_record();
        for kind in registry.kinds() {
            let behavior = registry.get(kind).unwrap();
            let mut row = RenderRow::from_raw(kind, &raw);
            behavior.decorate(&mut row, &raw);
            assert_eq!(row.identity.id, 7, "kind {}", kind);
            assert_eq!(row.identity.name, "sample", "kind {}", kind);
            assert!(!row.identity.kind.is_empty(), "kind {}", kind);
        }
    }

    #[test]
    fn test_audit_kinds_sort_reverse_chronological() {
        let registry = registry().expect("builtin registration");
        for kind in ["run", "result", "full_result", "device_result"] {
            let sort = registry.get(kind).unwrap().default_sort().expect(kind);
            assert_eq!(sort.column, "runtime");
        }
        let changelog = registry.get("changelog").unwrap().default_sort().unwrap();
        assert_eq!(changelog.column, "time");
    }

    #[test]
    fn test_configuration_queries_device_target() {
        let registry = registry().expect("builtin registration");
        assert_eq!(
            registry.get("configuration").unwrap().filter_target(),
            Some("device")
        );
        assert_eq!(
            registry.get("full_result").unwrap().filter_target(),
            Some("result")
        );
    }

    #[test]
    fn test_full_result_marker() {
        let registry = registry().expect("builtin registration");
        let extra = registry.get("full_result").unwrap().extra_filter_payload();
        assert_eq!(extra.get("full_result"), Some(&json!(true)));
        assert!(registry.get("result").unwrap().extra_filter_payload().is_empty());
    }

    #[test]
    fn test_periodic_kinds() {
        let registry = registry().expect("builtin registration");
        for kind in ["run", "service", "task"] {
            assert!(registry.get(kind).unwrap().periodic_refresh(), "{}", kind);
        }
        assert!(!registry.get("device").unwrap().periodic_refresh());
    }

    #[test]
    fn test_relation_scope_swaps_delete_for_removal() {
        let registry = registry().expect("builtin registration");
        let behavior = registry.get("device").unwrap();
        let raw = sample_record();
        let row = RenderRow::from_raw("device", &raw);

        let top_level = behavior.row_commands(&row, &raw, None);
        assert!(top_level
            .iter()
            .any(|command| command.name() == "delete"));

        let scope = RelationScope {
            from_key: "devices".to_string(),
            to_key: "pools".to_string(),
            owner_id: 3,
            owner_name: "edge".to_string(),
            owner_kind: "pool".to_string(),
        };
        let scoped = behavior.row_commands(&row, &raw, Some(&scope));
        assert!(scoped
            .iter()
            .any(|command| command.name() == "remove_from_relation"));
        assert!(!scoped.iter().any(|command| command.name() == "delete"));
    }

    #[test]
    fn test_task_periodicity_cell() {
        let registry = registry().expect("builtin registration");
        let behavior = registry.get("task").unwrap();
        let raw = json!({
            "id": 1,
            "name": "backup",
            "scheduling_mode": "standard",
            "frequency": 30,
            "frequency_unit": "minutes",
        })
        .as_object()
        .unwrap()
        .clone();
        let mut row = RenderRow::from_raw("task", &raw);
        behavior.decorate(&mut row, &raw);
        assert_eq!(row.cell_text("periodicity"), Some("30 minutes"));

        let cron = json!({
            "id": 2,
            "name": "sync",
            "scheduling_mode": "crontab",
            "crontab_expression": "*/5 * * * *",
        })
        .as_object()
        .unwrap()
        .clone();
        let mut row = RenderRow::from_raw("task", &cron);
        behavior.decorate(&mut row, &cron);
        assert_eq!(row.cell_text("periodicity"), Some("*/5 * * * *"));
    }

    #[test]
    fn test_configuration_status_badges() {
        let registry = registry().expect("builtin registration");
        let behavior = registry.get("configuration").unwrap();
        let raw = json!({"id": 1, "name": "r1", "backup": "Success", "sync": "FAILURE"})
            .as_object()
            .unwrap()
            .clone();
        let mut row = RenderRow::from_raw("configuration", &raw);
        behavior.decorate(&mut row, &raw);
        assert_eq!(row.cell_text("backup"), Some("Success"));
        assert_eq!(row.cell_text("sync"), Some("Failure"));
    }
}
