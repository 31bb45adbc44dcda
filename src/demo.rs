//! Demo mode: an in-process reference server for the grid protocols
//!
//! Serves `/filtering/{target}` and the three bulk endpoints over a seeded
//! in-memory dataset, with real inclusion/equality/regex evaluation, so the
//! console runs standalone and the protocol semantics have an executable
//! reference.
//!
//! Run with: opsgrid --demo

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Duration as ChronoDuration, Utc};
use regex::Regex;
use serde_json::{json, Value};

use crate::columns::MatchMode;
use crate::protocol::{BulkReply, FilterQuery, FilterReply, FormPayload, FullResult};
use crate::rows::{display_value, RawRecord};

/// Error string returned when a regex search parameter fails to compile
pub const INVALID_REGEX_ERROR: &str = "Invalid regular expression as search parameter.";

/// In-memory dataset, one row list per entity kind
pub struct DemoState {
    tables: Mutex<HashMap<String, Vec<RawRecord>>>,
}

pub fn router(state: Arc<DemoState>) -> Router {
    Router::new()
        .route("/filtering/:target", post(filtering))
        .route("/bulk_deletion/:kind", post(bulk_deletion))
        .route(
            "/bulk_removal/:kind/:owner_kind/:owner_id/:to_key/:from_key",
            post(bulk_removal),
        )
        .route("/bulk_edit/:kind", post(bulk_edit))
        .with_state(state)
}

/// Serve the demo dataset on an already-bound listener
pub async fn serve(listener: tokio::net::TcpListener, state: Arc<DemoState>) -> anyhow::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "demo server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn filtering(
    State(state): State<Arc<DemoState>>,
    Path(target): Path<String>,
    Json(query): Json<FilterQuery>,
) -> Json<FilterReply> {
    Json(state.filtering(&target, &query))
}

async fn bulk_deletion(
    State(state): State<Arc<DemoState>>,
    Path(kind): Path<String>,
    Json(form): Json<FormPayload>,
) -> Json<BulkReply> {
    Json(BulkReply {
        count: state.bulk_deletion(&kind, &form),
    })
}

async fn bulk_removal(
    State(state): State<Arc<DemoState>>,
    Path((kind, owner_kind, owner_id, to_key, from_key)): Path<(
        String,
        String,
        u64,
        String,
        String,
    )>,
    Json(form): Json<FormPayload>,
) -> Json<BulkReply> {
    Json(BulkReply {
        count: state.bulk_removal(&kind, &owner_kind, owner_id, &to_key, &from_key, &form),
    })
}

async fn bulk_edit(
    State(state): State<Arc<DemoState>>,
    Path(kind): Path<String>,
    Json(form): Json<FormPayload>,
) -> Json<BulkReply> {
    Json(BulkReply {
        count: state.bulk_edit(&kind, &form),
    })
}

impl DemoState {
    pub fn filtering(&self, target: &str, query: &FilterQuery) -> FilterReply {
        let tables = self.tables.lock().expect("demo tables poisoned");
        let rows = tables.get(target).cloned().unwrap_or_default();
        let records_total = rows.len() as u64;

        let searchable: HashSet<&str> = query
            .columns
            .iter()
            .map(|column| column.key.as_str())
            .collect();
        let mut filtered = Vec::new();
        for row in &rows {
            match row_matches(row, &query.form, Some(&searchable)) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(_) => return FilterReply::error(INVALID_REGEX_ERROR),
            }
            if !constraints_match(row, &query.constraints) {
                continue;
            }
            filtered.push(row.clone());
        }

        if let Some(sort) = &query.sort {
            let column = sort.column.clone();
            filtered.sort_by(|a, b| {
                let left = a.get(&column).map(display_value).unwrap_or_default();
                let right = b.get(&column).map(display_value).unwrap_or_default();
                left.cmp(&right)
            });
            if sort.direction == crate::protocol::SortDirection::Desc {
                filtered.reverse();
            }
        }

        let records_filtered = filtered.len() as u64;
        let start = (query.page * query.page_size) as usize;
        let data: Vec<RawRecord> = filtered
            .iter()
            .skip(start)
            .take(query.page_size.max(1) as usize)
            .cloned()
            .collect();

        let full_result = if query.export {
            Some(FullResult::Rows(filtered.clone()))
        } else if query.clipboard {
            let names = filtered
                .iter()
                .map(|row| row.get("name").map(display_value).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(",");
            Some(FullResult::Text(names))
        } else {
            None
        };

        FilterReply {
            data,
            records_total,
            records_filtered,
            full_result,
            error: None,
        }
    }

    pub fn bulk_deletion(&self, kind: &str, form: &FormPayload) -> u64 {
        let mut tables = self.tables.lock().expect("demo tables poisoned");
        let Some(rows) = tables.get_mut(kind) else {
            return 0;
        };
        let before = rows.len();
        rows.retain(|row| !row_matches(row, form, None).unwrap_or(false));
        (before - rows.len()) as u64
    }

    pub fn bulk_removal(
        &self,
        kind: &str,
        owner_kind: &str,
        owner_id: u64,
        to_key: &str,
        from_key: &str,
        form: &FormPayload,
    ) -> u64 {
        let mut tables = self.tables.lock().expect("demo tables poisoned");
        let mut removed_ids = Vec::new();

        if let Some(rows) = tables.get_mut(kind) {
            for row in rows.iter_mut() {
                if !row_matches(row, form, None).unwrap_or(false) {
                    continue;
                }
                if !id_list(row.get(to_key)).contains(&owner_id) {
                    continue;
                }
                if let Some(id) = row.get("id").and_then(Value::as_u64) {
                    removed_ids.push(id);
                }
                if let Some(Value::Array(owners)) = row.get_mut(to_key) {
                    owners.retain(|value| value.as_u64() != Some(owner_id));
                }
            }
        }

        // Mirror the removal on the owner side of the relation
        if let Some(owners) = tables.get_mut(owner_kind) {
            for owner in owners.iter_mut() {
                if owner.get("id").and_then(Value::as_u64) != Some(owner_id) {
                    continue;
                }
                if let Some(Value::Array(members)) = owner.get_mut(from_key) {
                    members.retain(|value| {
                        value
                            .as_u64()
                            .map(|id| !removed_ids.contains(&id))
                            .unwrap_or(true)
                    });
                }
            }
        }

        removed_ids.len() as u64
    }

    pub fn bulk_edit(&self, kind: &str, form: &FormPayload) -> u64 {
        let mut tables = self.tables.lock().expect("demo tables poisoned");
        let Some(rows) = tables.get_mut(kind) else {
            return 0;
        };

        // Only fields whose bulk-edit checkbox is set are applied
        let edits: Vec<(&String, &Value)> = form
            .iter()
            .filter(|(key, _)| !key.starts_with("bulk-edit-") && *key != "id")
            .filter(|(key, _)| {
                form.get(&format!("bulk-edit-{}", key))
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            })
            .collect();

        let ids: Option<Vec<u64>> = form.get("id").and_then(Value::as_str).map(|joined| {
            joined
                .split('-')
                .filter_map(|id| id.parse::<u64>().ok())
                .collect()
        });

        let mut count = 0;
        for row in rows.iter_mut() {
            if let Some(ids) = &ids {
                let row_id = row.get("id").and_then(Value::as_u64).unwrap_or_default();
                if !ids.contains(&row_id) {
                    continue;
                }
            }
            for (key, value) in &edits {
                row.insert((*key).clone(), (*value).clone());
            }
            count += 1;
        }
        count
    }
}

/// Evaluate the serialized search form against one row, per the shared
/// filter semantics: `bool-true`/`bool-false` selections, id-list
/// intersections, and text matching under the column's match mode.
/// `searchable` restricts which form keys count as columns; without it
/// (bulk endpoints) any key present on the row applies.
fn row_matches(
    row: &RawRecord,
    form: &FormPayload,
    searchable: Option<&HashSet<&str>>,
) -> Result<bool, regex::Error> {
    for (key, value) in form {
        if key.ends_with("_filter") {
            continue;
        }
        if let Some(columns) = searchable {
            if !columns.contains(key.as_str()) {
                continue;
            }
        } else if !row.contains_key(key) {
            continue;
        }

        match value {
            Value::Array(ids) => {
                let wanted: Vec<u64> = ids.iter().filter_map(Value::as_u64).collect();
                if wanted.is_empty() {
                    continue;
                }
                let members = id_list(row.get(key));
                if !wanted.iter().any(|id| members.contains(id)) {
                    return Ok(false);
                }
            }
            Value::String(text) if text == "bool-true" || text == "bool-false" => {
                let expected = text == "bool-true";
                if row.get(key).and_then(Value::as_bool) != Some(expected) {
                    return Ok(false);
                }
            }
            other => {
                let needle = display_value(other);
                if needle.is_empty() {
                    continue;
                }
                let mode = form
                    .get(&format!("{}_filter", key))
                    .and_then(Value::as_str)
                    .and_then(MatchMode::parse)
                    .unwrap_or_default();
                let cell = row.get(key).map(display_value).unwrap_or_default();
                if !match_text(&cell, &needle, mode)? {
                    return Ok(false);
                }
            }
        }
    }
    Ok(true)
}

fn match_text(cell: &str, needle: &str, mode: MatchMode) -> Result<bool, regex::Error> {
    Ok(match mode {
        MatchMode::Inclusion => cell.contains(needle),
        MatchMode::Equality => cell == needle,
        MatchMode::Regex => Regex::new(needle)?.is_match(cell),
    })
}

/// Relation constraints: the row's id list must contain at least one of
/// the required ids
fn constraints_match(row: &RawRecord, constraints: &FormPayload) -> bool {
    for (key, value) in constraints {
        let wanted = id_list(Some(value));
        if wanted.is_empty() {
            continue;
        }
        let members = id_list(row.get(key));
        if !wanted.iter().any(|id| members.contains(id)) {
            return false;
        }
    }
    true
}

fn id_list(value: Option<&Value>) -> Vec<u64> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_u64).collect(),
        Some(Value::Number(number)) => number.as_u64().into_iter().collect(),
        _ => Vec::new(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Seeded dataset
// ─────────────────────────────────────────────────────────────────────────────

impl DemoState {
    /// A small but fully-relational network: every registered kind renders
    pub fn seeded() -> Self {
        let mut tables: HashMap<String, Vec<RawRecord>> = HashMap::new();
        tables.insert("device".to_string(), seed_devices());
        tables.insert("link".to_string(), seed_links());
        tables.insert("pool".to_string(), seed_pools());
        tables.insert("service".to_string(), seed_services());
        tables.insert("run".to_string(), seed_runs());
        tables.insert("result".to_string(), seed_results());
        tables.insert("task".to_string(), seed_tasks());
        tables.insert("user".to_string(), seed_users());
        tables.insert("access".to_string(), seed_access());
        tables.insert("credential".to_string(), seed_credentials());
        tables.insert("server".to_string(), seed_servers());
        tables.insert("changelog".to_string(), seed_changelog());
        tables.insert("session".to_string(), seed_sessions());
        tables.insert("event".to_string(), seed_events());
        Self {
            tables: Mutex::new(tables),
        }
    }
}

fn rows(values: Vec<Value>) -> Vec<RawRecord> {
    values
        .into_iter()
        .filter_map(|value| value.as_object().cloned())
        .collect()
}

fn timestamp(minutes_ago: i64) -> String {
    (Utc::now() - ChronoDuration::minutes(minutes_ago))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn seed_devices() -> Vec<RawRecord> {
    let vendors = [
        "Cisco", "Juniper", "Arista", "Cisco", "Juniper", "Arista", "Cisco", "Cisco",
    ];
    let models = [
        "ISR4451", "MX204", "7280R", "C9300", "EX4650", "7050X", "ASR1001", "C9500",
    ];
    let systems = [
        "ios-xe", "junos", "eos", "ios-xe", "junos", "eos", "ios-xe", "ios-xe",
    ];
    (1..=8u64)
        .map(|id| {
            let index = (id - 1) as usize;
            json!({
                "id": id,
                "name": format!("edge-router-{}", id),
                "type": "device",
                "description": format!("{} access device", vendors[index]),
                "ip_address": format!("10.1.0.{}", id),
                "vendor": vendors[index],
                "model": models[index],
                "operating_system": systems[index],
                "os_version": "17.3",
                "location": if id % 2 == 0 { "fra1" } else { "ams2" },
                "port": 22,
                "last_runtime": timestamp(40 + id as i64),
                "configuration": format!("hostname edge-router-{}\ninterface Gi0/0", id),
                "pools": if id <= 3 { json!([1]) } else { json!([2]) },
                "services": json!([1, 2]),
                "tasks": json!([1]),
            })
        })
        .filter_map(|value| value.as_object().cloned())
        .collect()
}

fn seed_links() -> Vec<RawRecord> {
    rows(vec![
        json!({"id": 1, "name": "core-uplink-1", "type": "link", "subtype": "ethernet",
               "description": "core to edge", "source_name": "edge-router-1",
               "destination_name": "edge-router-2", "pools": [1]}),
        json!({"id": 2, "name": "core-uplink-2", "type": "link", "subtype": "ethernet",
               "description": "core to edge", "source_name": "edge-router-3",
               "destination_name": "edge-router-4", "pools": [1]}),
        json!({"id": 3, "name": "dci-span", "type": "link", "subtype": "optical",
               "description": "datacenter interconnect", "source_name": "edge-router-5",
               "destination_name": "edge-router-6", "pools": [2]}),
        json!({"id": 4, "name": "oob-mgmt", "type": "link", "subtype": "serial",
               "description": "out of band", "source_name": "edge-router-7",
               "destination_name": "edge-router-8", "pools": []}),
    ])
}

fn seed_pools() -> Vec<RawRecord> {
    rows(vec![
        json!({"id": 1, "name": "amsterdam", "type": "pool", "description": "ams2 estate",
               "last_modified": timestamp(600), "never_update": false,
               "device_number": 3, "link_number": 2, "service_number": 2, "user_number": 1,
               "devices": [1, 2, 3], "links": [1, 2], "services": [1, 2], "users": [1]}),
        json!({"id": 2, "name": "frankfurt", "type": "pool", "description": "fra1 estate",
               "last_modified": timestamp(300), "never_update": false,
               "device_number": 5, "link_number": 1, "service_number": 1, "user_number": 1,
               "devices": [4, 5, 6, 7, 8], "links": [3], "services": [2], "users": [2]}),
        json!({"id": 3, "name": "lab", "type": "pool", "description": "manually curated lab",
               "last_modified": timestamp(60), "never_update": true,
               "device_number": 0, "link_number": 0, "service_number": 0, "user_number": 1,
               "devices": [], "links": [], "services": [], "users": [3]}),
    ])
}

fn seed_services() -> Vec<RawRecord> {
    rows(vec![
        json!({"id": 1, "name": "configuration-backup", "type": "netmiko_service",
               "scoped_name": "configuration-backup", "creator": "admin", "shared": true,
               "description": "nightly backup", "last_modified": timestamp(900),
               "target_devices": [1, 2, 3], "target_pools": [1]}),
        json!({"id": 2, "name": "os-upgrade", "type": "workflow",
               "scoped_name": "maintenance/os-upgrade", "creator": "admin", "shared": false,
               "description": "staged upgrade workflow", "last_modified": timestamp(400),
               "target_devices": [4, 5], "target_pools": [2]}),
        json!({"id": 3, "name": "ping-sweep", "type": "napalm_service",
               "scoped_name": "ping-sweep", "creator": "operator", "shared": true,
               "description": "reachability check", "last_modified": timestamp(120),
               "target_devices": [1, 4, 7], "target_pools": []}),
        json!({"id": 4, "name": "interface-audit", "type": "netconf_service",
               "scoped_name": "maintenance/interface-audit", "creator": "operator",
               "shared": false, "description": "", "last_modified": timestamp(30),
               "target_devices": [], "target_pools": [1, 2]}),
    ])
}

fn seed_runs() -> Vec<RawRecord> {
    let statuses = ["Success", "Success", "Running", "Failure", "Success", "Running"];
    (1..=6u64)
        .map(|id| {
            let service_id = 1 + (id % 3);
            json!({
                "id": id,
                "name": format!("run-{}", id),
                "type": "run",
                "runtime": timestamp(90 - 12 * id as i64),
                "duration": "0:02:14",
                "service_name": format!("service-{}", service_id),
                "creator": "scheduler",
                "status": statuses[(id - 1) as usize],
                "progress": format!("{}/8", id.min(8)),
                "service_properties": {
                    "id": service_id,
                    "name": format!("service-{}", service_id),
                    "type": "netmiko_service",
                },
            })
        })
        .filter_map(|value| value.as_object().cloned())
        .collect()
}

fn seed_results() -> Vec<RawRecord> {
    (1..=6u64)
        .map(|id| {
            json!({
                "id": id,
                "name": format!("result-{}", id),
                "type": "result",
                "runtime": timestamp(90 - 12 * id as i64),
                "success": id % 4 != 0,
                "service_name": format!("service-{}", 1 + (id % 3)),
                "device_name": format!("edge-router-{}", 1 + (id % 8)),
            })
        })
        .filter_map(|value| value.as_object().cloned())
        .collect()
}

fn seed_tasks() -> Vec<RawRecord> {
    rows(vec![
        json!({"id": 1, "name": "nightly-backup", "type": "task", "description": "",
               "service_name": "configuration-backup", "is_active": true,
               "scheduling_mode": "standard", "frequency": 24, "frequency_unit": "hours",
               "next_run_time": timestamp(-60), "devices": [1, 2, 3], "pools": [1]}),
        json!({"id": 2, "name": "weekly-audit", "type": "task", "description": "",
               "service_name": "interface-audit", "is_active": false,
               "scheduling_mode": "crontab", "crontab_expression": "0 4 * * 6",
               "next_run_time": timestamp(-1440), "devices": [], "pools": [2]}),
        json!({"id": 3, "name": "reachability", "type": "task", "description": "",
               "service_name": "ping-sweep", "is_active": true,
               "scheduling_mode": "standard", "frequency": 5, "frequency_unit": "minutes",
               "next_run_time": timestamp(-5), "devices": [4, 5], "pools": []}),
    ])
}

fn seed_users() -> Vec<RawRecord> {
    rows(vec![
        json!({"id": 1, "name": "admin", "type": "user", "email": "admin@example.net",
               "groups": "administrators", "is_admin": true, "pools": [1]}),
        json!({"id": 2, "name": "operator", "type": "user", "email": "ops@example.net",
               "groups": "operations", "is_admin": false, "pools": [2]}),
        json!({"id": 3, "name": "auditor", "type": "user", "email": "audit@example.net",
               "groups": "readonly", "is_admin": false, "pools": [3]}),
    ])
}

fn seed_access() -> Vec<RawRecord> {
    rows(vec![
        json!({"id": 1, "name": "ops-full", "type": "access", "description": "",
               "access_type": "read-write", "user_pools": [2], "access_pools": [1, 2]}),
        json!({"id": 2, "name": "audit-read", "type": "access", "description": "",
               "access_type": "read", "user_pools": [3], "access_pools": [1, 2, 3]}),
    ])
}

fn seed_credentials() -> Vec<RawRecord> {
    rows(vec![
        json!({"id": 1, "name": "tacacs-prod", "type": "credential", "description": "",
               "subtype": "password", "username": "svc-enms", "priority": 10}),
        json!({"id": 2, "name": "lab-keys", "type": "credential", "description": "",
               "subtype": "ssh-key", "username": "lab", "priority": 1}),
    ])
}

fn seed_servers() -> Vec<RawRecord> {
    rows(vec![
        json!({"id": 1, "name": "app-1", "type": "server", "description": "primary",
               "ip_address": "172.16.0.10", "weight": 2, "status": "up"}),
        json!({"id": 2, "name": "app-2", "type": "server", "description": "standby",
               "ip_address": "172.16.0.11", "weight": 1, "status": "down"}),
    ])
}

fn seed_changelog() -> Vec<RawRecord> {
    let entries = [
        ("admin", "info", "CREATE device edge-router-8"),
        ("admin", "info", "UPDATE pool amsterdam"),
        ("operator", "warning", "UPDATE service ping-sweep"),
        ("admin", "info", "DELETE link legacy-span"),
        ("scheduler", "info", "Task nightly-backup started"),
        ("scheduler", "error", "Run run-4 failed"),
        ("operator", "info", "UPDATE device edge-router-2"),
        ("admin", "info", "CREATE user auditor"),
    ];
    entries
        .iter()
        .enumerate()
        .map(|(index, (user, severity, content))| {
            json!({
                "id": (index + 1) as u64,
                "name": format!("changelog-{}", index + 1),
                "type": "changelog",
                "time": timestamp(12 * (index as i64 + 1)),
                "user": user,
                "severity": severity,
                "content": content,
            })
        })
        .filter_map(|value| value.as_object().cloned())
        .collect()
}

fn seed_sessions() -> Vec<RawRecord> {
    rows(vec![
        json!({"id": 1, "name": "ssh-edge-router-1", "type": "session", "user": "operator",
               "timestamp": timestamp(25)}),
        json!({"id": 2, "name": "ssh-edge-router-4", "type": "session", "user": "admin",
               "timestamp": timestamp(5)}),
    ])
}

fn seed_events() -> Vec<RawRecord> {
    rows(vec![
        json!({"id": 1, "name": "syslog-bgp-flap", "type": "event", "log_source": "10.1.0.3",
               "log_content": "BGP-5-ADJCHANGE neighbor down"}),
        json!({"id": 2, "name": "syslog-config", "type": "event", "log_source": "10.1.0.7",
               "log_content": "SYS-5-CONFIG_I configured from console"}),
    ])
}
