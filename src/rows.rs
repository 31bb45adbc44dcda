//! Row model: raw server records decorated into renderable rows
//!
//! Every decorated row carries an identity payload `{id, name, kind}` for
//! downstream action bindings, regardless of what the type-specific
//! decorator does to the cells.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::columns::RuntimeColumn;
use crate::commands::RowCommand;

/// A record exactly as the query protocol returned it
pub type RawRecord = serde_json::Map<String, Value>;

/// Identity payload attached to every decorated row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIdentity {
    pub id: u64,
    /// Display name (`dbName` when the server provides one, else `name`)
    pub name: String,
    /// The record's own type tag, which may be more specific than the
    /// table kind (a workflow row in the service table)
    pub kind: String,
}

/// One rendered cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cell", rename_all = "snake_case")]
pub enum Cell {
    Text { value: String },
    /// Status badge (success/failure styling is the presenter's concern)
    Badge { label: String, success: bool },
    /// In-grid link bound to a structured command
    Link { label: String, command: RowCommand },
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text {
            value: value.into(),
        }
    }

    /// The label a presenter would show for this cell
    pub fn label(&self) -> &str {
        match self {
            Cell::Text { value } => value,
            Cell::Badge { label, .. } => label,
            Cell::Link { label, .. } => label,
        }
    }
}

/// A raw record decorated for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderRow {
    pub identity: RowIdentity,
    pub cells: BTreeMap<String, Cell>,
    /// Row actions, in display order
    pub commands: Vec<RowCommand>,
}

impl RenderRow {
    /// Identity injection plus a text cell per scalar field. Type-specific
    /// decoration runs on top of this.
    pub fn from_raw(table_kind: &str, raw: &RawRecord) -> Self {
        let id = raw.get("id").and_then(Value::as_u64).unwrap_or_default();
        let name = raw
            .get("dbName")
            .or_else(|| raw.get("name"))
            .map(display_value)
            .unwrap_or_default();
        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(table_kind)
            .to_string();

        let mut cells = BTreeMap::new();
        for (key, value) in raw {
            cells.insert(key.clone(), Cell::text(display_value(value)));
        }

        Self {
            identity: RowIdentity { id, name, kind },
            cells,
            commands: Vec::new(),
        }
    }

    pub fn set_text(&mut self, key: &str, value: impl Into<String>) {
        self.cells.insert(key.to_string(), Cell::text(value));
    }

    pub fn set_badge(&mut self, key: &str, label: impl Into<String>, success: bool) {
        self.cells.insert(
            key.to_string(),
            Cell::Badge {
                label: label.into(),
                success,
            },
        );
    }

    pub fn set_link(&mut self, key: &str, label: impl Into<String>, command: RowCommand) {
        self.cells.insert(
            key.to_string(),
            Cell::Link {
                label: label.into(),
                command,
            },
        );
    }

    pub fn cell_text(&self, key: &str) -> Option<&str> {
        self.cells.get(key).map(Cell::label)
    }
}

/// One page of decorated rows, as handed to the rendering collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderedPage {
    /// Currently visible columns, in declaration order
    pub columns: Vec<RuntimeColumn>,
    pub rows: Vec<RenderRow>,
    pub page: u64,
    pub page_size: u64,
    pub records_total: u64,
    pub records_filtered: u64,
}

impl RenderedPage {
    pub fn page_count(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.records_filtered.div_ceil(self.page_size)
    }
}

/// Flatten a JSON value to the string a cell displays. Arrays are
/// comma-joined; nested objects are not displayable and render empty.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        value.as_object().expect("object literal").clone()
    }

    #[test]
    fn test_identity_injection() {
        let record = raw(json!({"id": 12, "name": "core-switch", "type": "device"}));
        let row = RenderRow::from_raw("device", &record);
        assert_eq!(
            row.identity,
            RowIdentity {
                id: 12,
                name: "core-switch".to_string(),
                kind: "device".to_string(),
            }
        );
    }

    #[test]
    fn test_db_name_wins_over_name() {
        let record = raw(json!({"id": 3, "name": "scoped", "dbName": "full/scoped"}));
        let row = RenderRow::from_raw("service", &record);
        assert_eq!(row.identity.name, "full/scoped");
    }

    #[test]
    fn test_record_type_overrides_table_kind() {
        let record = raw(json!({"id": 5, "name": "w", "type": "workflow"}));
        let row = RenderRow::from_raw("service", &record);
        assert_eq!(row.identity.kind, "workflow");
    }

    #[test]
    fn test_scalar_cells_and_array_join() {
        let record = raw(json!({"id": 1, "name": "r1", "pools": [4, 7]}));
        let row = RenderRow::from_raw("device", &record);
        assert_eq!(row.cell_text("pools"), Some("4,7"));
        assert_eq!(row.cell_text("id"), Some("1"));
    }

    #[test]
    fn test_page_count_rounds_up() {
        let page = RenderedPage {
            records_filtered: 26,
            page_size: 25,
            ..Default::default()
        };
        assert_eq!(page.page_count(), 2);
    }
}
