//! Export engine
//!
//! Serializes the full unpaginated result set to a quoted CSV, keeping only
//! columns that are both currently visible and exportable, in declaration
//! order. The clipboard variant joins the server-provided text payload or
//! the row names.

use crate::columns::RuntimeColumn;
use crate::protocol::FullResult;
use crate::rows::{display_value, RawRecord};

/// Keys eligible for export: visible AND exportable, declaration order
fn export_keys(columns: &[RuntimeColumn]) -> Vec<&str> {
    columns
        .iter()
        .filter(|column| column.visible && column.spec.exportable)
        .map(|column| column.spec.key.as_str())
        .collect()
}

/// Header line plus one quoted line per record
pub(super) fn build_csv(columns: &[RuntimeColumn], rows: &[RawRecord]) -> String {
    let keys = export_keys(columns);
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(keys.join(","));
    for row in rows {
        let cells: Vec<String> = keys
            .iter()
            .map(|key| quote(&row.get(*key).map(display_value).unwrap_or_default()))
            .collect();
        lines.push(cells.join(","));
    }
    lines.join("\n")
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Text handed to the clipboard collaborator
pub(super) fn clipboard_text(full: &FullResult) -> String {
    match full {
        FullResult::Text(text) => text.clone(),
        FullResult::Rows(rows) => rows
            .iter()
            .map(|row| row.get("name").map(display_value).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(","),
    }
}
