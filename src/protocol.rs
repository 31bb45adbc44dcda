//! Wire types for the query and bulk protocols
//!
//! One query shape serves every table kind; the entity-specific endpoint is
//! selected by the kind's filter target (`POST /filtering/{target}`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::columns::SearchMode;
use crate::rows::RawRecord;

/// Serialized search form: column values, per-column match modes, relation
/// selections and any extra control fields, exactly as a DOM form would
/// serialize
pub type FormPayload = serde_json::Map<String, Value>;

/// Server-evaluated equality constraints scoping the visible rows
/// (relation tables send `{to_key: [owner_id]}`)
pub type ConstraintMap = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Requested ordering; the server is authoritative for the actual order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: SortDirection::Desc,
        }
    }
}

/// Column projection included in each query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireColumn {
    pub key: String,
    pub visible: bool,
    pub search: SearchMode,
}

/// Body of `POST /filtering/{target}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterQuery {
    /// The requesting table kind (may differ from the endpoint target)
    #[serde(rename = "type")]
    pub kind: String,
    pub form: FormPayload,
    pub constraints: ConstraintMap,
    pub columns: Vec<WireColumn>,
    pub page: u64,
    pub page_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,
    /// Ask for the full unpaginated result set alongside the page
    pub export: bool,
    /// Same, but as a clipboard text payload
    pub clipboard: bool,
    pub prefilter: bool,
    /// Type-specific additions (`full_result` grids add their marker here)
    #[serde(flatten)]
    pub extra: FormPayload,
}

/// Unpaginated payload attached when export or clipboard was requested:
/// full rows for export, joined text for clipboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FullResult {
    Rows(Vec<RawRecord>),
    Text(String),
}

/// Response of `POST /filtering/{target}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterReply {
    #[serde(default)]
    pub data: Vec<RawRecord>,
    #[serde(default)]
    pub records_total: u64,
    #[serde(default)]
    pub records_filtered: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_result: Option<FullResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FilterReply {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Response of every bulk endpoint: how many rows the operation touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReply {
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_serializes_kind_and_extra_flat() {
        let mut extra = FormPayload::new();
        extra.insert("full_result".to_string(), json!(true));
        let query = FilterQuery {
            kind: "result".to_string(),
            form: FormPayload::new(),
            constraints: ConstraintMap::new(),
            columns: vec![],
            page: 0,
            page_size: 25,
            sort: Some(SortSpec::desc("runtime")),
            export: false,
            clipboard: false,
            prefilter: false,
            extra,
        };
        let value = serde_json::to_value(&query).expect("serialize");
        assert_eq!(value["type"], "result");
        assert_eq!(value["full_result"], true);
        assert_eq!(value["sort"]["direction"], "desc");
    }

    #[test]
    fn test_reply_with_error_only() {
        let reply: FilterReply =
            serde_json::from_value(json!({"error": "bad regex"})).expect("deserialize");
        assert_eq!(reply.error.as_deref(), Some("bad regex"));
        assert!(reply.data.is_empty());
    }

    #[test]
    fn test_full_result_rows_vs_text() {
        let rows: FilterReply = serde_json::from_value(json!({
            "data": [],
            "full_result": [{"id": 1, "name": "r1"}],
        }))
        .expect("deserialize");
        assert!(matches!(rows.full_result, Some(FullResult::Rows(ref r)) if r.len() == 1));

        let text: FilterReply = serde_json::from_value(json!({
            "data": [],
            "full_result": "a,b,c",
        }))
        .expect("deserialize");
        assert!(matches!(text.full_result, Some(FullResult::Text(ref t)) if t == "a,b,c"));
    }
}
