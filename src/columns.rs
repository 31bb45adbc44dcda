//! Column model: per-kind column declarations and their runtime visibility
//!
//! `ColumnSpec` is the immutable declaration owned by a table type; each
//! mounted instance works on a `RuntimeColumn` copy whose visibility merges
//! the per-kind persisted record with the declaration defaults.

use serde::{Deserialize, Serialize};

/// How a column participates in per-column search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Not searchable (derived/relation columns)
    #[default]
    None,
    /// Free-text input, debounced, with a match-mode selector
    Text,
    /// Discrete true/false/any selector, fetches immediately
    Bool,
}

/// Match mode attached to a text-search column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Substring containment (server default)
    #[default]
    Inclusion,
    /// Exact equality
    Equality,
    /// Server-evaluated regular expression
    Regex,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Inclusion => "inclusion",
            MatchMode::Equality => "equality",
            MatchMode::Regex => "regex",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "inclusion" => Some(MatchMode::Inclusion),
            "equality" => Some(MatchMode::Equality),
            "regex" => Some(MatchMode::Regex),
            _ => None,
        }
    }
}

/// Display labels for the two branches of a bool-search column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoolLabels {
    pub when_true: String,
    pub when_false: String,
}

impl BoolLabels {
    pub fn new(when_true: &str, when_false: &str) -> Self {
        Self {
            when_true: when_true.to_string(),
            when_false: when_false.to_string(),
        }
    }
}

/// Declaration of one grid column. Declaration order is display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Unique key within the table kind; matches the record field it renders
    pub key: String,
    /// Header title
    pub title: String,
    #[serde(default)]
    pub search: SearchMode,
    /// Visibility applied when no per-kind record exists
    pub visible_by_default: bool,
    /// Included in CSV export when also visible (defaults to true)
    pub exportable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BoolLabels>,
}

impl ColumnSpec {
    pub fn new(key: &str, title: &str) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            search: SearchMode::None,
            visible_by_default: true,
            exportable: true,
            labels: None,
        }
    }

    pub fn text(key: &str, title: &str) -> Self {
        Self {
            search: SearchMode::Text,
            ..Self::new(key, title)
        }
    }

    pub fn boolean(key: &str, title: &str) -> Self {
        Self {
            search: SearchMode::Bool,
            ..Self::new(key, title)
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible_by_default = false;
        self
    }

    pub fn not_exportable(mut self) -> Self {
        self.exportable = false;
        self
    }

    pub fn with_labels(mut self, when_true: &str, when_false: &str) -> Self {
        self.labels = Some(BoolLabels::new(when_true, when_false));
        self
    }
}

/// A column as carried by a mounted instance: the declaration plus the
/// instance's current visibility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeColumn {
    pub spec: ColumnSpec,
    pub visible: bool,
}

/// Build the runtime column set for an instance. When a persisted
/// visibility record exists for the kind it wins outright; otherwise each
/// declaration's default applies.
pub fn merge_visibility(specs: &[ColumnSpec], record: Option<&[String]>) -> Vec<RuntimeColumn> {
    specs
        .iter()
        .map(|spec| {
            let visible = match record {
                Some(keys) => keys.iter().any(|key| key == &spec.key),
                None => spec.visible_by_default,
            };
            RuntimeColumn {
                spec: spec.clone(),
                visible,
            }
        })
        .collect()
}
