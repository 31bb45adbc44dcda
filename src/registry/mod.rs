//! Table type registry: one capability record per entity kind
//!
//! Each kind registers a `TableBehavior` describing its columns and the
//! handful of behaviors it overrides; everything else inherits the shared
//! defaults. This is the engine's only polymorphism point: a flat,
//! enumerable set of variants, one level of specialization, no chains.

pub mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use crate::columns::ColumnSpec;
use crate::commands::{Control, RowCommand};
use crate::errors::GridError;
use crate::protocol::{FormPayload, SortSpec};
use crate::rows::{RawRecord, RenderRow};
use crate::table::instance::TableInstance;
use crate::table::relation::RelationScope;

/// Per-kind customization contract. Override only what differs; the
/// defaults carry every other kind.
pub trait TableBehavior: Send + Sync {
    /// Column declarations, in display order
    fn columns(&self) -> Vec<ColumnSpec>;

    /// Initial sort; audit-like kinds override with reverse-chronological
    fn default_sort(&self) -> Option<SortSpec> {
        None
    }

    /// Type-specific decoration, applied after identity injection
    fn decorate(&self, _row: &mut RenderRow, _raw: &RawRecord) {}

    /// Control bar, in declared order
    fn controls(&self) -> Vec<Control> {
        Vec::new()
    }

    /// Row actions. The default covers edit/duplicate/delete, with
    /// deletion swapped for relation removal under a relation scope.
    fn row_commands(
        &self,
        row: &RenderRow,
        _raw: &RawRecord,
        relation: Option<&RelationScope>,
    ) -> Vec<RowCommand> {
        default_row_commands(row, relation)
    }

    /// Which kind's filter endpoint this grid queries (own kind when None)
    fn filter_target(&self) -> Option<&'static str> {
        None
    }

    /// Type-specific fields flattened into every query body
    fn extra_filter_payload(&self) -> FormPayload {
        FormPayload::new()
    }

    /// Ask the server to prefilter (run grids)
    fn prefilter(&self) -> bool {
        false
    }

    /// Background activity changes this kind's data; refresh periodically
    fn periodic_refresh(&self) -> bool {
        false
    }

    /// Hook invoked once the instance is mounted and its first page
    /// requested
    fn on_post_process(&self, _instance: &TableInstance) {}
}

/// The shared edit/duplicate/delete action set
pub fn default_row_commands(
    row: &RenderRow,
    relation: Option<&RelationScope>,
) -> Vec<RowCommand> {
    let identity = row.identity.clone();
    let delete = if relation.is_some() {
        RowCommand::RemoveFromRelation {
            identity: identity.clone(),
        }
    } else {
        RowCommand::Delete {
            identity: identity.clone(),
        }
    };
    vec![
        RowCommand::Edit {
            identity: identity.clone(),
        },
        RowCommand::Duplicate { identity },
        delete,
    ]
}

/// Kind tag → behavior table. Built once at startup, immutable afterwards.
#[derive(Default)]
pub struct Registry {
    behaviors: HashMap<String, Arc<dyn TableBehavior>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind. Duplicate registration fails fast: it means two
    /// modules claim the same tag.
    pub fn register(
        &mut self,
        kind: &str,
        behavior: Arc<dyn TableBehavior>,
    ) -> Result<(), GridError> {
        if self.behaviors.contains_key(kind) {
            return Err(GridError::AlreadyRegistered(kind.to_string()));
        }
        self.behaviors.insert(kind.to_string(), behavior);
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Result<Arc<dyn TableBehavior>, GridError> {
        self.behaviors
            .get(kind)
            .cloned()
            .ok_or_else(|| GridError::UnknownType(kind.to_string()))
    }

    /// Registered kind tags, sorted for stable display
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.behaviors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Minimal;

    impl TableBehavior for Minimal {
        fn columns(&self) -> Vec<ColumnSpec> {
            vec![ColumnSpec::text("name", "Name")]
        }
    }

    #[test]
    fn test_get_unknown_kind() {
        let registry = Registry::new();
        assert_eq!(
            registry.get("widget").err(),
            Some(GridError::UnknownType("widget".to_string()))
        );
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = Registry::new();
        registry.register("device", Arc::new(Minimal)).unwrap();
        assert_eq!(
            registry.register("device", Arc::new(Minimal)).err(),
            Some(GridError::AlreadyRegistered("device".to_string()))
        );
    }

    #[test]
    fn test_registered_kind_resolves() {
        let mut registry = Registry::new();
        registry.register("device", Arc::new(Minimal)).unwrap();
        let behavior = registry.get("device").unwrap();
        assert_eq!(behavior.columns()[0].key, "name");
        assert!(behavior.default_sort().is_none());
        assert!(!behavior.periodic_refresh());
    }
}
