//! Relation table factory
//!
//! Opens a modal-scoped secondary grid showing the rows related to one
//! owner ("services of this device"). The secondary instance carries the
//! owning relation as a scope, which constrains every request it issues
//! and swaps row deletion for relation removal. Several relation tables
//! for different owners may coexist; each gets a `kind-ownerId` id.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::commands::RelationEnds;
use crate::errors::GridError;
use crate::protocol::ConstraintMap;
use crate::rows::RowIdentity;
use crate::shell::PanelSpec;

use super::instance::TableInstance;
use super::GridContext;

/// Marks an instance as owned by another entity via a named relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationScope {
    /// Owner-side collection the relation removal route names
    pub from_key: String,
    /// Column on the target rows pointing back at the owner; also the
    /// constraint key sent with every request
    pub to_key: String,
    pub owner_id: u64,
    pub owner_name: String,
    pub owner_kind: String,
}

impl GridContext {
    /// Open a panel holding a secondary grid of `target_kind` rows related
    /// to `owner`, and mount it with the scoping constraint attached
    pub async fn open_relation_table(
        self: &Arc<Self>,
        target_kind: &str,
        owner: &RowIdentity,
        ends: &RelationEnds,
    ) -> Result<Arc<TableInstance>, GridError> {
        let scope = RelationScope {
            from_key: ends.from_key.clone(),
            to_key: ends.to_key.clone(),
            owner_id: owner.id,
            owner_name: owner.name.clone(),
            owner_kind: owner.kind.clone(),
        };
        let id = format!("{}-{}", target_kind, owner.id);
        self.shell().open_panel(PanelSpec {
            name: "table".to_string(),
            id: id.clone(),
            title: format!("{} - {}s", owner.name, target_kind),
        });

        let mut constraints = ConstraintMap::new();
        constraints.insert(scope.to_key.clone(), json!([scope.owner_id]));
        self.mount_scoped(id, target_kind, constraints, Some(scope))
            .await
    }

    /// Tear down a relation grid together with its panel
    pub fn close_relation_table(&self, id: &str) {
        self.destroy(id);
        self.shell().close_panel(id);
    }
}
