//! Bulk operation client
//!
//! All three operations select rows by the instance's current filter: the
//! server re-evaluates the search form, the client never enumerates ids.
//! A non-success response is surfaced as a notification and the grid stays
//! in its pre-operation state; success triggers a refresh.

use std::sync::Arc;

use crate::client::RemovalRoute;
use crate::shell::NotifyLevel;

use super::instance::{PageReset, TableInstance};
use super::GridContext;

impl GridContext {
    /// Delete every row matching the instance's current filter
    pub async fn bulk_delete(&self, instance: &Arc<TableInstance>) {
        let kind = instance.target_kind();
        let form = instance.search_form();
        match self.transport().bulk_deletion(&kind, form).await {
            Ok(reply) => {
                self.reload(instance, PageReset::Keep).await;
                self.shell().notify(
                    &format!("{} items deleted.", reply.count),
                    NotifyLevel::Success,
                    5,
                );
            }
            Err(error) => self.shell().notify(&error.to_string(), NotifyLevel::Error, 5),
        }
    }

    /// Remove every filtered row from the owning relation (relation-scoped
    /// grids only). Severs relationships, never deletes entities.
    pub async fn bulk_remove(&self, instance: &Arc<TableInstance>) {
        let Some(scope) = instance.relation().cloned() else {
            tracing::warn!(instance = %instance.id(), "bulk removal outside a relation scope");
            return;
        };
        let kind = instance.target_kind();
        let route = RemovalRoute {
            kind: kind.clone(),
            owner_kind: scope.owner_kind.clone(),
            owner_id: scope.owner_id,
            to_key: scope.to_key.clone(),
            from_key: scope.from_key.clone(),
        };
        let form = instance.search_form();
        match self.transport().bulk_removal(route, form).await {
            Ok(reply) => {
                self.reload(instance, PageReset::Keep).await;
                // Pool membership counts change when rows leave a pool, so
                // a mounted top-level pool grid is refreshed as well
                if scope.owner_kind == "pool" {
                    self.refresh_table("pool", false).await;
                }
                self.shell().notify(
                    &format!(
                        "{} {}s removed from {} '{}'.",
                        reply.count, kind, scope.owner_kind, scope.owner_name
                    ),
                    NotifyLevel::Success,
                    5,
                );
            }
            Err(error) => self.shell().notify(&error.to_string(), NotifyLevel::Error, 5),
        }
    }

    /// Apply an edit-form payload to every row matching the target grid's
    /// filter. The form lives in an external panel and is serialized
    /// through the collaborator.
    pub async fn bulk_edit(&self, instance: &Arc<TableInstance>, form_id: &str) {
        let kind = instance.target_kind();
        let form = self.shell().serialize_form(form_id);
        match self.transport().bulk_edit(&kind, form).await {
            Ok(reply) => {
                self.shell().close_panel(form_id);
                self.reload(instance, PageReset::Keep).await;
                self.shell().notify(
                    &format!("{} items modified.", reply.count),
                    NotifyLevel::Success,
                    5,
                );
            }
            Err(error) => self.shell().notify(&error.to_string(), NotifyLevel::Error, 5),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::client::testing::StubTransport;
    use crate::commands::RelationEnds;
    use crate::errors::GridError;
    use crate::protocol::BulkReply;
    use crate::registry::builtin;
    use crate::rows::RowIdentity;
    use crate::shell::testing::RecordingShell;
    use crate::table::{GridContext, GridSettings};

    struct Harness {
        context: Arc<GridContext>,
        transport: Arc<StubTransport>,
        shell: Arc<RecordingShell>,
    }

    fn harness() -> Harness {
        let transport = Arc::new(StubTransport::new());
        let shell = Arc::new(RecordingShell::new());
        let context = GridContext::new(
            builtin::registry().unwrap(),
            GridSettings::default(),
            transport.clone(),
            shell.clone(),
        );
        Harness {
            context,
            transport,
            shell,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_delete_notifies_count_and_refreshes_once() {
        let h = harness();
        let instance = h.context.mount("device").await.unwrap();
        let before = h.transport.fetch_count();
        h.transport.set_bulk_reply(Ok(BulkReply { count: 3 }));

        h.context.bulk_delete(&instance).await;

        assert_eq!(h.transport.fetch_count(), before + 1, "one refresh fetch");
        let notifications = &h.shell.recorded.lock().unwrap().notifications;
        let (message, level) = notifications.last().unwrap();
        assert!(message.contains('3'));
        assert_eq!(*level, "success");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_delete_failure_leaves_grid_untouched() {
        let h = harness();
        let instance = h.context.mount("device").await.unwrap();
        let before = h.transport.fetch_count();
        h.transport
            .set_bulk_reply(Err(GridError::BulkOperation("503".to_string())));

        h.context.bulk_delete(&instance).await;

        assert_eq!(h.transport.fetch_count(), before, "no refresh on failure");
        let notifications = &h.shell.recorded.lock().unwrap().notifications;
        assert_eq!(notifications.last().map(|(_, level)| *level), Some("error"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_removal_route_and_pool_cross_refresh() {
        let h = harness();
        // A mounted top-level pool grid must be invalidated too
        h.context.mount("pool").await.unwrap();
        let owner = RowIdentity {
            id: 7,
            name: "edge".to_string(),
            kind: "pool".to_string(),
        };
        let ends = RelationEnds::new("devices", "pools");
        let instance = h
            .context
            .open_relation_table("device", &owner, &ends)
            .await
            .unwrap();
        h.transport.set_bulk_reply(Ok(BulkReply { count: 2 }));
        let before = h.transport.fetch_count();

        h.context.bulk_remove(&instance).await;

        let route = h
            .transport
            .removal_routes
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap();
        assert_eq!(route.path(), "/bulk_removal/device/pool/7/pools/devices");
        // One refresh for the relation grid, one for the pool grid
        assert_eq!(h.transport.fetch_count(), before + 2);

        let notifications = &h.shell.recorded.lock().unwrap().notifications;
        let (message, _) = notifications.last().unwrap();
        assert!(message.contains("2 devices removed from pool 'edge'."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_removal_without_scope_is_refused() {
        let h = harness();
        let instance = h.context.mount("device").await.unwrap();
        let before = h.transport.fetch_count();

        h.context.bulk_remove(&instance).await;

        assert_eq!(h.transport.fetch_count(), before);
        assert_eq!(h.transport.bulk_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_edit_serializes_panel_form_and_closes_it() {
        let h = harness();
        let instance = h.context.mount("device").await.unwrap();
        let mut form = crate::protocol::FormPayload::new();
        form.insert("vendor".to_string(), json!("Arista"));
        form.insert("bulk-edit-vendor".to_string(), json!(true));
        h.shell
            .forms
            .lock()
            .unwrap()
            .insert("bulk-edit-device".to_string(), form);
        h.transport.set_bulk_reply(Ok(BulkReply { count: 5 }));

        h.context.bulk_edit(&instance, "bulk-edit-device").await;

        let recorded = h.shell.recorded.lock().unwrap();
        assert_eq!(
            recorded.closed_panels.last(),
            Some(&"bulk-edit-device".to_string())
        );
        let (message, level) = recorded.notifications.last().unwrap();
        assert!(message.contains("5 items modified."));
        assert_eq!(*level, "success");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_delete_sends_current_filter_form() {
        let h = harness();
        let instance = h.context.mount("device").await.unwrap();
        h.context
            .filter_bool(&instance, "never_update", Some(true))
            .await;
        h.transport.set_bulk_reply(Ok(BulkReply { count: 0 }));

        h.context.bulk_delete(&instance).await;

        // The stub ignores the body, but the instance's own form must carry
        // the selection predicate the server re-evaluates
        let form = instance.search_form();
        assert_eq!(form.get("never_update"), Some(&json!("bool-true")));
    }
}
