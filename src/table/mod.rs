//! Grid context: the explicit owner of the registry, the live-instance
//! table, the collaborators and the transport
//!
//! Created once at application start and passed around as an `Arc`; every
//! grid lifecycle runs through it. There are no process-wide globals.

pub mod bulk;
pub mod export;
pub mod filter;
pub mod instance;
pub mod refresh;
pub mod relation;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::client::Transport;
use crate::errors::GridError;
use crate::protocol::{ConstraintMap, SortDirection, SortSpec};
use crate::registry::Registry;
use crate::shell::{NotifyLevel, Shell};
use crate::visibility::VisibilityStore;

use instance::{ApplyOutcome, PageReset, TableInstance};
use relation::RelationScope;

/// Engine timings and paging defaults, sourced from the application config
#[derive(Debug, Clone)]
pub struct GridSettings {
    pub page_size: u64,
    /// Quiet window after the last text edit before a filter fetch fires
    pub debounce: Duration,
    /// Periodic refresh interval for live table kinds
    pub refresh_interval: Duration,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            page_size: 25,
            debounce: Duration::from_millis(500),
            refresh_interval: Duration::from_millis(3000),
        }
    }
}

pub struct GridContext {
    registry: Registry,
    settings: GridSettings,
    transport: Arc<dyn Transport>,
    shell: Arc<dyn Shell>,
    visibility: VisibilityStore,
    instances: Mutex<HashMap<String, Arc<TableInstance>>>,
}

impl GridContext {
    pub fn new(
        registry: Registry,
        settings: GridSettings,
        transport: Arc<dyn Transport>,
        shell: Arc<dyn Shell>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            settings,
            transport,
            shell,
            visibility: VisibilityStore::new(),
            instances: Mutex::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn settings(&self) -> &GridSettings {
        &self.settings
    }

    pub(crate) fn shell(&self) -> &Arc<dyn Shell> {
        &self.shell
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn instance(&self, id: &str) -> Option<Arc<TableInstance>> {
        self.instances
            .lock()
            .expect("instance table poisoned")
            .get(id)
            .cloned()
    }

    /// Mount a top-level grid for a kind and issue its initial fetch
    pub async fn mount(self: &Arc<Self>, kind: &str) -> Result<Arc<TableInstance>, GridError> {
        self.mount_scoped(kind.to_string(), kind, ConstraintMap::new(), None)
            .await
    }

    /// Mount a grid under an explicit id, optionally constrained and
    /// relation-scoped (relation tables use `kind-ownerId` ids so several
    /// owners can coexist)
    pub(crate) async fn mount_scoped(
        self: &Arc<Self>,
        id: String,
        kind: &str,
        constraints: ConstraintMap,
        relation: Option<RelationScope>,
    ) -> Result<Arc<TableInstance>, GridError> {
        let behavior = self.registry.get(kind)?;
        let record = self.visibility.visible_columns(kind);
        let instance = Arc::new(TableInstance::new(
            id.clone(),
            kind.to_string(),
            behavior.clone(),
            constraints,
            relation,
            record,
            self.settings.page_size,
        ));

        // Exactly one live instance per id: remounting an id supersedes
        // the previous instance, which stops issuing requests
        if let Some(stale) = self
            .instances
            .lock()
            .expect("instance table poisoned")
            .insert(id, Arc::clone(&instance))
        {
            stale.destroy();
        }

        if behavior.periodic_refresh() {
            let task = refresh::spawn_periodic_refresh(Arc::clone(self), instance.id().to_string());
            instance
                .state
                .lock()
                .expect("instance state poisoned")
                .refresh_task = Some(task);
        }

        behavior.on_post_process(&instance);
        tracing::debug!(instance = %instance.id(), kind, "table mounted");
        self.reload(&instance, PageReset::Keep).await;
        Ok(instance)
    }

    /// Unregister an instance; in-flight replies for it will be dropped
    pub fn destroy(&self, id: &str) {
        let removed = self
            .instances
            .lock()
            .expect("instance table poisoned")
            .remove(id);
        if let Some(instance) = removed {
            instance.destroy();
            tracing::debug!(instance = %id, "table destroyed");
        }
    }

    /// Issue one fetch for an instance and apply the reply. All triggers
    /// funnel through here: mount, paging, sorting, filter settlement,
    /// explicit refresh, scheduler ticks.
    pub async fn reload(&self, instance: &Arc<TableInstance>, reset: PageReset) {
        if instance.is_destroyed() {
            return;
        }
        let (seq, target, query) = instance.prepare_query(reset);
        let reply = self.transport.filtering(&target, query).await;
        let outcome = instance.apply_reply(seq, reply);
        self.apply_outcome(instance, outcome);
    }

    fn apply_outcome(&self, instance: &Arc<TableInstance>, outcome: ApplyOutcome) {
        if let Some((message, level)) = outcome.notification {
            self.shell.notify(&message, level, 5);
        }
        if let Some((name, content, extension)) = outcome.download {
            if let Err(error) = self.shell.download_file(&name, &content, &extension) {
                self.shell.notify(
                    &format!("Export failed: {:#}", error),
                    NotifyLevel::Error,
                    5,
                );
            }
        }
        if let Some(text) = outcome.clipboard {
            if let Err(error) = self.shell.copy_to_clipboard(&text) {
                self.shell.notify(
                    &format!("Clipboard copy failed: {:#}", error),
                    NotifyLevel::Warning,
                    5,
                );
            }
        }
        if let Some(page) = outcome.page {
            self.shell.render_page(instance.id(), &page);
        }
    }

    /// Refresh without resetting the page, optionally notifying the user
    pub async fn refresh_table(&self, id: &str, notification: bool) {
        if let Some(instance) = self.instance(id) {
            self.reload(&instance, PageReset::Keep).await;
        }
        if notification {
            self.shell
                .notify("Table refreshed.", NotifyLevel::Success, 5);
        }
    }

    pub async fn set_page(&self, instance: &Arc<TableInstance>, page: u64) {
        instance.state.lock().expect("instance state poisoned").page = page;
        self.reload(instance, PageReset::Keep).await;
    }

    pub async fn set_page_size(&self, instance: &Arc<TableInstance>, size: u64) {
        instance
            .state
            .lock()
            .expect("instance state poisoned")
            .page_size = size.max(1);
        self.reload(instance, PageReset::First).await;
    }

    pub async fn set_sort(&self, instance: &Arc<TableInstance>, column: &str, direction: SortDirection) {
        instance.state.lock().expect("instance state poisoned").sort = Some(SortSpec {
            column: column.to_string(),
            direction,
        });
        self.reload(instance, PageReset::First).await;
    }

    /// Apply a visibility-menu change: update the instance, persist the
    /// per-kind record (shared by every instance of the kind, relation
    /// scoped or not) and redraw without resetting the page
    pub async fn set_visible_columns(&self, instance: &Arc<TableInstance>, keys: &[String]) {
        let persisted: Vec<String> = {
            let mut state = instance.state.lock().expect("instance state poisoned");
            for column in &mut state.columns {
                column.visible = keys.iter().any(|key| key == &column.spec.key);
            }
            state
                .columns
                .iter()
                .filter(|column| column.visible)
                .map(|column| column.spec.key.clone())
                .collect()
        };
        self.visibility.store(instance.kind(), persisted);
        self.reload(instance, PageReset::Keep).await;
    }

    /// Flag the next fetch to carry the full result set for CSV download
    pub async fn export_table(&self, instance: &Arc<TableInstance>) {
        instance
            .state
            .lock()
            .expect("instance state poisoned")
            .pending_export = true;
        self.reload(instance, PageReset::Keep).await;
    }

    /// Same, but handing the full result to the clipboard collaborator
    pub async fn copy_selection(&self, instance: &Arc<TableInstance>) {
        instance
            .state
            .lock()
            .expect("instance state poisoned")
            .pending_clipboard = true;
        self.reload(instance, PageReset::Keep).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::StubTransport;
    use crate::columns::{ColumnSpec, MatchMode};
    use crate::protocol::{FilterReply, FullResult};
    use crate::registry::{builtin, TableBehavior};
    use crate::shell::testing::RecordingShell;
    use serde_json::json;
    use std::time::Duration;

    /// Minimal kind used by scenario tests: name visible, ip hidden,
    /// secret hidden and not exportable
    struct ScenarioKind;

    impl TableBehavior for ScenarioKind {
        fn columns(&self) -> Vec<ColumnSpec> {
            vec![
                ColumnSpec::text("name", "Name"),
                ColumnSpec::text("ip", "IP").hidden(),
                ColumnSpec::text("secret", "Secret").hidden().not_exportable(),
            ]
        }
    }

    fn scenario_registry() -> Registry {
        let mut registry = Registry::new();
        registry.register("device", Arc::new(ScenarioKind)).unwrap();
        registry
    }

    struct Harness {
        context: Arc<GridContext>,
        transport: Arc<StubTransport>,
        shell: Arc<RecordingShell>,
    }

    fn harness(registry: Registry) -> Harness {
        let transport = Arc::new(StubTransport::new());
        let shell = Arc::new(RecordingShell::new());
        let context = GridContext::new(
            registry,
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

    fn builtin_harness() -> Harness {
        harness(builtin::registry().unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_visible_set_without_record() {
        let h = harness(scenario_registry());
        let instance = h.context.mount("device").await.unwrap();
        let visible: Vec<String> = instance
            .columns()
            .iter()
            .filter(|column| column.visible)
            .map(|column| column.spec.key.clone())
            .collect();
        assert_eq!(visible, vec!["name".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visibility_round_trip_across_reconstruction() {
        let h = harness(scenario_registry());
        let instance = h.context.mount("device").await.unwrap();

        // Toggle ip on and name off
        h.context
            .set_visible_columns(&instance, &["ip".to_string()])
            .await;
        h.context.destroy("device");

        let rebuilt = h.context.mount("device").await.unwrap();
        let columns = rebuilt.columns();
        assert!(!columns[0].visible, "name stays hidden after remount");
        assert!(columns[1].visible, "ip stays visible after remount");

        // Toggle name back on, remount again
        h.context
            .set_visible_columns(&rebuilt, &["ip".to_string(), "name".to_string()])
            .await;
        h.context.destroy("device");
        let third = h.context.mount("device").await.unwrap();
        assert!(third.columns()[0].visible);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_rapid_edits() {
        let h = harness(scenario_registry());
        let instance = h.context.mount("device").await.unwrap();
        assert_eq!(h.transport.fetch_count(), 1);

        for value in ["c", "co", "cor", "core", "core-"] {
            h.context.filter_input(&instance, "name", value);
        }
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(h.transport.fetch_count(), 2, "one fetch per quiet period");

        // Two edits separated by more than the window fetch twice
        h.context.filter_input(&instance, "name", "core-a");
        tokio::time::sleep(Duration::from_millis(600)).await;
        h.context.filter_input(&instance, "name", "core-b");
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(h.transport.fetch_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_settlement_resets_page() {
        let h = harness(scenario_registry());
        let instance = h.context.mount("device").await.unwrap();
        h.context.set_page(&instance, 3).await;
        assert_eq!(h.transport.last_query().unwrap().page, 3);

        h.context.filter_input(&instance, "name", "core");
        tokio::time::sleep(Duration::from_millis(600)).await;
        let query = h.transport.last_query().unwrap();
        assert_eq!(query.page, 0);
        assert_eq!(query.form.get("name"), Some(&json!("core")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_search_single_refresh_and_mode_reset() {
        let h = harness(scenario_registry());
        let instance = h.context.mount("device").await.unwrap();
        h.context.set_match_mode(&instance, "name", MatchMode::Regex);
        h.context.filter_input(&instance, "name", "^core");
        tokio::time::sleep(Duration::from_millis(600)).await;
        let before = h.transport.fetch_count();

        h.context.clear_search(&instance, true).await;
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(h.transport.fetch_count(), before + 1, "exactly one refresh");
        let query = h.transport.last_query().unwrap();
        assert!(query.form.is_empty(), "inputs and modes reset");
        let notifications = &h.shell.recorded.lock().unwrap().notifications;
        assert!(notifications
            .iter()
            .any(|(message, level)| message.contains("cleared") && *level == "success"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_search_swallows_pending_debounce() {
        let h = harness(scenario_registry());
        let instance = h.context.mount("device").await.unwrap();
        let before = h.transport.fetch_count();

        h.context.filter_input(&instance, "name", "core");
        h.context.clear_search(&instance, false).await;
        tokio::time::sleep(Duration::from_millis(700)).await;

        // The clear refresh happened; the debounced fetch did not
        assert_eq!(h.transport.fetch_count(), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boolean_filter_is_immediate() {
        let h = builtin_harness();
        let instance = h.context.mount("service").await.unwrap();
        let before = h.transport.fetch_count();
        h.context.filter_bool(&instance, "shared", Some(true)).await;
        assert_eq!(h.transport.fetch_count(), before + 1);
        assert_eq!(
            h.transport.last_query().unwrap().form.get("shared"),
            Some(&json!("bool-true"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_renders_empty_page() {
        let h = harness(scenario_registry());
        h.transport.set_reply(FilterReply::error("bad regex"));
        let _instance = h.context.mount("device").await.unwrap();

        let page = h.shell.last_page().expect("page rendered");
        assert!(page.rows.is_empty());
        let notifications = &h.shell.recorded.lock().unwrap().notifications;
        assert_eq!(
            notifications.last(),
            Some(&("bad regex".to_string(), "error"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_sequence_discarded() {
        let h = harness(scenario_registry());
        let instance = h.context.mount("device").await.unwrap();

        // Two fetches prepared in order; the replies arrive reversed
        let (first_seq, _, _) = instance.prepare_query(PageReset::Keep);
        let (second_seq, _, _) = instance.prepare_query(PageReset::Keep);
        let newer = instance.apply_reply(second_seq, Ok(FilterReply::default()));
        assert!(newer.page.is_some());
        let stale = instance.apply_reply(first_seq, Ok(FilterReply::default()));
        assert!(stale.page.is_none(), "older reply is dropped");
        assert!(stale.notification.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroyed_instance_reply_discarded() {
        let h = harness(scenario_registry());
        let instance = h.context.mount("device").await.unwrap();
        let (seq, _, _) = instance.prepare_query(PageReset::Keep);
        h.context.destroy("device");

        let pages_before = h.shell.recorded.lock().unwrap().pages.len();
        let outcome = instance.apply_reply(seq, Ok(FilterReply::default()));
        assert!(outcome.page.is_none());
        assert_eq!(h.shell.recorded.lock().unwrap().pages.len(), pages_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_keeps_visible_exportable_columns_only() {
        let h = harness(scenario_registry());
        let instance = h.context.mount("device").await.unwrap();
        h.transport.set_reply(FilterReply {
            data: vec![],
            full_result: Some(FullResult::Rows(vec![json!({"name": "r1", "secret": "x"})
                .as_object()
                .unwrap()
                .clone()])),
            ..FilterReply::default()
        });

        h.context.export_table(&instance).await;

        let recorded = h.shell.recorded.lock().unwrap();
        let (name, content, extension) = recorded.downloads.last().expect("download");
        assert_eq!(name, "device");
        assert_eq!(extension, "csv");
        assert_eq!(content, "name\n\"r1\"");
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_flag_clears_after_response() {
        let h = harness(scenario_registry());
        let instance = h.context.mount("device").await.unwrap();
        h.transport.set_reply(FilterReply {
            full_result: Some(FullResult::Rows(vec![])),
            ..FilterReply::default()
        });

        h.context.export_table(&instance).await;
        assert!(h.transport.last_query().unwrap().export);

        h.context.refresh_table("device", false).await;
        assert!(!h.transport.last_query().unwrap().export, "flag cleared");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clipboard_joins_row_names() {
        let h = harness(scenario_registry());
        let instance = h.context.mount("device").await.unwrap();
        h.transport.set_reply(FilterReply {
            full_result: Some(FullResult::Text("r1,r2".to_string())),
            ..FilterReply::default()
        });

        h.context.copy_selection(&instance).await;
        assert_eq!(
            h.shell.recorded.lock().unwrap().clipboard.last(),
            Some(&"r1,r2".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_remount_supersedes_previous_instance() {
        let h = harness(scenario_registry());
        let first = h.context.mount("device").await.unwrap();
        let second = h.context.mount("device").await.unwrap();
        assert!(first.is_destroyed());
        assert!(!second.is_destroyed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_configuration_grid_queries_device_endpoint() {
        let h = builtin_harness();
        h.context.mount("configuration").await.unwrap();
        assert_eq!(h.transport.last_target().as_deref(), Some("device"));
        let query = h.transport.last_query().unwrap();
        assert_eq!(query.kind, "configuration");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_kind_fails_to_mount() {
        let h = builtin_harness();
        let error = h.context.mount("widget").await.err();
        assert_eq!(error, Some(GridError::UnknownType("widget".to_string())));
    }
}
