//! Table instance: one mounted grid and its query lifecycle
//!
//! An instance owns the runtime column copy, sort/page state, the pending
//! export/clipboard flags and the request sequence counters. It never talks
//! to collaborators itself: `prepare_query` and `apply_reply` are pure
//! state transitions, and the context performs the resulting side effects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::columns::{merge_visibility, RuntimeColumn};
use crate::commands::Control;
use crate::errors::GridError;
use crate::protocol::{
    ConstraintMap, FilterQuery, FilterReply, FormPayload, FullResult, SortSpec, WireColumn,
};
use crate::registry::TableBehavior;
use crate::rows::{RawRecord, RenderRow, RenderedPage};
use crate::shell::NotifyLevel;

use super::export;
use super::filter::FilterState;
use super::relation::RelationScope;

/// Whether a reload keeps the user's page or jumps back to the first one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageReset {
    Keep,
    First,
}

pub(super) struct InstanceState {
    pub columns: Vec<RuntimeColumn>,
    pub sort: Option<SortSpec>,
    pub page: u64,
    pub page_size: u64,
    pub pending_export: bool,
    pub pending_clipboard: bool,
    /// Sequence allocated to the next fetch
    pub next_seq: u64,
    /// Newest sequence whose reply was applied; older replies are dropped
    pub applied_seq: u64,
    pub refresh_task: Option<JoinHandle<()>>,
}

/// Side effects computed from one reply, executed by the context after the
/// state lock is released
#[derive(Debug, Default)]
pub(super) struct ApplyOutcome {
    pub notification: Option<(String, NotifyLevel)>,
    /// (file name, content, extension)
    pub download: Option<(String, String, String)>,
    pub clipboard: Option<String>,
    pub page: Option<RenderedPage>,
}

pub struct TableInstance {
    id: String,
    kind: String,
    behavior: Arc<dyn TableBehavior>,
    constraints: ConstraintMap,
    relation: Option<RelationScope>,
    controls: Vec<Control>,
    destroyed: AtomicBool,
    pub(super) state: Mutex<InstanceState>,
    pub(super) filter: Mutex<FilterState>,
}

impl TableInstance {
    pub(super) fn new(
        id: String,
        kind: String,
        behavior: Arc<dyn TableBehavior>,
        constraints: ConstraintMap,
        relation: Option<RelationScope>,
        visibility_record: Option<Vec<String>>,
        page_size: u64,
    ) -> Self {
        let columns = merge_visibility(&behavior.columns(), visibility_record.as_deref());
        let sort = behavior.default_sort();
        let controls = behavior.controls();
        Self {
            id,
            kind,
            behavior,
            constraints,
            relation,
            controls,
            destroyed: AtomicBool::new(false),
            state: Mutex::new(InstanceState {
                columns,
                sort,
                page: 0,
                page_size,
                pending_export: false,
                pending_clipboard: false,
                next_seq: 1,
                applied_seq: 0,
                refresh_task: None,
            }),
            filter: Mutex::new(FilterState::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn relation(&self) -> Option<&RelationScope> {
        self.relation.as_ref()
    }

    /// The kind whose endpoints this grid talks to
    pub fn target_kind(&self) -> String {
        self.behavior
            .filter_target()
            .unwrap_or(self.kind.as_str())
            .to_string()
    }

    /// Control bar, in the order the type declared it
    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn columns(&self) -> Vec<RuntimeColumn> {
        self.state.lock().expect("instance state poisoned").columns.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Mark destroyed and cancel the periodic refresh task. Replies still
    /// in flight will be dropped on arrival.
    pub(super) fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        if let Some(task) = self
            .state
            .lock()
            .expect("instance state poisoned")
            .refresh_task
            .take()
        {
            task.abort();
        }
    }

    /// Serialized search form, as the bulk endpoints expect it
    pub fn search_form(&self) -> FormPayload {
        self.filter.lock().expect("filter state poisoned").to_form()
    }

    /// Allocate a sequence number and build the query body for one fetch
    pub(super) fn prepare_query(&self, reset: PageReset) -> (u64, String, FilterQuery) {
        let form = self.search_form();
        let mut state = self.state.lock().expect("instance state poisoned");
        if reset == PageReset::First {
            state.page = 0;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        let columns = state
            .columns
            .iter()
            .map(|column| WireColumn {
                key: column.spec.key.clone(),
                visible: column.visible,
                search: column.spec.search,
            })
            .collect();
        let query = FilterQuery {
            kind: self.kind.clone(),
            form,
            constraints: self.constraints.clone(),
            columns,
            page: state.page,
            page_size: state.page_size,
            sort: state.sort.clone(),
            export: state.pending_export,
            clipboard: state.pending_clipboard,
            prefilter: self.behavior.prefilter(),
            extra: self.behavior.extra_filter_payload(),
        };
        (seq, self.target_kind(), query)
    }

    /// Fold one reply into the instance. Stale replies (older sequence, or
    /// any reply after destruction) produce an empty outcome.
    pub(super) fn apply_reply(
        &self,
        seq: u64,
        reply: Result<FilterReply, GridError>,
    ) -> ApplyOutcome {
        if self.is_destroyed() {
            tracing::debug!(instance = %self.id, seq, "discarding reply for destroyed instance");
            return ApplyOutcome::default();
        }
        let mut state = self.state.lock().expect("instance state poisoned");
        if seq <= state.applied_seq {
            tracing::debug!(
                instance = %self.id,
                seq,
                applied = state.applied_seq,
                "discarding stale reply"
            );
            return ApplyOutcome::default();
        }
        state.applied_seq = seq;

        let mut outcome = ApplyOutcome::default();
        // Server-side filter errors and transport failures share one
        // recovery: notify, render an empty page, never throw
        let reply = match reply {
            Ok(reply) if reply.error.is_none() => reply,
            Ok(reply) => {
                let error = GridError::ServerFilter(reply.error.unwrap_or_default());
                outcome.notification = Some((error.to_string(), NotifyLevel::Error));
                outcome.page = Some(RenderedPage {
                    columns: state.columns.clone(),
                    page: state.page,
                    page_size: state.page_size,
                    ..RenderedPage::default()
                });
                return outcome;
            }
            Err(error) => {
                outcome.notification = Some((error.to_string(), NotifyLevel::Error));
                outcome.page = Some(RenderedPage {
                    columns: state.columns.clone(),
                    page: state.page,
                    page_size: state.page_size,
                    ..RenderedPage::default()
                });
                return outcome;
            }
        };

        if state.pending_export {
            state.pending_export = false;
            match &reply.full_result {
                Some(FullResult::Rows(rows)) => {
                    let content = export::build_csv(&state.columns, rows);
                    outcome.download = Some((self.kind.clone(), content, "csv".to_string()));
                }
                _ => tracing::warn!(instance = %self.id, "export requested but no full result"),
            }
        }
        if state.pending_clipboard {
            state.pending_clipboard = false;
            match &reply.full_result {
                Some(full) => outcome.clipboard = Some(export::clipboard_text(full)),
                None => {
                    tracing::warn!(instance = %self.id, "clipboard requested but no full result")
                }
            }
        }

        outcome.page = Some(RenderedPage {
            columns: state.columns.clone(),
            rows: reply
                .data
                .iter()
                .map(|raw| self.decorate(raw))
                .collect(),
            page: state.page,
            page_size: state.page_size,
            records_total: reply.records_total,
            records_filtered: reply.records_filtered,
        });
        outcome
    }

    /// Identity injection, type-specific decoration, then row actions
    pub fn decorate(&self, raw: &RawRecord) -> RenderRow {
        let mut row = RenderRow::from_raw(&self.kind, raw);
        self.behavior.decorate(&mut row, raw);
        row.commands = self.behavior.row_commands(&row, raw, self.relation.as_ref());
        row
    }
}

impl Drop for TableInstance {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(task) = state.refresh_task.take() {
                task.abort();
            }
        }
    }
}
