//! Column filter controller
//!
//! Text input is debounced: edits inside the quiet window reset the timer,
//! and only the newest generation fires a fetch once the window settles.
//! Boolean selection and discrete control fields fetch immediately.
//! Clearing search resets everything (match modes back to inclusion) and
//! issues exactly one refresh.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::columns::MatchMode;
use crate::protocol::FormPayload;
use crate::shell::NotifyLevel;

use super::instance::{PageReset, TableInstance};
use super::GridContext;

/// Per-instance search state: the canonical form the server re-evaluates
#[derive(Debug, Default)]
pub struct FilterState {
    /// Per-column text input
    text: BTreeMap<String, String>,
    /// Per-column match mode; absent means `inclusion`
    modes: BTreeMap<String, MatchMode>,
    /// Per-column boolean selection; absent means "any"
    bools: BTreeMap<String, bool>,
    /// Relation-based advanced-search selections
    relations: BTreeMap<String, Vec<u64>>,
    /// Discrete control fields riding in the form (hierarchy toggle,
    /// context slider)
    extras: FormPayload,
    /// Debounce generation: bumped on every text edit, checked when the
    /// quiet window elapses
    generation: u64,
}

impl FilterState {
    pub fn set_text(&mut self, column: &str, value: &str) -> u64 {
        if value.is_empty() {
            self.text.remove(column);
        } else {
            self.text.insert(column.to_string(), value.to_string());
        }
        self.generation += 1;
        self.generation
    }

    pub fn set_mode(&mut self, column: &str, mode: MatchMode) {
        if mode == MatchMode::Inclusion {
            self.modes.remove(column);
        } else {
            self.modes.insert(column.to_string(), mode);
        }
    }

    pub fn mode(&self, column: &str) -> MatchMode {
        self.modes.get(column).copied().unwrap_or_default()
    }

    pub fn set_bool(&mut self, column: &str, value: Option<bool>) {
        match value {
            Some(flag) => {
                self.bools.insert(column.to_string(), flag);
            }
            None => {
                self.bools.remove(column);
            }
        }
    }

    pub fn set_relation(&mut self, key: &str, ids: Vec<u64>) {
        if ids.is_empty() {
            self.relations.remove(key);
        } else {
            self.relations.insert(key.to_string(), ids);
        }
    }

    pub fn set_extra(&mut self, key: &str, value: Value) {
        self.extras.insert(key.to_string(), value);
    }

    /// Reset every input and every match mode; bumping the generation also
    /// swallows any debounce timer still pending
    pub fn clear(&mut self) -> u64 {
        self.text.clear();
        self.modes.clear();
        self.bools.clear();
        self.relations.clear();
        self.extras.clear();
        self.generation += 1;
        self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Serialize the way a DOM search form would: values, `{column}_filter`
    /// match modes, `bool-true`/`bool-false` selections, relation id lists
    pub fn to_form(&self) -> FormPayload {
        let mut form = FormPayload::new();
        for (column, value) in &self.text {
            form.insert(column.clone(), json!(value));
            let mode = self.mode(column);
            if mode != MatchMode::Inclusion {
                form.insert(format!("{}_filter", column), json!(mode.as_str()));
            }
        }
        for (column, flag) in &self.bools {
            let value = if *flag { "bool-true" } else { "bool-false" };
            form.insert(column.clone(), json!(value));
        }
        for (key, ids) in &self.relations {
            form.insert(key.clone(), json!(ids));
        }
        for (key, value) in &self.extras {
            form.insert(key.clone(), value.clone());
        }
        form
    }
}

impl GridContext {
    /// Text-column edit. The fetch fires after the debounce window closes,
    /// and only for the newest edit: earlier timers see a newer generation
    /// and drop out.
    pub fn filter_input(self: &Arc<Self>, instance: &Arc<TableInstance>, column: &str, value: &str) {
        let generation = instance
            .filter
            .lock()
            .expect("filter state poisoned")
            .set_text(column, value);
        let context = Arc::clone(self);
        let instance = Arc::clone(instance);
        let window = self.settings().debounce;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if instance.is_destroyed() {
                return;
            }
            let current = instance
                .filter
                .lock()
                .expect("filter state poisoned")
                .generation();
            if current != generation {
                return;
            }
            context.reload(&instance, PageReset::First).await;
        });
    }

    /// Boolean columns are a discrete choice: no debounce
    pub async fn filter_bool(&self, instance: &Arc<TableInstance>, column: &str, value: Option<bool>) {
        instance
            .filter
            .lock()
            .expect("filter state poisoned")
            .set_bool(column, value);
        self.reload(instance, PageReset::First).await;
    }

    /// Match mode rides along with the next fetch; changing it alone does
    /// not refetch
    pub fn set_match_mode(&self, instance: &Arc<TableInstance>, column: &str, mode: MatchMode) {
        instance
            .filter
            .lock()
            .expect("filter state poisoned")
            .set_mode(column, mode);
    }

    pub fn set_relation_filter(&self, instance: &Arc<TableInstance>, key: &str, ids: Vec<u64>) {
        instance
            .filter
            .lock()
            .expect("filter state poisoned")
            .set_relation(key, ids);
    }

    /// Discrete control fields (hierarchy toggle, context slider) refresh
    /// immediately, like boolean search
    pub async fn set_form_field(&self, instance: &Arc<TableInstance>, key: &str, value: Value) {
        instance
            .filter
            .lock()
            .expect("filter state poisoned")
            .set_extra(key, value);
        self.reload(instance, PageReset::First).await;
    }

    /// Reset all per-column inputs, match modes and relation selections,
    /// then issue exactly one refresh
    pub async fn clear_search(&self, instance: &Arc<TableInstance>, notification: bool) {
        instance
            .filter
            .lock()
            .expect("filter state poisoned")
            .clear();
        self.reload(instance, PageReset::Keep).await;
        if notification {
            self.shell()
                .notify("Search parameters cleared.", NotifyLevel::Success, 5);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_serialization() {
        let mut state = FilterState::default();
        state.set_text("name", "core");
        state.set_mode("name", MatchMode::Regex);
        state.set_bool("shared", Some(true));
        state.set_relation("pools", vec![4, 7]);

        let form = state.to_form();
        assert_eq!(form.get("name"), Some(&json!("core")));
        assert_eq!(form.get("name_filter"), Some(&json!("regex")));
        assert_eq!(form.get("shared"), Some(&json!("bool-true")));
        assert_eq!(form.get("pools"), Some(&json!([4, 7])));
    }

    #[test]
    fn test_inclusion_mode_is_implicit() {
        let mut state = FilterState::default();
        state.set_text("name", "core");
        assert!(!state.to_form().contains_key("name_filter"));
    }

    #[test]
    fn test_clear_resets_modes_and_inputs() {
        let mut state = FilterState::default();
        state.set_text("name", "core");
        state.set_mode("name", MatchMode::Equality);
        state.set_bool("shared", Some(false));
        state.clear();

        assert!(state.to_form().is_empty());
        assert_eq!(state.mode("name"), MatchMode::Inclusion);
    }

    #[test]
    fn test_empty_text_removes_entry() {
        let mut state = FilterState::default();
        state.set_text("name", "core");
        state.set_text("name", "");
        assert!(state.to_form().is_empty());
    }

    #[test]
    fn test_generation_bumps_per_edit() {
        let mut state = FilterState::default();
        let first = state.set_text("name", "c");
        let second = state.set_text("name", "co");
        assert!(second > first);
    }
}
