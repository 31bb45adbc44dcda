//! Collaborator interfaces consumed by the grid engine
//!
//! The engine never touches a rendering toolkit: notifications, panels,
//! form serialization, activity probing, downloads, clipboard and page
//! rendering all go through the `Shell` trait. The shipped implementation
//! is a plain-text console; tests use a recording shell.

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use unicode_width::UnicodeWidthStr;

use crate::protocol::FormPayload;
use crate::rows::RenderedPage;

/// Notification severity, as understood by the hosting console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl NotifyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyLevel::Success => "success",
            NotifyLevel::Info => "info",
            NotifyLevel::Warning => "warning",
            NotifyLevel::Error => "error",
        }
    }
}

/// What the panel opener needs to present a modal surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSpec {
    /// Panel template name ("table", "bulk_deletion", ...)
    pub name: String,
    /// Unique panel id, used by `close_panel`
    pub id: String,
    pub title: String,
}

/// The collaborator surface the engine talks to
pub trait Shell: Send + Sync {
    fn notify(&self, message: &str, level: NotifyLevel, seconds: u64);

    fn open_panel(&self, spec: PanelSpec);

    fn close_panel(&self, panel_id: &str);

    /// Serialize an externally owned form (bulk-edit panels); the search
    /// form is engine state and never goes through here
    fn serialize_form(&self, form_id: &str) -> FormPayload;

    fn is_user_active(&self) -> bool;

    fn download_file(&self, name: &str, content: &str, extension: &str) -> Result<()>;

    fn copy_to_clipboard(&self, text: &str) -> Result<()>;

    fn render_page(&self, instance_id: &str, page: &RenderedPage);
}

/// How long after the last keystroke the user still counts as active
const ACTIVITY_WINDOW: Duration = Duration::from_secs(60);

/// Plain-text console implementation of the collaborator surface
pub struct ConsoleShell {
    download_dir: PathBuf,
    last_activity: Mutex<Instant>,
    /// Externally filled forms, keyed by form id (the console's stand-in
    /// for DOM forms)
    forms: Mutex<std::collections::HashMap<String, FormPayload>>,
    /// Last rendered page per instance, kept for row lookups from the
    /// console prompt
    pages: Mutex<std::collections::HashMap<String, RenderedPage>>,
}

impl ConsoleShell {
    pub fn new(download_dir: PathBuf) -> Self {
        Self {
            download_dir,
            last_activity: Mutex::new(Instant::now()),
            forms: Mutex::new(std::collections::HashMap::new()),
            pages: Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// The page most recently rendered for an instance
    pub fn page_for(&self, instance_id: &str) -> Option<RenderedPage> {
        self.pages
            .lock()
            .expect("pages lock poisoned")
            .get(instance_id)
            .cloned()
    }

    /// Record user input; the periodic scheduler skips ticks once this
    /// goes stale
    pub fn touch(&self) {
        *self.last_activity.lock().expect("activity lock poisoned") = Instant::now();
    }

    /// Stage a form payload under an id, to be picked up by
    /// `serialize_form` (bulk edit)
    pub fn stage_form(&self, form_id: &str, payload: FormPayload) {
        self.forms
            .lock()
            .expect("forms lock poisoned")
            .insert(form_id.to_string(), payload);
    }
}

impl Shell for ConsoleShell {
    fn notify(&self, message: &str, level: NotifyLevel, _seconds: u64) {
        match level {
            NotifyLevel::Error => tracing::error!("{}", message),
            NotifyLevel::Warning => tracing::warn!("{}", message),
            _ => tracing::info!("{}", message),
        }
        println!("[{}] {}", level.as_str(), message);
    }

    fn open_panel(&self, spec: PanelSpec) {
        tracing::debug!(panel = %spec.id, "opening panel");
        println!("--- {} ---", spec.title);
    }

    fn close_panel(&self, panel_id: &str) {
        tracing::debug!(panel = %panel_id, "closing panel");
    }

    fn serialize_form(&self, form_id: &str) -> FormPayload {
        self.forms
            .lock()
            .expect("forms lock poisoned")
            .get(form_id)
            .cloned()
            .unwrap_or_default()
    }

    fn is_user_active(&self) -> bool {
        self.last_activity
            .lock()
            .expect("activity lock poisoned")
            .elapsed()
            < ACTIVITY_WINDOW
    }

    fn download_file(&self, name: &str, content: &str, extension: &str) -> Result<()> {
        fs::create_dir_all(&self.download_dir).context("Failed to create download directory")?;
        let path = self.download_dir.join(format!("{}.{}", name, extension));
        let mut file = fs::File::create(&path).context("Failed to create download file")?;
        file.write_all(content.as_bytes())
            .context("Failed to write download file")?;
        println!("[download] {}", path.display());
        Ok(())
    }

    fn copy_to_clipboard(&self, text: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new().context("Failed to access clipboard")?;
        clipboard
            .set_text(text)
            .context("Failed to set clipboard text")?;
        Ok(())
    }

    fn render_page(&self, instance_id: &str, page: &RenderedPage) {
        self.pages
            .lock()
            .expect("pages lock poisoned")
            .insert(instance_id.to_string(), page.clone());
        println!("{}", format_page(instance_id, page));
    }
}

/// Render one page as an aligned text table. Width math goes through
/// unicode-width so CJK names line up.
pub fn format_page(instance_id: &str, page: &RenderedPage) -> String {
    let headers: Vec<&str> = page
        .columns
        .iter()
        .filter(|column| column.visible)
        .map(|column| column.spec.title.as_str())
        .collect();
    let keys: Vec<&str> = page
        .columns
        .iter()
        .filter(|column| column.visible)
        .map(|column| column.spec.key.as_str())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|header| header.width()).collect();
    let mut body: Vec<Vec<String>> = Vec::with_capacity(page.rows.len());
    for row in &page.rows {
        let mut line = Vec::with_capacity(keys.len());
        for (index, key) in keys.iter().enumerate() {
            let text = row.cell_text(key).unwrap_or_default().to_string();
            widths[index] = widths[index].max(text.width());
            line.push(text);
        }
        body.push(line);
    }

    let mut out = String::new();
    out.push_str(&format!("== {} ==\n", instance_id));
    out.push_str(&format_line(&headers, &widths));
    out.push('\n');
    for line in &body {
        let cells: Vec<&str> = line.iter().map(String::as_str).collect();
        out.push_str(&format_line(&cells, &widths));
        out.push('\n');
    }
    out.push_str(&format!(
        "page {}/{} | {} of {} records",
        page.page + 1,
        page.page_count().max(1),
        page.records_filtered,
        page.records_total,
    ));
    out
}

fn format_line(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{}{}", cell, " ".repeat(width.saturating_sub(cell.width()))))
        .collect::<Vec<_>>()
        .join("  ")
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{ColumnSpec, RuntimeColumn};
    use crate::rows::RenderRow;

    #[test]
    fn test_format_page_hides_invisible_columns() {
        let mut raw = serde_json::Map::new();
        raw.insert("id".to_string(), serde_json::json!(1));
        raw.insert("name".to_string(), serde_json::json!("r1"));
        raw.insert("secret".to_string(), serde_json::json!("x"));
        let page = RenderedPage {
            columns: vec![
                RuntimeColumn {
                    spec: ColumnSpec::text("name", "Name"),
                    visible: true,
                },
                RuntimeColumn {
                    spec: ColumnSpec::text("secret", "Secret"),
                    visible: false,
                },
            ],
            rows: vec![RenderRow::from_raw("device", &raw)],
            page: 0,
            page_size: 25,
            records_total: 1,
            records_filtered: 1,
        };
        let text = format_page("device", &page);
        assert!(text.contains("Name"));
        assert!(!text.contains("Secret"));
        assert!(text.contains("r1"));
    }
}
