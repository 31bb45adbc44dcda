//! Interactive console driving the grids
//!
//! A line-based prompt over stdin: paging, sorting, per-column search with
//! match modes, boolean filters, column visibility, clear, export,
//! clipboard copy, relation grids and the bulk operations. Row actions go
//! through the command dispatch table; anything the console does not bind
//! (edit panels, runtime views) reports as unbound instead of executing.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::columns::MatchMode;
use crate::commands::{CommandTable, RowCommand};
use crate::protocol::{FormPayload, SortDirection};
use crate::rows::Cell;
use crate::shell::{ConsoleShell, NotifyLevel, Shell};
use crate::table::instance::TableInstance;
use crate::table::GridContext;

const HELP: &str = "\
commands:
  kinds                       list table kinds
  open <kind>                 open a top-level grid
  page <n> | size <n>         paging (1-based page)
  sort <column> [asc|desc]    server-side ordering
  search <column> <text>      per-column search (debounced)
  mode <column> <inclusion|equality|regex>
  bool <column> <true|false|any>
  field <key> <value>         discrete form field (refreshes)
  relation <key> <id,id,..>   relation-based advanced search selection
  clear                       clear all search parameters
  columns | show <c> | hide <c>
  controls                    list this grid's control bar
  refresh | export | copy
  row <id> <command>          dispatch a row action
  rel <kind> <row-id>         open the row's relation grid
  back                        close the current relation grid
  delete-all confirm          bulk delete by current filter
  remove-all confirm          bulk relation removal (relation grids)
  edit-all <field>=<value>..  bulk edit by current filter
  quit";

pub struct Console {
    context: Arc<GridContext>,
    shell: Arc<ConsoleShell>,
    /// Instance id stack: the top-level grid, then any relation grids
    stack: Vec<String>,
    commands: CommandTable,
    dispatched: mpsc::UnboundedReceiver<RowCommand>,
}

impl Console {
    pub fn new(context: Arc<GridContext>, shell: Arc<ConsoleShell>) -> Self {
        let (tx, dispatched) = mpsc::unbounded_channel();
        let mut commands = CommandTable::new();
        commands.bind("open_relation_table", move |command| {
            let _ = tx.send(command.clone());
        });
        Self {
            context,
            shell,
            stack: Vec::new(),
            commands,
            dispatched,
        }
    }

    /// Mount the initial grid and drive the prompt until quit
    pub async fn run(mut self, initial_kind: &str) -> Result<()> {
        self.context
            .mount(initial_kind)
            .await
            .context("Failed to mount initial table")?;
        self.stack.push(initial_kind.to_string());
        self.shell.notify(
            &format!("{} table ready.", initial_kind),
            NotifyLevel::Info,
            5,
        );
        println!("type 'help' for commands");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
            self.shell.touch();
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens[0] == "quit" || tokens[0] == "exit" {
                break;
            }
            if let Err(error) = self.handle(&tokens).await {
                println!("error: {:#}", error);
            }
        }
        Ok(())
    }

    fn current_id(&self) -> &str {
        self.stack.last().map(String::as_str).unwrap_or_default()
    }

    async fn handle(&mut self, tokens: &[&str]) -> Result<()> {
        let Some(instance) = self.context.instance(self.current_id()) else {
            anyhow::bail!("no table mounted");
        };
        match tokens {
            ["help"] => println!("{}", HELP),
            ["kinds"] => println!("{}", self.context.registry().kinds().join(" ")),
            ["open", kind] => {
                // Leaving a page unmounts its grids, relation modals included
                for id in self.stack.drain(..).rev() {
                    self.context.destroy(&id);
                }
                self.context.mount(kind).await?;
                self.stack = vec![kind.to_string()];
            }
            ["page", number] => {
                let page: u64 = number.parse().context("page must be a number")?;
                self.context
                    .set_page(&instance, page.saturating_sub(1))
                    .await;
            }
            ["size", number] => {
                let size: u64 = number.parse().context("size must be a number")?;
                self.context.set_page_size(&instance, size).await;
            }
            ["sort", column] => {
                self.context
                    .set_sort(&instance, column, SortDirection::Asc)
                    .await;
            }
            ["sort", column, direction] => {
                let direction = match *direction {
                    "desc" => SortDirection::Desc,
                    _ => SortDirection::Asc,
                };
                self.context.set_sort(&instance, column, direction).await;
            }
            ["search", column, rest @ ..] => {
                let text = rest.join(" ");
                self.context.filter_input(&instance, column, &text);
            }
            ["mode", column, mode] => {
                let mode = MatchMode::parse(mode)
                    .with_context(|| format!("unknown match mode '{}'", mode))?;
                self.context.set_match_mode(&instance, column, mode);
            }
            ["bool", column, value] => {
                let value = match *value {
                    "true" => Some(true),
                    "false" => Some(false),
                    _ => None,
                };
                self.context.filter_bool(&instance, column, value).await;
            }
            ["field", key, value] => {
                self.context
                    .set_form_field(&instance, key, json!(value))
                    .await;
            }
            ["relation", key, ids] => {
                let ids: Vec<u64> = ids
                    .split(',')
                    .filter_map(|id| id.trim().parse().ok())
                    .collect();
                self.context.set_relation_filter(&instance, key, ids);
                self.context.refresh_table(instance.id(), false).await;
            }
            ["clear"] => self.context.clear_search(&instance, true).await,
            ["columns"] => {
                for column in instance.columns() {
                    let marker = if column.visible { "x" } else { " " };
                    println!("[{}] {} ({})", marker, column.spec.key, column.spec.title);
                }
            }
            ["show", column] | ["hide", column] => {
                let showing = tokens[0] == "show";
                let keys: Vec<String> = instance
                    .columns()
                    .iter()
                    .filter(|runtime| {
                        if runtime.spec.key == *column {
                            showing
                        } else {
                            runtime.visible
                        }
                    })
                    .map(|runtime| runtime.spec.key.clone())
                    .collect();
                self.context.set_visible_columns(&instance, &keys).await;
            }
            ["controls"] => {
                for control in instance.controls() {
                    println!("{:?}", control);
                }
            }
            ["refresh"] => self.context.refresh_table(instance.id(), true).await,
            ["export"] => self.context.export_table(&instance).await,
            ["copy"] => self.context.copy_selection(&instance).await,
            ["row", row_id, name] => self.dispatch_row_command(&instance, row_id, name).await?,
            ["rel", kind, row_id] => self.open_relation(&instance, kind, row_id).await?,
            ["back"] => {
                if self.stack.len() > 1 {
                    let id = self.stack.pop().unwrap_or_default();
                    self.context.close_relation_table(&id);
                } else {
                    println!("already at the top-level grid");
                }
            }
            ["delete-all", "confirm"] => self.context.bulk_delete(&instance).await,
            ["delete-all", ..] => {
                println!("this deletes every row matching the current filter; run 'delete-all confirm'");
            }
            ["remove-all", "confirm"] => self.context.bulk_remove(&instance).await,
            ["remove-all", ..] => {
                println!("this severs every filtered row from the relation; run 'remove-all confirm'");
            }
            ["edit-all", pairs @ ..] if !pairs.is_empty() => {
                let form_id = format!("bulk-edit-{}", instance.id());
                let mut form = FormPayload::new();
                for pair in pairs {
                    let Some((field, value)) = pair.split_once('=') else {
                        anyhow::bail!("expected <field>=<value>, got '{}'", pair);
                    };
                    form.insert(field.to_string(), json!(value));
                    form.insert(format!("bulk-edit-{}", field), json!(true));
                }
                self.shell.stage_form(&form_id, form);
                self.context.bulk_edit(&instance, &form_id).await;
            }
            _ => println!("unknown command; type 'help'"),
        }
        Ok(())
    }

    fn find_row(&self, instance_id: &str, row_id: &str) -> Result<crate::rows::RenderRow> {
        let row_id: u64 = row_id.parse().context("row id must be a number")?;
        let page = self
            .shell
            .page_for(instance_id)
            .context("no page rendered yet")?;
        page.rows
            .iter()
            .find(|row| row.identity.id == row_id)
            .cloned()
            .with_context(|| format!("no row {} on the current page", row_id))
    }

    /// Look up a row on the current page and dispatch one of its commands
    /// through the table; unbound commands are reported, not executed
    async fn dispatch_row_command(
        &mut self,
        instance: &Arc<TableInstance>,
        row_id: &str,
        name: &str,
    ) -> Result<()> {
        let row = self.find_row(instance.id(), row_id)?;
        let command = row
            .commands
            .iter()
            .find(|command| command.name() == name)
            .with_context(|| format!("row {} offers no '{}' action", row.identity.id, name))?;
        if !self.commands.dispatch(command) {
            println!("'{}' is handled by an external panel, not this console", name);
        }
        self.drain_dispatched().await
    }

    /// Follow a row's relation link for `kind` and mount the scoped grid
    async fn open_relation(
        &mut self,
        instance: &Arc<TableInstance>,
        kind: &str,
        row_id: &str,
    ) -> Result<()> {
        let row = self.find_row(instance.id(), row_id)?;
        let command = row
            .cells
            .values()
            .find_map(|cell| match cell {
                Cell::Link { command, .. } => match command {
                    RowCommand::OpenRelationTable { target_kind, .. } if target_kind == kind => {
                        Some(command.clone())
                    }
                    _ => None,
                },
                _ => None,
            })
            .with_context(|| format!("row {} has no {} relation", row.identity.id, kind))?;
        self.commands.dispatch(&command);
        self.drain_dispatched().await
    }

    /// Commands the dispatch table routed back to the console (relation
    /// grids) run here, where awaiting is possible
    async fn drain_dispatched(&mut self) -> Result<()> {
        while let Ok(command) = self.dispatched.try_recv() {
            if let RowCommand::OpenRelationTable {
                target_kind,
                owner,
                ends,
            } = command
            {
                let opened = self
                    .context
                    .open_relation_table(&target_kind, &owner, &ends)
                    .await?;
                self.stack.push(opened.id().to_string());
            }
        }
        Ok(())
    }
}
