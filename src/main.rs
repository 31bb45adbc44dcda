// opsgrid - Server-backed data grids for the ops console
//
// One shared query/filter protocol drives paginated grids for every entity
// kind in the inventory; per-kind behavior lives in a flat registry.
//
// Architecture:
// - Registry: one capability record per entity kind (columns, decoration,
//   controls, filter target)
// - GridContext: owns the live instances, collaborators and transport
// - Filter controller: debounced per-column search with match modes
// - Scheduler: activity-gated periodic refresh for live tables
// - Bulk client + export engine on top of the same instance state
// - Console shell (stdin/stdout) as the collaborator implementation
// - Demo server (axum): executable reference for the protocols

mod cli;
mod client;
mod columns;
mod commands;
mod config;
mod console;
mod demo;
mod errors;
mod logging;
mod protocol;
mod registry;
mod rows;
mod shell;
mod table;
mod visibility;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use client::HttpTransport;
use config::Config;
use console::Console;
use shell::ConsoleShell;
use table::GridContext;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    if cli::handle_config_command(&cli) {
        return Ok(());
    }

    let mut config = Config::load();
    if let Some(server) = &cli.server {
        config.server_url = server.clone();
    }
    if let Some(page_size) = cli.page_size {
        config.page_size = page_size;
    }

    let _log_guard = logging::init(&config.logging)?;
    tracing::info!(version = config::VERSION, "opsgrid starting");

    // Demo mode binds an ephemeral local server and points the client at it
    let server_url = if cli.demo {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind demo server")?;
        let url = format!("http://{}", listener.local_addr()?);
        let state = Arc::new(demo::DemoState::seeded());
        tokio::spawn(async move {
            if let Err(error) = demo::serve(listener, state).await {
                tracing::error!("Demo server stopped: {:#}", error);
            }
        });
        url
    } else {
        config.server_url.clone()
    };
    tracing::info!(server = %server_url, "using grid server");

    let registry = registry::builtin::registry()
        .map_err(|error| anyhow::anyhow!(error))
        .context("Builtin table registration failed")?;
    let transport = Arc::new(
        HttpTransport::new(&server_url).map_err(|error| anyhow::anyhow!(error))?,
    );
    let console_shell = Arc::new(ConsoleShell::new(config.download_dir.clone()));
    let context = GridContext::new(
        registry,
        config.grid_settings(),
        transport,
        console_shell.clone(),
    );

    Console::new(context, console_shell).run(&cli.table).await
}
