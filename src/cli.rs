// CLI module - command-line argument parsing and handlers
//
// The bare binary connects to a grid server (or the built-in demo server)
// and opens a table; the config subcommand manages the config file:
// - config --show: Display effective configuration
// - config --reset: Regenerate config file with defaults
// - config --path: Show config file path

use std::io::Write;

use crate::config::{Config, VERSION};
use clap::{Parser, Subcommand};

/// opsgrid - server-backed data grids for the ops console
#[derive(Parser)]
#[command(name = "opsgrid")]
#[command(version = VERSION)]
#[command(about = "Server-backed data grids for the ops console", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Grid server base URL (overrides config)
    #[arg(long)]
    pub server: Option<String>,

    /// Run against a built-in demo server with seeded data
    #[arg(long)]
    pub demo: bool,

    /// Table kind to open at startup
    #[arg(long, default_value = "device")]
    pub table: String,

    /// Rows per page (overrides config)
    #[arg(long)]
    pub page_size: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

/// Handle the config subcommand. Returns true if it ran (exit after).
pub fn handle_config_command(cli: &Cli) -> bool {
    match &cli.command {
        Some(Commands::Config { show, reset, path }) => {
            if *path {
                handle_config_path();
            } else if *show {
                handle_config_show();
            } else if *reset {
                handle_config_reset();
            } else {
                println!("Usage: opsgrid config [--show|--reset|--path]");
                println!();
                println!("Options:");
                println!("  --show    Display effective configuration");
                println!("  --reset   Reset config file to defaults");
                println!("  --path    Show config file path");
            }
            true
        }
        None => false,
    }
}

fn handle_config_path() {
    match Config::config_path() {
        Some(path) => println!("{}", path.display()),
        None => eprintln!("No config directory available on this platform"),
    }
}

fn handle_config_show() {
    println!("{}", Config::load().to_toml());
}

fn handle_config_reset() {
    let Some(path) = Config::config_path() else {
        eprintln!("No config directory available on this platform");
        return;
    };
    let result = path
        .parent()
        .map(std::fs::create_dir_all)
        .unwrap_or(Ok(()))
        .and_then(|_| {
            let mut file = std::fs::File::create(&path)?;
            file.write_all(Config::default().to_toml().as_bytes())
        });
    match result {
        Ok(()) => println!("Config reset: {}", path.display()),
        Err(error) => eprintln!("Failed to write {}: {}", path.display(), error),
    }
}
