// Configuration for the grid console
//
// Configuration is loaded in order of precedence:
// 1. Environment variables (highest priority)
// 2. Config file (~/.config/opsgrid/config.toml)
// 3. Built-in defaults (lowest priority)

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::table::GridSettings;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log to a rotating file instead of stderr when set
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the grid server
    pub server_url: String,

    /// Rows per page
    pub page_size: u64,

    /// Quiet window after the last filter keystroke, in milliseconds
    pub debounce_ms: u64,

    /// Periodic refresh interval for live tables, in milliseconds
    pub refresh_interval_ms: u64,

    /// Where CSV exports land
    pub download_dir: PathBuf,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5100".to_string(),
            page_size: 25,
            debounce_ms: 500,
            refresh_interval_ms: 3000,
            download_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
struct FileLogging {
    level: Option<String>,
    file: Option<PathBuf>,
}

/// Config file structure (everything optional; missing keys keep defaults)
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    server_url: Option<String>,
    page_size: Option<u64>,
    debounce_ms: Option<u64>,
    refresh_interval_ms: Option<u64>,
    download_dir: Option<PathBuf>,
    #[serde(default)]
    logging: FileLogging,
}

impl Config {
    /// Load config: defaults, then the config file, then the environment
    pub fn load() -> Self {
        let mut config = Self::default();
        if let Some(file) = Self::read_config_file() {
            config.apply_file(file);
        }
        config.apply_env();
        config
    }

    /// Path to the config file, if a config directory exists
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("opsgrid").join("config.toml"))
    }

    fn read_config_file() -> Option<FileConfig> {
        let path = Self::config_path()?;
        let content = std::fs::read_to_string(&path).ok()?;
        match toml::from_str(&content) {
            Ok(file) => Some(file),
            Err(error) => {
                eprintln!("Ignoring invalid config file {}: {}", path.display(), error);
                None
            }
        }
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(server_url) = file.server_url {
            self.server_url = server_url;
        }
        if let Some(page_size) = file.page_size {
            self.page_size = page_size;
        }
        if let Some(debounce_ms) = file.debounce_ms {
            self.debounce_ms = debounce_ms;
        }
        if let Some(refresh_interval_ms) = file.refresh_interval_ms {
            self.refresh_interval_ms = refresh_interval_ms;
        }
        if let Some(download_dir) = file.download_dir {
            self.download_dir = download_dir;
        }
        if let Some(level) = file.logging.level {
            self.logging.level = level;
        }
        if let Some(log_file) = file.logging.file {
            self.logging.file = Some(log_file);
        }
    }

    fn apply_env(&mut self) {
        if let Ok(server_url) = std::env::var("OPSGRID_SERVER_URL") {
            self.server_url = server_url;
        }
        if let Some(page_size) = env_number("OPSGRID_PAGE_SIZE") {
            self.page_size = page_size;
        }
        if let Some(debounce_ms) = env_number("OPSGRID_DEBOUNCE_MS") {
            self.debounce_ms = debounce_ms;
        }
        if let Some(refresh_interval_ms) = env_number("OPSGRID_REFRESH_MS") {
            self.refresh_interval_ms = refresh_interval_ms;
        }
        if let Ok(download_dir) = std::env::var("OPSGRID_DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(download_dir);
        }
        if let Ok(level) = std::env::var("OPSGRID_LOG") {
            self.logging.level = level;
        }
    }

    /// The engine timings derived from this config
    pub fn grid_settings(&self) -> GridSettings {
        GridSettings {
            page_size: self.page_size.max(1),
            debounce: Duration::from_millis(self.debounce_ms),
            refresh_interval: Duration::from_millis(self.refresh_interval_ms.max(100)),
        }
    }

    /// Render the effective configuration as TOML (config --show/--reset)
    pub fn to_toml(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("server_url = \"{}\"\n", self.server_url));
        out.push_str(&format!("page_size = {}\n", self.page_size));
        out.push_str(&format!("debounce_ms = {}\n", self.debounce_ms));
        out.push_str(&format!(
            "refresh_interval_ms = {}\n",
            self.refresh_interval_ms
        ));
        out.push_str(&format!(
            "download_dir = \"{}\"\n",
            self.download_dir.display()
        ));
        out.push_str("\n[logging]\n");
        out.push_str(&format!("level = \"{}\"\n", self.logging.level));
        if let Some(file) = &self.logging.file {
            out.push_str(&format!("file = \"{}\"\n", file.display()));
        }
        out
    }
}

fn env_number(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serialized defaults must parse back as a valid config file
    #[test]
    fn test_config_roundtrip_default() {
        let config = Config::default();
        let toml_str = config.to_toml();
        let parsed: Result<FileConfig, _> = toml::from_str(&toml_str);
        assert!(
            parsed.is_ok(),
            "Default config should round-trip.\nTOML:\n{}\nError: {:?}",
            toml_str,
            parsed.err()
        );
    }

    #[test]
    fn test_file_values_override_defaults() {
        let file: FileConfig = toml::from_str(
            r#"
            server_url = "http://grids.example.net"
            page_size = 50

            [logging]
            level = "debug"
            "#,
        )
        .expect("valid file");
        let mut config = Config::default();
        config.apply_file(file);

        assert_eq!(config.server_url, "http://grids.example.net");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.logging.level, "debug");
        // Untouched keys keep their defaults
        assert_eq!(config.debounce_ms, 500);
    }

    #[test]
    fn test_grid_settings_conversion() {
        let config = Config {
            debounce_ms: 250,
            refresh_interval_ms: 1000,
            page_size: 0,
            ..Config::default()
        };
        let settings = config.grid_settings();
        assert_eq!(settings.debounce, Duration::from_millis(250));
        assert_eq!(settings.refresh_interval, Duration::from_millis(1000));
        assert_eq!(settings.page_size, 1, "page size is clamped");
    }
}
