//! Layered configuration.
//!
//! Sources, later ones winning:
//! - built-in defaults
//! - `filewarden.toml` (current directory or the nearest ancestor)
//! - environment variables prefixed `FW_`, with `__` separating nesting
//!   levels: `FW_ENGINE__POLL_TIMEOUT_MS=25` sets `engine.poll_timeout_ms`.
//!
//! The engine itself never parses configuration; it consumes the typed
//! watch directives and rules this module yields.

use std::collections::HashMap;
use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::rules::ActionRule;

pub const CONFIG_FILE: &str = "filewarden.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Configuration schema version.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directories to watch.
    #[serde(default, rename = "watch")]
    pub watches: Vec<WatchDirective>,

    /// Action rules, in declaration order.
    #[serde(default, rename = "rule")]
    pub rules: Vec<ActionRule>,

    /// Engine loop tuning.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging levels.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One directory to watch, optionally with its whole subtree.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchDirective {
    pub path: PathBuf,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    /// Bounded wait per poll, in milliseconds.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Sleep between empty poll cycles, in milliseconds.
    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,

    /// Leading bytes read for content classification.
    #[serde(default = "default_max_sniff_bytes")]
    pub max_sniff_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level filter (`error`..`trace`).
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `watcher = "debug"`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_poll_timeout_ms() -> u64 {
    10
}
fn default_idle_sleep_ms() -> u64 {
    1000
}
fn default_max_sniff_bytes() -> usize {
    8192
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            watches: Vec::new(),
            rules: Vec::new(),
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            idle_sleep_ms: default_idle_sleep_ms(),
            max_sniff_bytes: default_max_sniff_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_config_file().unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file plus defaults and env.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("FW_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Nearest `filewarden.toml`, searching from the current directory up.
    fn find_config_file() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            let candidate = ancestor.join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    /// Save the settings as pretty TOML.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, toml_string)
    }

    /// Write a starter config file into the current directory.
    pub fn init_config_file(force: bool) -> std::io::Result<PathBuf> {
        let path = PathBuf::from(CONFIG_FILE);
        if path.exists() && !force {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "configuration file already exists, use --force to overwrite",
            ));
        }
        std::fs::write(&path, STARTER_CONFIG)?;
        Ok(path)
    }

    /// Log the effective watch directives and rules at startup.
    pub fn log_summary(&self) {
        for watch in &self.watches {
            tracing::info!(
                "[config] watch {} (recursive: {})",
                watch.path.display(),
                watch.recursive
            );
        }
        for rule in &self.rules {
            tracing::info!(
                "[config] rule {} {:?} -> {:?} (priority {}, dest {:?})",
                rule.file_type,
                rule.event,
                rule.action,
                rule.priority,
                rule.destination
            );
        }
    }
}

const STARTER_CONFIG: &str = r#"# filewarden configuration
version = 1

# Directories to watch. `recursive = true` covers the whole subtree,
# including subdirectories created later.
#
# [[watch]]
# path = "/home/me/Downloads"
# recursive = true

# Rules: file type code + event -> action. Lowest priority value wins;
# ties go to the rule declared first. Type codes are derived from file
# content, not extensions (jpg, png, gif, pdf, zip, txt, ... or UNK).
#
# [[rule]]
# file_type = "jpg"
# event = "create"
# action = "move"
# destination = "/home/me/Pictures/incoming"
# priority = 1
#
# [[rule]]
# file_type = "pdf"
# event = "create"
# action = "copy"
# destination = "/home/me/Documents/inbox"
# priority = 1

[engine]
poll_timeout_ms = 10
idle_sleep_ms = 1000

[logging]
default = "info"
"#;
