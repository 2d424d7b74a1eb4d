//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use brass_framework::{AbuseLimits, BanPolicy, DispatchSettings, Notices};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BrassConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Dispatcher tunables.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// User-facing notice templates.
    #[serde(default)]
    pub notices: Notices,
}

impl BrassConfig {
    /// Builds the dispatcher settings described by this configuration.
    pub fn dispatch_settings(&self) -> DispatchSettings {
        self.dispatch.to_settings(&self.notices)
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Needs the `json-log` feature; falls back to `full` without it.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Rotation schedule for file output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Target file when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line in each event.
    #[serde(default)]
    pub file_location: bool,

    /// Per-target level overrides, e.g. `brass_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            rotation: LogRotation::default(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            filters: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Parses `level`, returning `None` when it names no tracing level.
    pub fn tracing_level(&self) -> Option<tracing::Level> {
        self.level.parse().ok()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

// =============================================================================
// Dispatch
// =============================================================================

/// Dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Command prefixes; the first one is shown in usage listings.
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,

    #[serde(default = "default_chain_separator")]
    pub chain_separator: String,

    /// Longest chain accepted from senders that are not superusers.
    #[serde(default = "default_max_chained")]
    pub max_chained: usize,

    #[serde(default = "default_same_command_limit")]
    pub same_command_limit: u32,

    #[serde(default = "default_window_secs")]
    pub same_command_window_secs: u64,

    #[serde(default = "default_volume_limit")]
    pub volume_limit: u32,

    #[serde(default = "default_window_secs")]
    pub volume_window_secs: u64,

    #[serde(default = "default_window_secs")]
    pub ban_window_secs: u64,

    /// Highest ban count still answered with a reminder.
    #[serde(default = "default_ban_warn_ceiling")]
    pub ban_warn_ceiling: u32,

    /// How often the runtime evicts expired counters and bans.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Issue tracker linked from developer-facing notices.
    #[serde(default)]
    pub issue_url: Option<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            prefixes: default_prefixes(),
            chain_separator: default_chain_separator(),
            max_chained: default_max_chained(),
            same_command_limit: default_same_command_limit(),
            same_command_window_secs: default_window_secs(),
            volume_limit: default_volume_limit(),
            volume_window_secs: default_window_secs(),
            ban_window_secs: default_window_secs(),
            ban_warn_ceiling: default_ban_warn_ceiling(),
            sweep_interval_secs: default_sweep_interval_secs(),
            issue_url: None,
        }
    }
}

impl DispatchConfig {
    /// Converts to [`DispatchSettings`], attaching the given notices.
    pub fn to_settings(&self, notices: &Notices) -> DispatchSettings {
        DispatchSettings {
            prefixes: self.prefixes.clone(),
            chain_separator: self.chain_separator.clone(),
            max_chained: self.max_chained,
            limits: AbuseLimits {
                same_command_limit: self.same_command_limit,
                same_command_window: Duration::from_secs(self.same_command_window_secs),
                volume_limit: self.volume_limit,
                volume_window: Duration::from_secs(self.volume_window_secs),
            },
            ban: BanPolicy {
                window: Duration::from_secs(self.ban_window_secs),
                warn_ceiling: self.ban_warn_ceiling,
            },
            issue_url: self.issue_url.clone(),
            notices: notices.clone(),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_prefixes() -> Vec<String> {
    vec!["~".to_string(), "～".to_string()]
}

fn default_chain_separator() -> String {
    "&&".to_string()
}

fn default_max_chained() -> usize {
    5
}

fn default_same_command_limit() -> u32 {
    10
}

fn default_volume_limit() -> u32 {
    30
}

fn default_window_secs() -> u64 {
    300
}

fn default_ban_warn_ceiling() -> u32 {
    5
}

fn default_sweep_interval_secs() -> u64 {
    600
}
