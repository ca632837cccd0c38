//! CLI argument definitions for the `tether` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Tether: schedules a batch of ledger actions onto the action engine and
/// reports how each one finished.
#[derive(Parser, Debug)]
#[command(name = "tether", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Number of actions to schedule.
    #[arg(short = 'n', long = "actions", default_value_t = 8)]
    pub actions: usize,

    /// Records each action writes.
    #[arg(long = "records", default_value_t = 3)]
    pub records: u64,

    /// Simulated work per record, in milliseconds.
    #[arg(long = "work-ms", default_value_t = 25)]
    pub work_ms: u64,

    /// Every Nth action answers with a non-OK status.
    #[arg(long = "fail-every")]
    pub fail_every: Option<usize>,

    /// Every Nth action is canceled right after scheduling.
    #[arg(long = "cancel-every")]
    pub cancel_every: Option<usize>,

    /// Override `queue.max_concurrent` (0 = unbounded).
    #[arg(long = "max-concurrent")]
    pub max_concurrent: Option<usize>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TETHER_CONFIG env var > ~/.tether/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TETHER_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Whether the action at zero-based `index` should report failure.
    pub fn should_fail(&self, index: usize) -> bool {
        every_nth(self.fail_every, index)
    }

    /// Whether the action at zero-based `index` should be canceled.
    pub fn should_cancel(&self, index: usize) -> bool {
        every_nth(self.cancel_every, index)
    }
}

fn every_nth(n: Option<usize>, index: usize) -> bool {
    matches!(n, Some(n) if n > 0 && (index + 1) % n == 0)
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".tether").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".tether").join("config.toml");
    }
    PathBuf::from("config.toml")
}
