use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, TetherError};

/// Top-level configuration for Tether.
///
/// Loaded from `~/.tether/config.toml` by default. Every section falls back
/// to its defaults when omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TetherConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub actions: ActionConfig,
}

impl TetherConfig {
    /// Parse a TOML document. Omitted sections and keys keep their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let config = Self::from_toml(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load configuration, falling back to defaults.
    ///
    /// A missing file is expected on first run and only logged at debug
    /// level; an unreadable or malformed file is a warning.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(TetherError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }
}

/// General settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Run queue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue name, used in log output.
    pub name: String,
    /// Maximum number of proxies running at once. Zero means unbounded.
    pub max_concurrent: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "tether.actions".to_string(),
            max_concurrent: 4,
        }
    }
}

/// Notification service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Refuse to build an engine without a host-supplied notification service.
    pub required: bool,
    /// Log every state transition when no service is supplied.
    pub log_transitions: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            required: false,
            log_transitions: true,
        }
    }
}

/// Action result interpretation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Status code a status-coded action must return to count as successful.
    pub success_status_code: u16,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            success_status_code: 200,
        }
    }
}

/// Load one section of a TOML document over a set of defaults.
///
/// The table stored under `key` is overlaid key by key onto the serialized
/// `defaults`, so any value the file leaves out keeps its default. A missing
/// file or a missing key yields `defaults` unchanged.
pub fn load_section<T>(path: &Path, key: &str, defaults: T) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), key, "Config file missing, using section defaults");
            return Ok(defaults);
        }
        Err(e) => return Err(e.into()),
    };

    let document: toml::Table = toml::from_str(&content)?;
    let Some(section) = document.get(key) else {
        debug!(path = %path.display(), key, "Config section missing, using defaults");
        return Ok(defaults);
    };

    let toml::Value::Table(overrides) = section else {
        return Err(TetherError::Config(format!(
            "section '{}' must be a table",
            key
        )));
    };

    let mut merged = match toml::Value::try_from(&defaults)? {
        toml::Value::Table(table) => table,
        _ => {
            return Err(TetherError::Config(format!(
                "defaults for section '{}' do not serialize to a table",
                key
            )))
        }
    };
    overlay(&mut merged, overrides);

    let value = toml::Value::Table(merged).try_into::<T>()?;
    Ok(value)
}

fn overlay(base: &mut toml::Table, overrides: &toml::Table) {
    for (key, value) in overrides {
        match (base.get_mut(key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                overlay(existing, nested);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_values() {
        let config = TetherConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.queue.name, "tether.actions");
        assert_eq!(config.queue.max_concurrent, 4);
        assert!(!config.notifications.required);
        assert!(config.notifications.log_transitions);
        assert_eq!(config.actions.success_status_code, 200);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[queue]\nmax_concurrent = 16\n").unwrap();

        let config = TetherConfig::load(&path).unwrap();
        assert_eq!(config.queue.max_concurrent, 16);
        assert_eq!(config.queue.name, "tether.actions");
        assert_eq!(config.actions.success_status_code, 200);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        let result = TetherConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(TetherError::Io(_))));
    }

    #[test]
    fn test_load_or_default_on_bad_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "queue = [[[").unwrap();

        let config = TetherConfig::load_or_default(&path);
        assert_eq!(config, TetherConfig::default());
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = TetherConfig::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(config, TetherConfig::default());
    }

    #[test]
    fn test_from_toml_errors_map_to_config() {
        let result = TetherConfig::from_toml("[actions]\nsuccess_status_code = \"ok\"\n");
        assert!(matches!(result, Err(TetherError::Config(_))));

        let text = TetherConfig::default().to_toml().unwrap();
        assert!(text.contains("[queue]"));
        assert_eq!(TetherConfig::from_toml(&text).unwrap(), TetherConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = TetherConfig::default();
        config.notifications.required = true;
        config.actions.success_status_code = 204;
        config.save(&path).unwrap();

        let loaded = TetherConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Transport {
        host: String,
        port: u16,
        retry: Retry,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Retry {
        attempts: u32,
        backoff_ms: u64,
    }

    fn transport_defaults() -> Transport {
        Transport {
            host: "localhost".to_string(),
            port: 8080,
            retry: Retry {
                attempts: 3,
                backoff_ms: 250,
            },
        }
    }

    #[test]
    fn test_load_section_overlays_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        std::fs::write(
            &path,
            "[transport]\nport = 9090\n\n[transport.retry]\nattempts = 5\n",
        )
        .unwrap();

        let loaded = load_section(&path, "transport", transport_defaults()).unwrap();
        assert_eq!(loaded.host, "localhost");
        assert_eq!(loaded.port, 9090);
        assert_eq!(loaded.retry.attempts, 5);
        assert_eq!(loaded.retry.backoff_ms, 250);
    }

    #[test]
    fn test_load_section_missing_key_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        std::fs::write(&path, "[other]\nvalue = 1\n").unwrap();

        let loaded = load_section(&path, "transport", transport_defaults()).unwrap();
        assert_eq!(loaded, transport_defaults());
    }

    #[test]
    fn test_load_section_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded =
            load_section(&dir.path().join("absent.toml"), "transport", transport_defaults())
                .unwrap();
        assert_eq!(loaded, transport_defaults());
    }

    #[test]
    fn test_load_section_wrong_type_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        std::fs::write(&path, "[transport]\nport = \"not a number\"\n").unwrap();

        let result = load_section(&path, "transport", transport_defaults());
        assert!(matches!(result, Err(TetherError::Config(_))));
    }

    #[test]
    fn test_load_section_non_table_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        std::fs::write(&path, "transport = 12\n").unwrap();

        let err = load_section(&path, "transport", transport_defaults()).unwrap_err();
        assert!(err.to_string().contains("must be a table"));
    }
}
