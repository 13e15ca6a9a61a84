use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::core::credentials::KEYCHAIN_SERVICE;

pub const USAGE_URL: &str = "https://api.anthropic.com/api/oauth/usage";

/// Poll cadences offered to the user, in seconds.
pub const REFRESH_INTERVALS: [u64; 3] = [30, 60, 120];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Seconds between polls in `watch` mode
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    #[serde(default = "default_true")]
    pub alerts_enabled: bool,
    #[serde(default = "default_format")]
    pub default_format: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_refresh_interval() -> u64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_format() -> String {
    "text".to_string()
}
fn default_color() -> String {
    "auto".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            alerts_enabled: true,
            default_format: default_format(),
            color: default_color(),
        }
    }
}

impl Settings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_keychain_service")]
    pub keychain_service: String,
    /// Upper bound for the `security` subprocess
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_endpoint() -> String {
    USAGE_URL.to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_keychain_service() -> String {
    KEYCHAIN_SERVICE.to_string()
}
fn default_command_timeout() -> u64 {
    5
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
            keychain_service: default_keychain_service(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Overrides the default history file location
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl AppConfig {
    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".config")
            });
        config_dir.join("cmon").join("config.toml")
    }

    /// Load config from the default path, falling back to defaults if not found
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Serialize and write this config to the config file path.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// History file location: the configured override, else
    /// `$XDG_DATA_HOME/cmon/usage-history.json`.
    pub fn history_path(&self) -> PathBuf {
        if let Some(path) = &self.history.path {
            return path.clone();
        }
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".local")
                    .join("share")
            });
        data_dir.join("cmon").join("usage-history.json")
    }

    /// Validate the config
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !REFRESH_INTERVALS.contains(&self.settings.refresh_interval) {
            issues.push(format!(
                "Invalid refresh_interval: {} (must be 30, 60 or 120)",
                self.settings.refresh_interval
            ));
        }
        if !["text", "json"].contains(&self.settings.default_format.as_str()) {
            issues.push(format!(
                "Invalid default_format: '{}' (must be 'text' or 'json')",
                self.settings.default_format
            ));
        }
        if !["auto", "always", "never"].contains(&self.settings.color.as_str()) {
            issues.push(format!(
                "Invalid color: '{}' (must be 'auto', 'always', or 'never')",
                self.settings.color
            ));
        }
        if let Err(e) = crate::core::client::validate_endpoint(&self.source.endpoint) {
            issues.push(format!("Invalid endpoint: {}", e));
        }
        if self.source.request_timeout_secs == 0 {
            issues.push("request_timeout_secs must be greater than 0".to_string());
        }
        if self.source.command_timeout_secs == 0 {
            issues.push("command_timeout_secs must be greater than 0".to_string());
        }
        if self.source.keychain_service.trim().is_empty() {
            issues.push("keychain_service must not be empty".to_string());
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let issues = config.validate();
        assert!(issues.is_empty(), "Default config should be valid, got: {:?}", issues);
    }

    #[test]
    fn default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.refresh_interval, 60);
        assert!(settings.alerts_enabled);
        assert_eq!(settings.default_format, "text");
        assert_eq!(settings.color, "auto");
        assert_eq!(settings.refresh_interval(), Duration::from_secs(60));
    }

    #[test]
    fn default_source_targets_usage_endpoint() {
        let source = SourceConfig::default();
        assert_eq!(source.endpoint, "https://api.anthropic.com/api/oauth/usage");
        assert_eq!(source.request_timeout_secs, 30);
        assert_eq!(source.keychain_service, "Claude Code-credentials");
    }

    #[test]
    fn validate_catches_unsupported_interval() {
        let mut config = AppConfig::default();
        config.settings.refresh_interval = 45;
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("refresh_interval")));

        for secs in REFRESH_INTERVALS {
            config.settings.refresh_interval = secs;
            assert!(config.validate().is_empty());
        }
    }

    #[test]
    fn validate_catches_invalid_format() {
        let mut config = AppConfig::default();
        config.settings.default_format = "xml".to_string();
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("default_format")));
    }

    #[test]
    fn validate_catches_invalid_color() {
        let mut config = AppConfig::default();
        config.settings.color = "blue".to_string();
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("color")));
    }

    #[test]
    fn validate_catches_plain_http_endpoint() {
        let mut config = AppConfig::default();
        config.source.endpoint = "http://evil.example.com/usage".to_string();
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("endpoint")));
    }

    #[test]
    fn validate_catches_zero_timeouts() {
        let mut config = AppConfig::default();
        config.source.request_timeout_secs = 0;
        config.source.command_timeout_secs = 0;
        let issues = config.validate();
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn parse_minimal_toml() {
        let toml = r#"
[settings]
refresh_interval = 30
alerts_enabled = false
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.settings.refresh_interval, 30);
        assert!(!config.settings.alerts_enabled);
        assert_eq!(config.settings.default_format, "text");
        assert_eq!(config.source.command_timeout_secs, 5);
    }

    #[test]
    fn parse_source_and_history_toml() {
        let toml = r#"
[source]
keychain_service = "Custom-credentials"

[history]
path = "/tmp/cmon-history.json"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.source.keychain_service, "Custom-credentials");
        assert_eq!(config.source.endpoint, USAGE_URL);
        assert_eq!(config.history_path(), PathBuf::from("/tmp/cmon-history.json"));
    }

    #[test]
    fn parse_empty_toml_gives_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.settings.refresh_interval, 60);
        assert!(config.history.path.is_none());
    }

    #[test]
    fn load_from_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.settings.refresh_interval, 60);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[settings\nrefresh_interval = ").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = AppConfig::default();
        config.settings.refresh_interval = 120;
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.settings.refresh_interval, 120);
        assert_eq!(parsed.source.endpoint, USAGE_URL);
    }
}
