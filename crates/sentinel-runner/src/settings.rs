use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sentinel_core::{RetryPolicy, Threshold};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where configuration values come from. Blank values count as unset.
pub trait ConfigSource {
    fn raw(&self, key: &str) -> Option<String>;

    fn get(&self, key: &str) -> Option<String> {
        self.raw(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }
}

/// The process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn raw(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapSource(HashMap<String, String>);

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn without(mut self, key: &str) -> Self {
        self.0.remove(key);
        self
    }
}

impl ConfigSource for MapSource {
    fn raw(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("read {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("parse {}: {source}", path.display())]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("{key}: expected a boolean, got {value:?}")]
    InvalidFlag { key: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub disk: Threshold,
    pub memory: Threshold,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { disk: Threshold::DISK, memory: Threshold::MEMORY }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_backoff_secs: u64,
    /// Upper bound on any single wait, `Retry-After` hints included.
    pub max_backoff_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_attempts: 3, base_backoff_secs: 1, max_backoff_secs: 30 }
    }
}

/// Per-call network timeouts, in seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub api_secs: u64,
    pub publish_secs: u64,
    pub alert_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { api_secs: 3, publish_secs: 5, alert_secs: 3 }
    }
}

/// Non-secret knobs of the gate. Loaded from an optional TOML file, then
/// overlaid with `RS_*` environment variables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub alert_webhook: Option<String>,
    pub skip_git_checks: bool,
    pub metrics_dir: PathBuf,
    pub allowed_branches: Vec<String>,
    pub remote: String,
    pub github_api_url: String,
    pub disk_path: PathBuf,
    pub thresholds: Thresholds,
    pub retry: RetrySettings,
    pub timeouts: Timeouts,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            alert_webhook: None,
            skip_git_checks: false,
            metrics_dir: PathBuf::from("/tmp"),
            allowed_branches: vec!["main".to_string(), "master".to_string()],
            remote: "origin".to_string(),
            github_api_url: "https://api.github.com".to_string(),
            disk_path: PathBuf::from("/"),
            thresholds: Thresholds::default(),
            retry: RetrySettings::default(),
            timeouts: Timeouts::default(),
        }
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, SettingsError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::InvalidFlag { key, value: value.to_string() }),
    }
}

impl Settings {
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let s = std::fs::read_to_string(path)
            .map_err(|source| SettingsError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&s).map_err(|source| SettingsError::Parse { path: path.to_path_buf(), source })
    }

    /// File named by `file`, else by `RS_CONFIG`, else defaults; then the
    /// environment overlay.
    pub fn load(file: Option<&Path>, source: &dyn ConfigSource) -> Result<Self, SettingsError> {
        let from_env = source.get("RS_CONFIG").map(PathBuf::from);
        let mut settings = match file.or(from_env.as_deref()) {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        settings.overlay(source)?;
        Ok(settings)
    }

    /// Defaults plus only the side-channel destinations from the
    /// environment. Used to report a run whose settings failed to load.
    pub fn fallback(source: &dyn ConfigSource) -> Self {
        let mut settings = Self { alert_webhook: source.get("RS_ALERT_WEBHOOK"), ..Self::default() };
        if let Some(dir) = source.get("RS_METRICS_DIR") {
            settings.metrics_dir = PathBuf::from(shellexpand::tilde(&dir).to_string());
        }
        settings
    }

    pub fn overlay(&mut self, source: &dyn ConfigSource) -> Result<(), SettingsError> {
        if let Some(url) = source.get("RS_ALERT_WEBHOOK") {
            self.alert_webhook = Some(url);
        }
        if let Some(flag) = source.get("RS_SKIP_GIT_CHECKS") {
            self.skip_git_checks = parse_flag("RS_SKIP_GIT_CHECKS", &flag)?;
        }
        if let Some(dir) = source.get("RS_METRICS_DIR") {
            self.metrics_dir = PathBuf::from(dir);
        }
        let expanded = shellexpand::tilde(&self.metrics_dir.to_string_lossy()).to_string();
        self.metrics_dir = PathBuf::from(expanded);
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.max_attempts, Duration::from_secs(self.retry.base_backoff_secs))
            .with_max_delay(Duration::from_secs(self.retry.max_backoff_secs))
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.api_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.publish_secs)
    }

    pub fn alert_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.alert_secs)
    }
}
