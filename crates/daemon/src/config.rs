//! Configuration management for the midclose daemon.
//!
//! Configuration is loaded from TOML files in the following locations (in order):
//! 1. `%APPDATA%/midclose/config.toml` (Windows standard)
//! 2. `~/.config/midclose/config.toml` (Unix-style, for WSL compatibility)
//! 3. `./config.toml` (current directory, for development)
//!
//! Every field has a default, so an absent or partial file works.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use midclose_core::ClassPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for midclose.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Behavior configuration.
    pub behavior: BehaviorConfig,
    /// Class-name filter extensions.
    pub filter: FilterConfig,
}

/// Behavior-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Milliseconds to wait after the substitute click before sampling the
    /// desktop again. An empirical constant; raise it on machines where
    /// taskbar activation animates slowly.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Start with interception paused; resume via tray or CLI.
    #[serde(default = "default_false")]
    pub start_paused: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            log_level: default_log_level(),
            start_paused: false,
        }
    }
}

/// Additional class-name substrings merged into the built-in lists.
/// The built-ins cannot be removed, only extended.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Extra fragments that classify a window as taskbar area.
    pub extra_taskbar_classes: Vec<String>,

    /// Extra fragments for windows that must never be closed.
    pub extra_protected_classes: Vec<String>,
}

// Default value functions for serde
fn default_settle_delay_ms() -> u64 {
    150
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_false() -> bool {
    false
}

/// Bounds for the settle delay; values outside are clamped by `validate`.
pub const MIN_SETTLE_DELAY_MS: u64 = 20;
pub const MAX_SETTLE_DELAY_MS: u64 = 2000;

/// A non-fatal configuration problem found during validation.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
}

impl Config {
    /// Load configuration from standard locations.
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self> {
        let paths = config_paths();

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Clamp out-of-range values, returning a warning for each adjustment.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let clamped = self
            .behavior
            .settle_delay_ms
            .clamp(MIN_SETTLE_DELAY_MS, MAX_SETTLE_DELAY_MS);
        if clamped != self.behavior.settle_delay_ms {
            warnings.push(ConfigWarning {
                field: "behavior.settle_delay_ms".to_string(),
                message: format!(
                    "{} is outside {}..={}, clamped to {}",
                    self.behavior.settle_delay_ms,
                    MIN_SETTLE_DELAY_MS,
                    MAX_SETTLE_DELAY_MS,
                    clamped
                ),
            });
            self.behavior.settle_delay_ms = clamped;
        }

        warnings
    }

    /// The settle delay as a [`Duration`].
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.behavior.settle_delay_ms)
    }

    /// Build the class policy from built-ins plus configured extras.
    pub fn class_policy(&self) -> ClassPolicy {
        ClassPolicy::with_extras(
            &self.filter.extra_taskbar_classes,
            &self.filter.extra_protected_classes,
        )
    }
}

/// Get all possible config file paths in priority order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Windows standard: %APPDATA%/midclose/config.toml
    if let Some(proj_dirs) = ProjectDirs::from("com", "midclose", "midclose") {
        paths.push(proj_dirs.config_dir().join("config.toml"));
    }

    // 2. Unix-style: ~/.config/midclose/config.toml
    if let Some(home) = dirs_home() {
        paths.push(home.join(".config").join("midclose").join("config.toml"));
    }

    // 3. Current directory: ./config.toml
    paths.push(PathBuf::from("config.toml"));

    paths
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.behavior.settle_delay_ms, 150);
        assert_eq!(config.behavior.log_level, "info");
        assert!(!config.behavior.start_paused);
        assert!(config.filter.extra_taskbar_classes.is_empty());
        assert!(config.filter.extra_protected_classes.is_empty());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.behavior.settle_delay_ms, config.behavior.settle_delay_ms);
        assert_eq!(parsed.behavior.log_level, config.behavior.log_level);
    }

    #[test]
    fn test_config_partial_parse() {
        // Config with only some fields should use defaults for the rest
        let toml_str = r#"
            [behavior]
            settle_delay_ms = 400
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.behavior.settle_delay_ms, 400);
        assert_eq!(config.behavior.log_level, "info"); // default
        assert!(!config.behavior.start_paused); // default
    }

    #[test]
    fn test_validate_clamps_settle_delay() {
        let mut config = Config::default();
        config.behavior.settle_delay_ms = 1;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "behavior.settle_delay_ms");
        assert_eq!(config.behavior.settle_delay_ms, MIN_SETTLE_DELAY_MS);

        let mut config = Config::default();
        config.behavior.settle_delay_ms = 60_000;
        config.validate();
        assert_eq!(config.behavior.settle_delay_ms, MAX_SETTLE_DELAY_MS);
    }

    #[test]
    fn test_validate_accepts_default() {
        let mut config = Config::default();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_filter_extras_parse() {
        let toml_str = r#"
            [filter]
            extra_taskbar_classes = ["MyDock"]
            extra_protected_classes = ["KioskShell", "LauncherHost"]
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.filter.extra_taskbar_classes, vec!["MyDock"]);
        assert_eq!(config.filter.extra_protected_classes.len(), 2);
    }

    #[test]
    fn test_settle_delay_duration() {
        let config = Config::default();
        assert_eq!(config.settle_delay(), Duration::from_millis(150));
    }

    #[test]
    fn test_config_paths_not_empty() {
        let paths = config_paths();
        assert!(!paths.is_empty());
    }
}
