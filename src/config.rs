//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$EASACCOUNT_CONFIG` (environment variable)
//! 2. `~/.config/easaccount/config.toml` (Linux/macOS)
//!    `%APPDATA%\easaccount\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Provisioning defaults.
    pub provision: ProvisionConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for log files.
    pub cache_dir: Option<PathBuf>,
}

/// Provisioning defaults, overridable per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Offline-store folder override. Must end with a path separator.
    pub data_folder: Option<String>,
    /// Restrict new accounts to a one-month sync window.
    pub sync_one_month: bool,
    /// Show reminders for new accounts.
    pub show_reminders: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            data_folder: None,
            sync_one_month: true,
            show_reminders: true,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("EASACCOUNT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("easaccount").join("config.toml"))
}

/// Return the cache directory used for log files.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("easaccount")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert!(cfg.provision.data_folder.is_none());
        assert!(cfg.provision.sync_one_month);
        assert!(cfg.provision.show_reminders);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[provision]
sync_one_month = false
data_folder = 'D:\stores\'
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert!(!cfg.provision.sync_one_month);
        assert_eq!(cfg.provision.data_folder.as_deref(), Some("D:\\stores\\"));
        // Other fields use defaults
        assert_eq!(cfg.general.log_level, "warn");
        assert!(cfg.provision.show_reminders);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.general.log_level, cfg.general.log_level);
        assert_eq!(parsed.provision.sync_one_month, cfg.provision.sync_one_month);
    }
}
