//! Engine configuration
//!
//! Settings that shape a terminal instance at construction time, loaded from
//! `~/.vtcore/config.toml` or supplied directly by the host. Loading is
//! lenient: a missing or unparsable file falls back to defaults.
//!
//! ```toml
//! # Scrollback history kept by the main buffer
//! scrollback_lines = 10000
//!
//! # Columns between tab stops
//! tab_width = 8
//!
//! # Wrap long lines at the right margin (DECAWM default)
//! auto_wrap = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Floor applied when the shell reports an error/paused taskbar state
/// without a progress value
pub const TASKBAR_MIN_PROGRESS: usize = 10;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scrollback history kept by the main buffer (the alt buffer never
    /// keeps any)
    pub scrollback_lines: usize,
    /// Columns between tab stops
    pub tab_width: u16,
    /// Initial DECAWM state
    pub auto_wrap: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scrollback_lines: 10000,
            tab_width: 8,
            auto_wrap: true,
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if let Ok(content) = fs::read_to_string(path) {
            match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
                }
            }
        }
        Self::default()
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<(), String> {
        let path = Self::config_path().ok_or("Could not determine config path")?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;
        Ok(())
    }

    fn config_path() -> Option<PathBuf> {
        let home = home_dir()?;
        let dir = home.join(".vtcore");
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir.join("config.toml"))
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.scrollback_lines, 10000);
        assert_eq!(config.tab_width, 8);
        assert!(config.auto_wrap);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("scrollback_lines = 500").unwrap();
        assert_eq!(config.scrollback_lines, 500);
        assert_eq!(config.tab_width, 8);
        assert!(config.auto_wrap);
    }

    #[test]
    fn test_load_from_missing_file_is_default() {
        let config = Config::load_from(Path::new("/nonexistent/vtcore.toml"));
        assert_eq!(config.scrollback_lines, 10000);
    }
}
