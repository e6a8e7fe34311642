//! Settings for `di-edid-decode`, read from a TOML file

use crate::report::ReportOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 32 KiB, far more than the 256 blocks an EDID can address
pub const DEFAULT_MAX_INPUT_SIZE: usize = 32 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Replace serial numbers with "..." in the report
    #[serde(default)]
    pub hide_serial_numbers: bool,
    /// Also print fields that are rarely set
    #[serde(default)]
    pub uncommon_features: bool,
    /// Print the "Failures:" section
    #[serde(default = "default_show_diagnostics")]
    pub show_diagnostics: bool,
    /// Larger inputs are rejected before parsing
    #[serde(default = "default_max_input_size")]
    pub max_input_size: usize,
}

fn default_show_diagnostics() -> bool { true }
fn default_max_input_size() -> usize { DEFAULT_MAX_INPUT_SIZE }

impl Default for Config {
    fn default() -> Self {
        Self {
            hide_serial_numbers: false,
            uncommon_features: false,
            show_diagnostics: default_show_diagnostics(),
            max_input_size: default_max_input_size(),
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/di-edid-decode/config.toml`, else under `$HOME/.config`
    pub fn default_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("di-edid-decode").join("config.toml"))
    }

    /// Load the default config file, or return defaults if it is missing or
    /// unreadable
    pub fn load() -> Self {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => tracing::warn!("Ignoring config: {}", e),
                }
            }
        }
        tracing::debug!("No config found, using defaults");
        Self::default()
    }

    /// Load an explicitly requested config file; a missing file is an error
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            hide_serial_numbers: self.hide_serial_numbers,
            uncommon_features: self.uncommon_features,
            show_diagnostics: self.show_diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str("hide_serial_numbers = true\n").unwrap();
        assert!(config.hide_serial_numbers);
        assert!(!config.uncommon_features);
        assert!(config.show_diagnostics);
        assert_eq!(config.max_input_size, DEFAULT_MAX_INPUT_SIZE);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_missing_file() {
        let path = std::env::temp_dir().join("di-edid-decode-test-missing/config.toml");
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = std::env::temp_dir().join(format!("di-edid-decode-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(&path, "max_input_size = \"lots\"\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_report_options() {
        let config = Config {
            uncommon_features: true,
            show_diagnostics: false,
            ..Config::default()
        };
        let opts = config.report_options();
        assert!(opts.uncommon_features);
        assert!(!opts.show_diagnostics);
        assert!(!opts.hide_serial_numbers);
    }
}
