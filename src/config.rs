//! Persistent application configuration.
//!
//! Stored and loaded through `confy` in the per-user config directory; all
//! fields are optional with sane defaults, and a malformed or absent file is
//! an error only when the user explicitly asked for one.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, PrepResult};

const APP_NAME: &str = "ollama-prep";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Overrides the platform cache directory when set.
    pub cache_root: Option<PathBuf>,
    /// Keep per-invocation download/scratch directories after a run.
    pub keep_downloads: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_root: None,
            keep_downloads: false,
        }
    }
}

impl AppConfig {
    /// Loads the stored config, then applies the command-line override on
    /// top of it.
    pub fn load(cache_root_override: Option<PathBuf>) -> PrepResult<Self> {
        let mut config: AppConfig =
            confy::load(APP_NAME, None).map_err(|e| PrepError::InvalidConfiguration {
                field: "config file",
                reason: e.to_string(),
            })?;
        if cache_root_override.is_some() {
            config.cache_root = cache_root_override;
        }
        Ok(config)
    }

    /// The effective cache root: explicit override, else the platform cache
    /// directory, else a temp-dir fallback for exotic environments.
    pub fn cache_root(&self) -> PathBuf {
        if let Some(root) = &self.cache_root {
            return root.clone();
        }
        directories::ProjectDirs::from("", "", APP_NAME)
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_default_root() {
        let config = AppConfig {
            cache_root: Some(PathBuf::from("/tmp/elsewhere")),
            ..Default::default()
        };
        assert_eq!(config.cache_root(), PathBuf::from("/tmp/elsewhere"));
    }

    #[test]
    fn default_root_is_nonempty() {
        let config = AppConfig::default();
        assert!(!config.cache_root().as_os_str().is_empty());
    }
}
