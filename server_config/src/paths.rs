//! XDG-compliant configuration paths.

use std::path::{Path, PathBuf};

use crate::{error::Result, ConfigError, APP_NAME};

/// Default location: `~/.config/osc-mcp/`
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    config_dir: PathBuf,
}

impl ConfigPaths {
    /// Create paths using XDG defaults.
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::PathError("Could not determine config directory".into()))?
            .join(APP_NAME);
        Ok(Self { config_dir })
    }

    /// Create paths with a custom base directory (for testing).
    pub fn with_base(base: impl AsRef<Path>) -> Self {
        Self {
            config_dir: base.as_ref().join("config"),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_with_base() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_base(temp.path());

        assert_eq!(paths.config_dir(), temp.path().join("config"));
        assert_eq!(
            paths.settings_file(),
            temp.path().join("config").join("settings.toml")
        );
    }

    #[test]
    fn test_default_paths_use_app_name() {
        if let Ok(paths) = ConfigPaths::new() {
            assert!(paths.config_dir().ends_with(APP_NAME));
        }
    }
}
