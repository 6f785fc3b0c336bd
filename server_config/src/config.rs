//! Server configuration assembled from the environment and the settings file.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::{ConfigError, Result};
use crate::paths::ConfigPaths;
use crate::settings::Settings;
use crate::{ACCESS_TOKEN_VAR, ENVIRONMENT_VAR, LOG_JSON_VAR, LOG_LEVEL_VAR, SETTINGS_VAR};

pub const DEFAULT_ENVIRONMENT: &str = "prod";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    /// Level name, e.g. `debug`. `RUST_LOG` takes precedence when set.
    pub level: Option<String>,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Personal access token for the control plane.
    pub access_token: SecretString,
    pub environment: String,
    pub settings: Settings,
    pub log: LogSettings,
    /// Settings file that was loaded, if any.
    pub settings_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Load from the process environment and the default paths.
    pub async fn load() -> Result<Self> {
        let paths = ConfigPaths::new().ok();
        Self::load_with(|key| std::env::var(key).ok(), paths.as_ref()).await
    }

    /// Load using `lookup` for environment variables.
    ///
    /// An explicitly configured settings file must exist; the default one is
    /// optional.
    pub async fn load_with<F>(lookup: F, paths: Option<&ConfigPaths>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::from_lookup(&lookup)?;

        let settings_path = match non_empty(lookup(SETTINGS_VAR)) {
            Some(explicit) => {
                let path = PathBuf::from(explicit);
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                Some(path)
            }
            None => paths
                .map(ConfigPaths::settings_file)
                .filter(|path| path.exists()),
        };

        if let Some(path) = &settings_path {
            config.settings = Settings::load(path).await?;
        }
        config.settings_path = settings_path;
        Ok(config)
    }

    /// Environment-only configuration with default settings.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_token = non_empty(lookup(ACCESS_TOKEN_VAR))
            .ok_or(ConfigError::MissingVariable(ACCESS_TOKEN_VAR))?;
        let environment =
            non_empty(lookup(ENVIRONMENT_VAR)).unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        let log = LogSettings {
            level: non_empty(lookup(LOG_LEVEL_VAR)),
            json: lookup(LOG_JSON_VAR)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        Ok(Self {
            access_token: SecretString::from(access_token),
            environment,
            settings: Settings::default(),
            log,
            settings_path: None,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let err = ServerConfig::from_lookup(env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVariable("OSC_ACCESS_TOKEN")));

        let err = ServerConfig::from_lookup(env(&[("OSC_ACCESS_TOKEN", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVariable(_)));
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(env(&[("OSC_ACCESS_TOKEN", "pat")])).unwrap();
        assert_eq!(config.access_token.expose_secret(), "pat");
        assert_eq!(config.environment, "prod");
        assert_eq!(config.log, LogSettings::default());
        assert!(!format!("{:?}", config).contains("\"pat\""));
    }

    #[test]
    fn test_environment_and_logging() {
        let config = ServerConfig::from_lookup(env(&[
            ("OSC_ACCESS_TOKEN", "pat"),
            ("OSC_ENVIRONMENT", "dev"),
            ("LOG_LEVEL", "debug"),
            ("LOG_JSON", "true"),
        ]))
        .unwrap();
        assert_eq!(config.environment, "dev");
        assert_eq!(config.log.level.as_deref(), Some("debug"));
        assert!(config.log.json);
    }

    #[tokio::test]
    async fn test_default_settings_file_is_optional() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_base(temp.path());

        let config = ServerConfig::load_with(env(&[("OSC_ACCESS_TOKEN", "pat")]), Some(&paths))
            .await
            .unwrap();
        assert!(config.settings_path.is_none());
        assert_eq!(config.settings, Settings::default());
    }

    #[tokio::test]
    async fn test_default_settings_file_is_loaded() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_base(temp.path());
        tokio::fs::create_dir_all(paths.config_dir()).await.unwrap();
        tokio::fs::write(paths.settings_file(), "[pipeline]\nparallel_fork = false\n")
            .await
            .unwrap();

        let config = ServerConfig::load_with(env(&[("OSC_ACCESS_TOKEN", "pat")]), Some(&paths))
            .await
            .unwrap();
        assert!(!config.settings.pipeline.parallel_fork);
        assert_eq!(config.settings_path, Some(paths.settings_file()));
    }

    #[tokio::test]
    async fn test_explicit_settings_file_must_exist() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");
        let missing = missing.to_str().unwrap();

        let err = ServerConfig::load_with(
            env(&[("OSC_ACCESS_TOKEN", "pat"), ("OSC_MCP_SETTINGS", missing)]),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
