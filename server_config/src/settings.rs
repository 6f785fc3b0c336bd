//! TOML settings tuning the provisioning flow.
//!
//! ```toml
//! [readiness]
//! interval_ms = 1000
//! max_attempts = 300
//!
//! [settle]
//! memory_db_ms = 2000
//! object_storage_ms = 2000
//!
//! [pipeline]
//! parallel_fork = true
//! compensate = true
//! ```

use std::path::Path;
use std::time::Duration;

use provisioner::{PipelineOptions, ProvisionerConfig, ReadinessPolicy, SettleDelays};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub readiness: ReadinessSettings,

    /// Post-ready delays per resource kind.
    #[serde(default)]
    pub settle: SettleSettings,

    #[serde(default)]
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessSettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    300
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleSettings {
    #[serde(default = "default_two_seconds")]
    pub memory_db_ms: u64,
    #[serde(default)]
    pub no_sql_ms: u64,
    #[serde(default = "default_two_seconds")]
    pub object_storage_ms: u64,
    #[serde(default)]
    pub transcoder_ms: u64,
    #[serde(default)]
    pub callback_listener_ms: u64,
    #[serde(default)]
    pub packager_ms: u64,
}

fn default_two_seconds() -> u64 {
    2000
}

impl Default for SettleSettings {
    fn default() -> Self {
        Self {
            memory_db_ms: default_two_seconds(),
            no_sql_ms: 0,
            object_storage_ms: default_two_seconds(),
            transcoder_ms: 0,
            callback_listener_ms: 0,
            packager_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Provision storage and transcoder concurrently.
    #[serde(default = "default_true")]
    pub parallel_fork: bool,
    /// Tear down what a failed pipeline creation created.
    #[serde(default = "default_true")]
    pub compensate: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            parallel_fork: true,
            compensate: true,
        }
    }
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.readiness.max_attempts == 0 {
            return Err(ConfigError::validation(
                "readiness.max_attempts must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn provisioner_config(&self) -> ProvisionerConfig {
        let ms = Duration::from_millis;
        ProvisionerConfig {
            readiness: ReadinessPolicy {
                interval: ms(self.readiness.interval_ms),
                max_attempts: self.readiness.max_attempts,
            },
            settle: SettleDelays {
                memory_db: ms(self.settle.memory_db_ms),
                no_sql: ms(self.settle.no_sql_ms),
                object_storage: ms(self.settle.object_storage_ms),
                transcoder: ms(self.settle.transcoder_ms),
                callback_listener: ms(self.settle.callback_listener_ms),
                packager: ms(self.settle.packager_ms),
            },
            pipeline: PipelineOptions {
                parallel_fork: self.pipeline.parallel_fork,
                compensate: self.pipeline.compensate,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_provisioner_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.provisioner_config(), ProvisionerConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let settings = Settings::from_toml(
            r#"
            [readiness]
            max_attempts = 10

            [settle]
            packager_ms = 500

            [pipeline]
            compensate = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.readiness.interval_ms, 1000);
        assert_eq!(settings.readiness.max_attempts, 10);
        assert_eq!(settings.settle.memory_db_ms, 2000);
        assert_eq!(settings.settle.packager_ms, 500);
        assert!(settings.pipeline.parallel_fork);
        assert!(!settings.pipeline.compensate);

        let config = settings.provisioner_config();
        assert_eq!(config.settle.packager, Duration::from_millis(500));
        assert_eq!(config.readiness.max_attempts, 10);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = Settings::from_toml("[readiness]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_invalid_toml() {
        let err = Settings::from_toml("[readiness\n").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.toml");
        tokio::fs::write(&path, "[readiness]\ninterval_ms = 250\n")
            .await
            .unwrap();

        let settings = Settings::load(&path).await.unwrap();
        assert_eq!(settings.readiness.interval_ms, 250);
    }
}
