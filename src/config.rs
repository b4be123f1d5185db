use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::baseline::BaselineConfig;
use crate::logging::LogConfig;
use crate::metrics::SpectralConfig;
use crate::quality::QualityBounds;
use crate::readiness::ReadinessWeights;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application metadata
    pub metadata: ConfigMetadata,

    /// General application settings
    pub settings: AppSettings,

    /// Physiological bounds for the quality gate
    #[serde(default)]
    pub quality: QualityBounds,

    /// Frequency-domain analysis settings
    #[serde(default)]
    pub spectral: SpectralConfig,

    /// Baseline and trend windows
    #[serde(default)]
    pub baseline: BaselineConfig,

    /// Readiness scoring settings
    #[serde(default)]
    pub readiness: ReadinessSettings,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Data directory path
    pub data_dir: PathBuf,

    /// SQLite database file; defaults to `<data_dir>/hrvbudget.db`
    pub database_path: Option<PathBuf>,

    /// User id used when a command does not name one
    pub default_user: String,
}

/// Readiness scoring settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessSettings {
    /// Component weights, must sum to 1.0
    pub weights: ReadinessWeights,

    /// Days of score history scanned for the PEM streak
    pub pem_history_days: i64,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            weights: ReadinessWeights::default(),
            pem_history_days: 7,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();

        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            settings: AppSettings::default(),
            quality: QualityBounds::default(),
            spectral: SpectralConfig::default(),
            baseline: BaselineConfig::default(),
            readiness: ReadinessSettings::default(),
            logging: LogConfig::default(),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("hrvbudget"),
            database_path: None,
            default_user: "default".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".hrvbudget")
            .join("config.toml")
    }

    /// Load the default config file, falling back to defaults when it is missing
    ///
    /// A file that exists but fails to parse or validate is still an error.
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            tracing::debug!(path = %config_path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Resolved database location
    pub fn database_path(&self) -> PathBuf {
        self.settings
            .database_path
            .clone()
            .unwrap_or_else(|| self.settings.data_dir.join("hrvbudget.db"))
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        if !(self.quality.min_hr > 0.0 && self.quality.min_hr < self.quality.max_hr) {
            bail!(
                "quality bounds must satisfy 0 < min_hr < max_hr (got {} and {})",
                self.quality.min_hr,
                self.quality.max_hr
            );
        }

        if !(self.spectral.resample_hz > 0.0) || self.spectral.max_segment_len == 0 {
            bail!("spectral resample_hz and max_segment_len must be positive");
        }

        if self.baseline.window_days <= 0 || self.baseline.min_readings == 0 {
            bail!("baseline window_days and min_readings must be positive");
        }

        if self.baseline.trend_days <= 0 || self.baseline.trend_min_readings == 0 {
            bail!("baseline trend_days and trend_min_readings must be positive");
        }

        if self.readiness.pem_history_days <= 0 {
            bail!("readiness pem_history_days must be positive");
        }

        self.readiness
            .weights
            .validate()
            .context("Invalid readiness weights")?;

        if self.settings.default_user.trim().is_empty() {
            bail!("settings default_user must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SpectralMethod;
    use tempfile::tempdir;

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.metadata.version, deserialized.metadata.version);
        assert_eq!(config.baseline, deserialized.baseline);
        assert_eq!(config.readiness, deserialized.readiness);
        assert_eq!(deserialized.spectral.method, SpectralMethod::Welch);
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.baseline.window_days, 28);
        assert_eq!(config.readiness.pem_history_days, 7);
        assert!(config.database_path().ends_with("hrvbudget.db"));
    }

    #[test]
    fn test_sections_fall_back_to_defaults() {
        let toml_str = r#"
            [metadata]
            version = "1.0"
            created_at = "2024-01-01T00:00:00Z"
            updated_at = "2024-01-01T00:00:00Z"

            [settings]
            data_dir = "/tmp/hrv"
            default_user = "alice"

            [baseline]
            window_days = 14
            min_readings = 5
            trend_days = 7
            trend_min_readings = 3
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.baseline.window_days, 14);
        assert_eq!(config.quality, QualityBounds::default());
        assert_eq!(config.database_path(), PathBuf::from("/tmp/hrv/hrvbudget.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut config = AppConfig::default();
        config.readiness.weights.hrv = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut config = AppConfig::default();
        config.quality.min_hr = 220.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = AppConfig::default();
        original.settings.default_user = "alice".to_string();
        original.baseline.min_readings = 10;

        original.save_to_file(&config_path).unwrap();
        let loaded = AppConfig::load_from_file(&config_path).unwrap();

        assert_eq!(loaded.settings.default_user, "alice");
        assert_eq!(loaded.baseline.min_readings, 10);
    }

    #[test]
    fn test_invalid_file_fails_to_load() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.readiness.pem_history_days = 0;
        config.save_to_file(&config_path).unwrap();

        assert!(AppConfig::load_from_file(&config_path).is_err());
    }
}
