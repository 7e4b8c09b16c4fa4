use config::{Config, Environment, File};
use p2p_core::{AnalysisConfig, QuoteError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const ENV_PREFIX: &str = "P2P_MONITOR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub analysis: AnalysisConfig,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// CSV export produced by the collector.
    pub path: PathBuf,
    /// Seconds between refreshes in watch mode.
    pub refresh_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/p2p_bob_usdt.csv"),
            refresh_seconds: 1800,
        }
    }
}

impl MonitorSettings {
    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()?;

        if self.source.refresh_seconds == 0 {
            return Err(QuoteError::Configuration(
                "Refresh interval must be at least one second".to_string(),
            ));
        }

        if self.source.path.as_os_str().is_empty() {
            return Err(QuoteError::Configuration(
                "Source path not configured".to_string(),
            ));
        }

        Ok(())
    }
}

pub struct ConfigManager {
    config: Config,
    settings: MonitorSettings,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        Self::from_file("config.yaml")
    }

    /// Loads a YAML/TOML/JSON file, then applies `P2P_MONITOR_*` overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()
            .map_err(|e| QuoteError::Configuration(e.to_string()))?;

        let manager = Self::from_config(config)?;
        info!("Configuration loaded from {}", path.as_ref().display());
        Ok(manager)
    }

    pub fn from_env() -> Result<Self> {
        let config = Config::builder()
            .add_source(environment())
            .build()
            .map_err(|e| QuoteError::Configuration(e.to_string()))?;

        let manager = Self::from_config(config)?;
        info!("Configuration loaded from environment");
        Ok(manager)
    }

    fn from_config(config: Config) -> Result<Self> {
        let settings: MonitorSettings = config
            .clone()
            .try_deserialize()
            .map_err(|e| QuoteError::Configuration(e.to_string()))?;

        Ok(Self { config, settings })
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut MonitorSettings {
        &mut self.settings
    }

    pub fn into_settings(self) -> MonitorSettings {
        self.settings
    }

    /// Discards in-memory edits and restores the loaded values.
    pub fn reload(&mut self) -> Result<()> {
        self.settings = self
            .config
            .clone()
            .try_deserialize()
            .map_err(|e| QuoteError::Configuration(e.to_string()))?;

        info!("Configuration reloaded");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        info!("Configuration validation passed");
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.settings).map_err(|e| QuoteError::Configuration(e.to_string()))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;

        std::fs::write(path.as_ref(), yaml).map_err(|e| QuoteError::Configuration(e.to_string()))?;

        info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }
}

// P2P_MONITOR_ANALYSIS__FLAT_THRESHOLD=0.005 sets analysis.flat_threshold.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    fn write_config(extension: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(extension)
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_settings_are_valid() {
        let settings = MonitorSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.source.refresh_seconds, 1800);
        assert_eq!(settings.analysis.canonical_timezone, "America/La_Paz");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let file = write_config(
            ".yaml",
            r#"
analysis:
  canonical_timezone: "-05:00"
  windows: [5, 10]
  flat_threshold: 0.01
  date_range:
    start: "2025-10-01"
    end: "2025-10-07"
source:
  path: /tmp/quotes.csv
"#,
        );

        let manager = ConfigManager::from_file(file.path()).unwrap();
        let settings = manager.settings();

        assert_eq!(settings.analysis.canonical_timezone, "-05:00");
        assert_eq!(settings.analysis.windows, vec![5, 10]);
        assert!((settings.analysis.flat_threshold - 0.01).abs() < 1e-12);
        assert_eq!(settings.analysis.short_window, 7);
        assert_eq!(settings.analysis.price_field, "market_median");
        assert_eq!(
            settings.analysis.date_range.unwrap().start,
            NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()
        );
        assert_eq!(settings.source.path, PathBuf::from("/tmp/quotes.csv"));
        assert_eq!(settings.source.refresh_seconds, 1800);
        assert!(manager.validate().is_ok());
    }

    #[test]
    fn test_validation_catches_bad_values() {
        let file = write_config(
            ".yaml",
            r#"
analysis:
  short_window: 30
  long_window: 7
"#,
        );

        let manager = ConfigManager::from_file(file.path()).unwrap();
        assert!(matches!(manager.validate(), Err(QuoteError::Configuration(_))));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(ConfigManager::from_file("/nonexistent/p2p-monitor.yaml").is_err());
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let file = write_config(".yaml", "analysis:\n  trailing_days: 3\n");
        let mut manager = ConfigManager::from_file(file.path()).unwrap();

        manager.settings_mut().analysis.trailing_days = 14;
        let out = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        manager.save_to_file(out.path()).unwrap();

        let saved = ConfigManager::from_file(out.path()).unwrap();
        assert_eq!(saved.settings().analysis.trailing_days, 14);

        manager.reload().unwrap();
        assert_eq!(manager.settings().analysis.trailing_days, 3);
    }
}
