//! Monitor configuration management

use adapter::{AdapterOptions, VENDOR_ID};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub adapter: AdapterSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "MonitorSettings::default_log_level")]
    pub log_level: String,
    /// Time between two samples in milliseconds
    #[serde(default = "MonitorSettings::default_sample_interval")]
    pub sample_interval_ms: u64,
    /// Kernel CPU counter file
    #[serde(default = "MonitorSettings::default_stat_path")]
    pub stat_path: PathBuf,
    /// Turn all LEDs off when the monitor exits
    #[serde(default = "MonitorSettings::default_clear_on_exit")]
    pub clear_on_exit: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            sample_interval_ms: Self::default_sample_interval(),
            stat_path: Self::default_stat_path(),
            clear_on_exit: Self::default_clear_on_exit(),
        }
    }
}

impl MonitorSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_sample_interval() -> u64 {
        500
    }

    fn default_stat_path() -> PathBuf {
        PathBuf::from("/proc/stat")
    }

    fn default_clear_on_exit() -> bool {
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterSettings {
    /// USB vendor id of the adapter
    #[serde(default = "AdapterSettings::default_vendor_id")]
    pub vendor_id: u16,
    /// Per bulk transfer timeout in milliseconds
    #[serde(default = "AdapterSettings::default_transfer_timeout")]
    pub transfer_timeout_ms: u64,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            vendor_id: Self::default_vendor_id(),
            transfer_timeout_ms: Self::default_transfer_timeout(),
        }
    }
}

impl AdapterSettings {
    fn default_vendor_id() -> u16 {
        VENDOR_ID
    }

    fn default_transfer_timeout() -> u64 {
        1000
    }
}

impl MonitorConfig {
    /// Accepted range for `sample_interval_ms`
    pub const SAMPLE_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 10..=60_000;

    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/usb2lpt/monitor.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: MonitorConfig = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usb2lpt").join("monitor.toml")
        } else {
            PathBuf::from(".config/usb2lpt/monitor.toml")
        }
    }

    /// Time between two samples
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.sample_interval_ms)
    }

    /// Options for constructing the adapter
    pub fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions {
            vendor_id: self.adapter.vendor_id,
            transfer_timeout: Duration::from_millis(self.adapter.transfer_timeout_ms),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.monitor.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.monitor.log_level,
                valid_levels.join(", ")
            ));
        }

        if !Self::SAMPLE_INTERVAL_RANGE.contains(&self.monitor.sample_interval_ms) {
            return Err(anyhow!(
                "Invalid sample_interval_ms {}, must be between {} and {}",
                self.monitor.sample_interval_ms,
                Self::SAMPLE_INTERVAL_RANGE.start(),
                Self::SAMPLE_INTERVAL_RANGE.end()
            ));
        }

        if self.adapter.transfer_timeout_ms == 0 {
            return Err(anyhow!("transfer_timeout_ms must be greater than 0"));
        }

        if self.adapter.vendor_id == 0 {
            return Err(anyhow!("vendor_id must not be 0"));
        }

        Ok(())
    }
}

/// Load configuration from a user-supplied path, expanding `~`
pub fn load_config(path: &str) -> Result<MonitorConfig> {
    let path_buf = PathBuf::from(shellexpand::tilde(path).as_ref());
    MonitorConfig::load(Some(path_buf))
}
