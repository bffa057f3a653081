use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::acquisition::DEFAULT_POLL_INTERVAL;
use crate::vitals::AlertThresholds;

/// Runtime settings for the monitor. Every field has a default, so an empty
/// TOML document is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub buffer_capacity: usize,
    pub snapshot_len: usize,
    pub history_len: usize,
    pub poll_interval_ms: u64,
    /// Seed for the vitals synthesiser and synthetic sensor.
    pub seed: Option<u64>,
    pub source: SourceConfig,
    pub thresholds: AlertThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 500,
            snapshot_len: 100,
            history_len: 5,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            seed: None,
            source: SourceConfig::default(),
            thresholds: AlertThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Disconnected,
    Synthetic,
    Device,
    Tcp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Device node for `kind = "device"`, e.g. `/dev/ttyACM0`.
    pub path: Option<PathBuf>,
    /// `host:port` for `kind = "tcp"`.
    pub addr: Option<String>,
    pub read_timeout_ms: u64,
    pub synthetic_rate_bpm: f64,
    pub synthetic_fs: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Disconnected,
            path: None,
            addr: None,
            read_timeout_ms: 1000,
            synthetic_rate_bpm: 72.0,
            synthetic_fs: 200.0,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            bail!("buffer_capacity must be at least 1");
        }
        if self.history_len == 0 {
            bail!("history_len must be at least 1");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be at least 1");
        }
        let t = &self.thresholds;
        if t.heart_rate_min > t.heart_rate_max {
            bail!(
                "heart rate band is inverted ({} > {})",
                t.heart_rate_min,
                t.heart_rate_max
            );
        }
        if t.temperature_min > t.temperature_max {
            bail!(
                "temperature band is inverted ({} > {})",
                t.temperature_min,
                t.temperature_max
            );
        }
        Ok(())
    }
}

pub fn parse_config(text: &str) -> Result<MonitorConfig> {
    let config: MonitorConfig = toml::from_str(text).context("parsing monitor config")?;
    config.validate()?;
    Ok(config)
}

pub fn read_config(path: &Path) -> Result<MonitorConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config {}", path.display()))
}
