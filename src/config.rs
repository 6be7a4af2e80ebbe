//! Configuration for the media queue
//!
//! Loaded from a JSON file. Missing or corrupt files fall back to defaults
//! and are rewritten so the on-disk copy is always valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// Queue configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory downloads are written to
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Directory conversions are written to
    #[serde(default = "default_conversion_dir")]
    pub conversion_dir: PathBuf,

    /// Maximum number of download tasks running at once
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    /// Maximum number of conversion tasks running at once
    #[serde(default = "default_max_concurrent_conversions")]
    pub max_concurrent_conversions: usize,

    /// Retries after the first failed download attempt (total attempts = retries + 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Whether completed tasks are removed from the table automatically
    #[serde(default)]
    pub auto_clear_completed: bool,

    /// How long a completed task stays visible before auto-clearing
    #[serde(with = "duration_serde", default = "default_auto_clear_delay")]
    pub auto_clear_delay: Duration,

    /// Interval between periodic admission sweeps
    #[serde(with = "duration_serde", default = "default_dispatch_interval")]
    pub dispatch_interval: Duration,

    /// Capacity of the broadcast event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_conversion_dir() -> PathBuf {
    PathBuf::from("./conversions")
}

fn default_max_concurrent_downloads() -> usize {
    3
}

fn default_max_concurrent_conversions() -> usize {
    2
}

fn default_max_retries() -> u32 {
    2
}

fn default_auto_clear_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_dispatch_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_event_buffer() -> usize {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            conversion_dir: default_conversion_dir(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
            max_concurrent_conversions: default_max_concurrent_conversions(),
            max_retries: default_max_retries(),
            auto_clear_completed: false,
            auto_clear_delay: default_auto_clear_delay(),
            dispatch_interval: default_dispatch_interval(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Config {
    /// Loads configuration from a JSON file
    ///
    /// A missing file is created with defaults. A file that fails to parse
    /// is logged and replaced with defaults rather than aborting startup.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Self>(&contents) {
            Ok(config) => Ok(config.sanitized()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config file is invalid, using defaults");
                let config = Self::default();
                config.save(path)?;
                Ok(config)
            }
        }
    }

    /// Writes the configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Replaces values the coordinator cannot run with by their defaults
    ///
    /// A zero dispatch interval or a zero-capacity event channel would panic
    /// the coordinator task at startup; a bad config file must not take the
    /// whole queue down.
    pub(crate) fn sanitized(mut self) -> Self {
        if self.dispatch_interval.is_zero() {
            warn!("dispatch_interval must be non-zero, using the default");
            self.dispatch_interval = default_dispatch_interval();
        }
        if self.event_buffer == 0 {
            warn!("event_buffer must be non-zero, using the default");
            self.event_buffer = default_event_buffer();
        }
        self
    }
}

/// Serde support for Duration as whole seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
