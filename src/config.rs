//! Daemon configuration: TOML file merged over built-in defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use imud_core::{ImudError, ImudResult};
use imud_driver_mock::MockImuConfig;

use crate::fusion::{AccelRange, GyroRange};

fn default_channel_capacity() -> usize {
    128
}

fn default_stage_capacity() -> usize {
    128
}

fn default_poll_timeout_ms() -> u64 {
    100
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Capacity of the shared acquisition-to-processing channel.
    pub channel_capacity: usize,
    /// Capacity of each per-stream staging buffer.
    pub stage_capacity: usize,
    /// Source poll timeout; bounds shutdown latency of the producer.
    pub poll_timeout_ms: u64,
    pub accel_range: AccelRange,
    pub gyro_range: GyroRange,
    /// Enable 5-to-4 rate reduction per stream: accel, gyro, mag.
    pub resample_accel: bool,
    pub resample_gyro: bool,
    pub resample_mag: bool,
    pub mock: MockImuConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            stage_capacity: default_stage_capacity(),
            poll_timeout_ms: default_poll_timeout_ms(),
            accel_range: AccelRange::default(),
            gyro_range: GyroRange::default(),
            resample_accel: false,
            resample_gyro: false,
            resample_mag: false,
            mock: MockImuConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load from an optional TOML file; absent file means defaults.
    pub fn load(path: Option<&Path>) -> ImudResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let cfg: DaemonConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> ImudResult<()> {
        if self.channel_capacity == 0 {
            return Err(ImudError::Configuration(
                "channel_capacity must be at least 1".into(),
            ));
        }
        if self.stage_capacity == 0 {
            return Err(ImudError::Configuration(
                "stage_capacity must be at least 1".into(),
            ));
        }
        if self.poll_timeout_ms == 0 {
            return Err(ImudError::Configuration(
                "poll_timeout_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Resample flags indexed like [`imud_core::SensorKind::index`].
    #[must_use]
    pub fn resample_flags(&self) -> [bool; 3] {
        [self.resample_accel, self.resample_gyro, self.resample_mag]
    }
}
