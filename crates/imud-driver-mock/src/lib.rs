//! Simulated IMU source.
//!
//! Produces data-sync bursts the way a hardware FIFO does: every burst
//! carries one accelerometer and one gyroscope record sharing a single
//! timestamp, with a magnetometer record folded in every Nth burst. The
//! generator is seeded, so a given configuration always replays the same
//! stream.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use imud_core::{ImudResult, RawRecord, RawSource, CHANNEL_ACCEL, CHANNEL_GYRO, CHANNEL_MAG};

/// Channel byte no decoder accepts; used to exercise error paths.
pub const CHANNEL_INVALID: u8 = 0xee;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockImuConfig {
    /// Seed for the sample generator; equal seeds replay equal streams.
    pub seed: u64,
    /// Data-sync bursts returned per poll call.
    pub samples_per_poll: usize,
    /// Nominal spacing between bursts.
    pub sample_period_ns: i64,
    pub with_mag: bool,
    /// Emit a magnetometer record every Nth burst.
    pub mag_decimation: usize,
    /// Probability in [0, 1] of corrupting a record's channel byte.
    pub malformed_rate: f64,
    /// Peak raw amplitude in LSB counts.
    pub amplitude: i32,
    /// Sleep one poll-timeout between calls to mimic a blocked FIFO read.
    pub realtime: bool,
}

impl Default for MockImuConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            samples_per_poll: 2,
            // 50 Hz
            sample_period_ns: 20_000_000,
            with_mag: true,
            mag_decimation: 4,
            malformed_rate: 0.0,
            amplitude: 1000,
            realtime: true,
        }
    }
}

/// Seeded simulated IMU implementing [`RawSource`].
pub struct MockImuSource {
    config: MockImuConfig,
    rng: ChaCha8Rng,
    next_timestamp_ns: i64,
    burst: u64,
}

impl MockImuSource {
    #[must_use]
    pub fn new(config: MockImuConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        debug!(seed = config.seed, "Mock IMU source initialized");
        Self {
            config,
            rng,
            next_timestamp_ns: 0,
            burst: 0,
        }
    }

    fn raw_axis(&mut self) -> i32 {
        let amplitude = self.config.amplitude.max(1);
        self.rng.gen_range(-amplitude..=amplitude)
    }

    fn record(&mut self, channel: u8, timestamp_ns: i64) -> RawRecord {
        let channel = if self.config.malformed_rate > 0.0
            && self.rng.gen_bool(self.config.malformed_rate.min(1.0))
        {
            CHANNEL_INVALID
        } else {
            channel
        };
        RawRecord {
            channel,
            x: self.raw_axis(),
            y: self.raw_axis(),
            z: self.raw_axis(),
            timestamp_ns,
        }
    }
}

impl RawSource for MockImuSource {
    fn name(&self) -> &str {
        "mock-imu"
    }

    fn poll(&mut self, timeout: Duration) -> ImudResult<Vec<RawRecord>> {
        if self.config.realtime {
            std::thread::sleep(timeout);
        }
        let mut records = Vec::with_capacity(self.config.samples_per_poll * 3);
        for _ in 0..self.config.samples_per_poll {
            let timestamp_ns = self.next_timestamp_ns;
            self.next_timestamp_ns += self.config.sample_period_ns;

            records.push(self.record(CHANNEL_ACCEL, timestamp_ns));
            records.push(self.record(CHANNEL_GYRO, timestamp_ns));
            if self.config.with_mag
                && self.config.mag_decimation > 0
                && self.burst % self.config.mag_decimation as u64 == 0
            {
                records.push(self.record(CHANNEL_MAG, timestamp_ns));
            }
            self.burst += 1;
        }
        Ok(records)
    }
}
