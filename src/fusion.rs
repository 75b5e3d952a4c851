//! The fusion seam: aligned frames go in, calibrated output events come
//! out.
//!
//! The real estimation library is an external component; the daemon only
//! depends on the [`FusionEngine`] trait and the input contract it
//! enforces (at most one sample per stream per step, monotonic time). The
//! bundled [`ScalingPassthrough`] engine applies per-range physical-unit
//! conversion and is enough to run the full pipeline end to end.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use imud_core::{SensorKind, StreamMask};

use crate::event::{SENSOR_TYPE_ACCELEROMETER, SENSOR_TYPE_GYROSCOPE_UNCAL, SENSOR_TYPE_MAG_UNCAL};

/// One raw sample handed to the engine, still in LSB counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FusionInput {
    pub kind: SensorKind,
    pub data: [i32; 3],
    pub timestamp_ns: i64,
}

/// One calibrated result produced by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionOutput {
    pub sensor_id: i32,
    pub sensor_type: i32,
    pub values: [f32; 4],
    pub timestamp_ns: i64,
}

/// Input-contract violations; a step that fails leaves engine state
/// untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionError {
    #[error("Duplicate {0} input in a single step")]
    DuplicateInput(SensorKind),
    #[error("Timestamp gap of {gap_ns} ns exceeds the engine limit")]
    TimestampGap { gap_ns: i64 },
}

/// An estimation core that consumes time-aligned sample sets.
pub trait FusionEngine: Send {
    fn name(&self) -> &str;

    /// Run one step over the inputs of a single aligned frame.
    fn do_steps(&mut self, inputs: &[FusionInput]) -> Result<Vec<FusionOutput>, FusionError>;
}

/// Accelerometer full-scale range and its LSB-to-m/s² factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccelRange {
    G2,
    #[default]
    G4,
    G8,
    G16,
}

impl AccelRange {
    #[must_use]
    pub fn scale(self) -> f32 {
        match self {
            AccelRange::G2 => 0.000_598_755,
            AccelRange::G4 => 0.001_197_510,
            AccelRange::G8 => 0.002_395_020,
            AccelRange::G16 => 0.004_790_039,
        }
    }
}

/// Gyroscope full-scale range and its LSB-to-rad/s factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GyroRange {
    Dps125,
    Dps250,
    Dps500,
    Dps1000,
    #[default]
    Dps2000,
}

impl GyroRange {
    #[must_use]
    pub fn scale(self) -> f32 {
        match self {
            GyroRange::Dps125 => 0.000_066_579_03,
            GyroRange::Dps250 => 0.000_133_158_05,
            GyroRange::Dps500 => 0.000_266_316_11,
            GyroRange::Dps1000 => 0.000_532_632_22,
            GyroRange::Dps2000 => 0.001_065_264_44,
        }
    }
}

/// Magnetometer LSB-to-µT factor; fixed, the part has a single range.
pub const MAG_SCALE: f32 = 0.1;

/// Maximum tolerated gap between consecutive steps of one stream before
/// the engine declares its internal filters stale.
const MAX_STEP_GAP_NS: i64 = 10_000_000_000;

/// Stateless per-axis scaling engine with the full input-contract checks.
#[derive(Debug)]
pub struct ScalingPassthrough {
    accel_range: AccelRange,
    gyro_range: GyroRange,
    last_timestamp_ns: Option<i64>,
}

impl ScalingPassthrough {
    #[must_use]
    pub fn new(accel_range: AccelRange, gyro_range: GyroRange) -> Self {
        Self {
            accel_range,
            gyro_range,
            last_timestamp_ns: None,
        }
    }

    fn convert(&self, input: &FusionInput) -> FusionOutput {
        let (sensor_id, sensor_type, scale) = match input.kind {
            SensorKind::Accel => (1, SENSOR_TYPE_ACCELEROMETER, self.accel_range.scale()),
            SensorKind::Mag => (2, SENSOR_TYPE_MAG_UNCAL, MAG_SCALE),
            SensorKind::Gyro => (3, SENSOR_TYPE_GYROSCOPE_UNCAL, self.gyro_range.scale()),
        };
        FusionOutput {
            sensor_id,
            sensor_type,
            values: [
                input.data[0] as f32 * scale,
                input.data[1] as f32 * scale,
                input.data[2] as f32 * scale,
                0.0,
            ],
            timestamp_ns: input.timestamp_ns,
        }
    }
}

impl FusionEngine for ScalingPassthrough {
    fn name(&self) -> &str {
        "scaling-passthrough"
    }

    fn do_steps(&mut self, inputs: &[FusionInput]) -> Result<Vec<FusionOutput>, FusionError> {
        let mut seen = StreamMask::EMPTY;
        let mut frame_tm: Option<i64> = None;
        for input in inputs {
            if seen.contains(input.kind.mask()) {
                return Err(FusionError::DuplicateInput(input.kind));
            }
            seen.insert(input.kind.mask());
            frame_tm = Some(frame_tm.map_or(input.timestamp_ns, |t| t.max(input.timestamp_ns)));
        }

        if let (Some(last), Some(cur)) = (self.last_timestamp_ns, frame_tm) {
            let gap_ns = cur - last;
            if gap_ns > MAX_STEP_GAP_NS {
                return Err(FusionError::TimestampGap { gap_ns });
            }
        }
        if frame_tm.is_some() {
            self.last_timestamp_ns = frame_tm;
        }

        Ok(inputs.iter().map(|input| self.convert(input)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(kind: SensorKind, data: [i32; 3], timestamp_ns: i64) -> FusionInput {
        FusionInput {
            kind,
            data,
            timestamp_ns,
        }
    }

    #[test]
    fn test_accel_scaling_4g() {
        let mut engine = ScalingPassthrough::new(AccelRange::G4, GyroRange::Dps2000);
        let out = engine
            .do_steps(&[input(SensorKind::Accel, [1000, -1000, 0], 100)])
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sensor_type, SENSOR_TYPE_ACCELEROMETER);
        assert!((out[0].values[0] - 1.197_510).abs() < 1e-5);
        assert!((out[0].values[1] + 1.197_510).abs() < 1e-5);
        assert_eq!(out[0].timestamp_ns, 100);
    }

    #[test]
    fn test_mag_scaling_fixed() {
        let mut engine = ScalingPassthrough::new(AccelRange::G4, GyroRange::Dps2000);
        let out = engine
            .do_steps(&[input(SensorKind::Mag, [250, 0, -30], 100)])
            .unwrap();
        assert!((out[0].values[0] - 25.0).abs() < 1e-6);
        assert!((out[0].values[2] + 3.0).abs() < 1e-6);
        assert_eq!(out[0].sensor_type, SENSOR_TYPE_MAG_UNCAL);
    }

    #[test]
    fn test_duplicate_stream_rejected() {
        let mut engine = ScalingPassthrough::new(AccelRange::G4, GyroRange::Dps2000);
        let err = engine
            .do_steps(&[
                input(SensorKind::Gyro, [1, 2, 3], 100),
                input(SensorKind::Gyro, [4, 5, 6], 100),
            ])
            .unwrap_err();
        assert_eq!(err, FusionError::DuplicateInput(SensorKind::Gyro));
    }

    #[test]
    fn test_timestamp_gap_rejected() {
        let mut engine = ScalingPassthrough::new(AccelRange::G4, GyroRange::Dps2000);
        engine
            .do_steps(&[input(SensorKind::Accel, [1, 1, 1], 0)])
            .unwrap();
        let err = engine
            .do_steps(&[input(SensorKind::Accel, [1, 1, 1], MAX_STEP_GAP_NS + 1)])
            .unwrap_err();
        assert_eq!(
            err,
            FusionError::TimestampGap {
                gap_ns: MAX_STEP_GAP_NS + 1
            }
        );
    }

    #[test]
    fn test_mixed_frame_produces_one_output_per_stream() {
        let mut engine = ScalingPassthrough::new(AccelRange::G8, GyroRange::Dps500);
        let out = engine
            .do_steps(&[
                input(SensorKind::Accel, [10, 0, 0], 50),
                input(SensorKind::Mag, [10, 0, 0], 50),
                input(SensorKind::Gyro, [10, 0, 0], 50),
            ])
            .unwrap();
        assert_eq!(out.len(), 3);
        let ids: Vec<_> = out.iter().map(|o| o.sensor_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
