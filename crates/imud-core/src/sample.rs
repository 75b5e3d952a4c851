//! The sample data model: typed sensor readings and the raw records they
//! are decoded from.

use serde::{Deserialize, Serialize};

use crate::error::{ImudError, ImudResult};

/// The physical input streams the pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Accel,
    Gyro,
    Mag,
}

impl SensorKind {
    /// All stream kinds, in a fixed order usable for per-kind arrays.
    pub const ALL: [SensorKind; 3] = [SensorKind::Accel, SensorKind::Gyro, SensorKind::Mag];

    /// Stable index into per-kind arrays.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            SensorKind::Accel => 0,
            SensorKind::Gyro => 1,
            SensorKind::Mag => 2,
        }
    }

    /// The single-stream bitmask for this kind.
    #[must_use]
    pub fn mask(self) -> StreamMask {
        match self {
            SensorKind::Accel => StreamMask::ACC,
            SensorKind::Gyro => StreamMask::GYR,
            SensorKind::Mag => StreamMask::MAG,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            SensorKind::Accel => "accel",
            SensorKind::Gyro => "gyro",
            SensorKind::Mag => "mag",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Bitmask tagging which streams contributed at one logical instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct StreamMask(u8);

impl StreamMask {
    pub const EMPTY: StreamMask = StreamMask(0);
    pub const ACC: StreamMask = StreamMask(0x1);
    pub const MAG: StreamMask = StreamMask(0x2);
    pub const GYR: StreamMask = StreamMask(0x4);

    #[must_use]
    pub fn contains(self, other: StreamMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: StreamMask) {
        self.0 |= other.0;
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for StreamMask {
    type Output = StreamMask;

    fn bitor(self, rhs: StreamMask) -> StreamMask {
        StreamMask(self.0 | rhs.0)
    }
}

/// One decoded sensor reading.
///
/// Created once per physical reading and immutable afterwards; ownership
/// moves with it through the queues, never shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub kind: SensorKind,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub timestamp_ns: i64,
}

impl Sample {
    #[must_use]
    pub fn new(kind: SensorKind, x: i32, y: i32, z: i32, timestamp_ns: i64) -> Self {
        Self {
            kind,
            x,
            y,
            z,
            timestamp_ns,
        }
    }

    #[must_use]
    pub fn xyz(&self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Raw channel code for accelerometer records.
pub const CHANNEL_ACCEL: u8 = 0x00;
/// Raw channel code for gyroscope records.
pub const CHANNEL_GYRO: u8 = 0x01;
/// Raw channel code for magnetometer records.
pub const CHANNEL_MAG: u8 = 0x02;

/// One undecoded record as read from a hardware source.
///
/// The channel byte selects the stream; anything else is a decode error
/// that the acquisition loop skips without terminating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord {
    pub channel: u8,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub timestamp_ns: i64,
}

impl RawRecord {
    pub fn decode(&self) -> ImudResult<Sample> {
        let kind = match self.channel {
            CHANNEL_ACCEL => SensorKind::Accel,
            CHANNEL_GYRO => SensorKind::Gyro,
            CHANNEL_MAG => SensorKind::Mag,
            other => return Err(ImudError::MalformedRecord { channel: other }),
        };
        Ok(Sample::new(kind, self.x, self.y, self.z, self.timestamp_ns))
    }
}
