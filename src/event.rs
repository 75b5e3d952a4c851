//! Fixed-size output event records and the sinks that carry them to
//! consumers.

use std::io::Write;

use bytes::{BufMut, BytesMut};

use imud_core::ImudResult;

/// Record layout version, first field of every encoded event.
pub const EVENT_VERSION: u32 = 1;

/// Encoded size of one event record in bytes.
pub const EVENT_RECORD_SIZE: usize = 36;

pub const SENSOR_TYPE_META_DATA: i32 = 0;
pub const SENSOR_TYPE_ACCELEROMETER: i32 = 1;
pub const SENSOR_TYPE_MAG_UNCAL: i32 = 14;
pub const SENSOR_TYPE_GYROSCOPE_UNCAL: i32 = 16;

/// Meta-data subtype signalling that a flush request has drained.
pub const META_FLUSH_COMPLETE: f32 = 1.0;

/// One delivered event: a calibrated reading or a meta-data marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputEvent {
    pub version: u32,
    pub timestamp_ns: i64,
    pub sensor_id: i32,
    pub sensor_type: i32,
    pub payload: [f32; 4],
}

impl OutputEvent {
    #[must_use]
    pub fn new(sensor_id: i32, sensor_type: i32, payload: [f32; 4], timestamp_ns: i64) -> Self {
        Self {
            version: EVENT_VERSION,
            timestamp_ns,
            sensor_id,
            sensor_type,
            payload,
        }
    }

    /// The marker event acknowledging a completed flush for `sensor_id`.
    #[must_use]
    pub fn flush_complete(sensor_id: i32) -> Self {
        Self::new(
            sensor_id,
            SENSOR_TYPE_META_DATA,
            [META_FLUSH_COMPLETE, 0.0, 0.0, 0.0],
            0,
        )
    }

    /// Serialize to the little-endian wire layout.
    #[must_use]
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(EVENT_RECORD_SIZE);
        buf.put_u32_le(self.version);
        buf.put_i64_le(self.timestamp_ns);
        buf.put_i32_le(self.sensor_id);
        buf.put_i32_le(self.sensor_type);
        for v in self.payload {
            buf.put_f32_le(v);
        }
        buf
    }
}

/// Delivery endpoint for encoded events.
pub trait EventSink: Send {
    fn deliver(&mut self, event: &OutputEvent) -> ImudResult<()>;
}

/// Sink that writes whole records to a byte stream (pipe, socket, file).
///
/// Each event is a single `write_all`, so a record is never split across
/// short writes at this layer.
pub struct PipeSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> PipeSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> EventSink for PipeSink<W> {
    fn deliver(&mut self, event: &OutputEvent) -> ImudResult<()> {
        self.writer.write_all(&event.encode())?;
        Ok(())
    }
}

/// In-memory sink collecting delivered events, for tests.
#[derive(Debug, Default)]
pub struct VecSink {
    pub events: Vec<OutputEvent>,
}

impl EventSink for VecSink {
    fn deliver(&mut self, event: &OutputEvent) -> ImudResult<()> {
        self.events.push(*event);
        Ok(())
    }
}
