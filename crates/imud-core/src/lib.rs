//! Core types and traits for the imud sensor daemon.
//!
//! This crate holds everything the pipeline stages share: the sample and
//! raw-record data model, the bounded drop-oldest queue used for every
//! cross-stage handoff, the condvar-guarded channel between the acquisition
//! and processing threads, the hardware source seam, and the diagnostic
//! counters that make silent drops observable.

pub mod buffer;
pub mod channel;
pub mod error;
pub mod queue;
pub mod sample;
pub mod source;
pub mod stats;

pub use buffer::StreamBuffer;
pub use channel::SharedChannel;
pub use error::{ImudError, ImudResult};
pub use queue::BoundedQueue;
pub use sample::{
    RawRecord, Sample, SensorKind, StreamMask, CHANNEL_ACCEL, CHANNEL_GYRO, CHANNEL_MAG,
};
pub use source::RawSource;
pub use stats::{PipelineStats, StatsSnapshot};
