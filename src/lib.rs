//! imud: an inertial-sensor daemon.
//!
//! Raw accelerometer, gyroscope, and magnetometer records flow through a
//! two-thread pipeline: an acquisition thread polls sources, decodes and
//! stages samples, and publishes whole batches; a processing thread
//! aligns the streams by timestamp, steps a fusion engine, and delivers
//! fixed-size output events. A subscription table tracks which virtual
//! sensors are enabled and translates rate and latency requests into
//! hardware configuration writes.

pub mod acquisition;
pub mod align;
pub mod config;
pub mod daemon;
pub mod event;
pub mod fusion;
pub mod processing;
pub mod resample;
pub mod subscription;

pub use config::DaemonConfig;
pub use daemon::Daemon;
pub use event::{EventSink, OutputEvent, PipeSink, VecSink};
pub use fusion::{AccelRange, FusionEngine, GyroRange, ScalingPassthrough};
pub use subscription::{ConfigSink, RecordingConfigSink, SubscriptionTable};

pub use imud_core::{ImudError, ImudResult};
