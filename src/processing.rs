//! The consumer thread: drain the shared channel, align streams, step the
//! fusion engine, and deliver output events.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use imud_core::{PipelineStats, Sample, SensorKind, SharedChannel};

use crate::align::align_streams;
use crate::event::{EventSink, OutputEvent};
use crate::fusion::{FusionEngine, FusionInput};

/// Drives the processing half of the pipeline until the channel closes.
pub struct ProcessingLoop {
    channel: Arc<SharedChannel<Sample>>,
    engine: Box<dyn FusionEngine>,
    sink: Arc<Mutex<Box<dyn EventSink>>>,
    stats: Arc<PipelineStats>,
}

impl ProcessingLoop {
    pub fn new(
        channel: Arc<SharedChannel<Sample>>,
        engine: Box<dyn FusionEngine>,
        sink: Arc<Mutex<Box<dyn EventSink>>>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            channel,
            engine,
            sink,
            stats,
        }
    }

    /// Block on the channel, process each drained batch, exit once the
    /// channel is closed and empty. Pending batches are always handed out
    /// before the close is observed, so nothing staged is lost.
    pub fn run(&mut self) {
        info!(engine = self.engine.name(), "Processing loop started");
        while let Some(batch) = self.channel.drain_blocking() {
            self.process_batch(batch.into_iter());
        }
        info!("Processing loop stopped");
    }

    /// Fan a drained batch out per stream, align, and step the engine one
    /// frame at a time.
    fn process_batch(&mut self, batch: impl Iterator<Item = Sample>) {
        let mut accel = Vec::new();
        let mut gyro = Vec::new();
        let mut mag = Vec::new();
        for sample in batch {
            match sample.kind {
                SensorKind::Accel => accel.push(sample),
                SensorKind::Gyro => gyro.push(sample),
                SensorKind::Mag => mag.push(sample),
            }
        }

        let frames = align_streams(&accel, &gyro, &mag);
        if frames.is_empty() {
            return;
        }
        self.stats.record_frames(frames.len() as u64);
        debug!(
            frames = frames.len(),
            accel = accel.len(),
            gyro = gyro.len(),
            mag = mag.len(),
            "Aligned batch"
        );

        let mut inputs: Vec<FusionInput> = Vec::with_capacity(3);
        for frame in frames {
            inputs.clear();
            // Package order is fixed: accel, mag, gyro.
            if let Some(i) = frame.accel {
                inputs.push(sample_input(&accel[i]));
            }
            if let Some(i) = frame.mag {
                inputs.push(sample_input(&mag[i]));
            }
            if let Some(i) = frame.gyro {
                inputs.push(sample_input(&gyro[i]));
            }

            let outputs = match self.engine.do_steps(&inputs) {
                Ok(outputs) => outputs,
                Err(err) => {
                    warn!(%err, timestamp_ns = frame.timestamp_ns, "Fusion step rejected");
                    continue;
                }
            };

            let mut sink = self.sink.lock();
            for output in outputs {
                let event = OutputEvent::new(
                    output.sensor_id,
                    output.sensor_type,
                    output.values,
                    output.timestamp_ns,
                );
                if let Err(err) = sink.deliver(&event) {
                    warn!(%err, sensor_id = output.sensor_id, "Event delivery failed");
                    continue;
                }
                self.stats.record_event();
            }
        }
    }
}

fn sample_input(sample: &Sample) -> FusionInput {
    FusionInput {
        kind: sample.kind,
        data: sample.xyz(),
        timestamp_ns: sample.timestamp_ns,
    }
}
