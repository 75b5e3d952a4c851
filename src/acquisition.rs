//! The producer thread: poll raw sources, decode, stage per stream, and
//! hand whole batches to the shared channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use imud_core::{PipelineStats, RawSource, Sample, SensorKind, SharedChannel, StreamBuffer};

use crate::resample::Resampler;

/// Drives the acquisition half of the pipeline until the stop flag is
/// raised.
///
/// Staging buffers are thread-local; samples become visible to the
/// consumer only at batch boundaries, one channel lock per poll cycle
/// regardless of how many samples the cycle produced.
pub struct AcquisitionLoop {
    sources: Vec<Box<dyn RawSource>>,
    buffers: [StreamBuffer; 3],
    resamplers: [Option<Resampler>; 3],
    channel: Arc<SharedChannel<Sample>>,
    stats: Arc<PipelineStats>,
    stop: Arc<AtomicBool>,
    poll_timeout: Duration,
}

impl AcquisitionLoop {
    pub fn new(
        sources: Vec<Box<dyn RawSource>>,
        stage_capacity: usize,
        resample: [bool; 3],
        channel: Arc<SharedChannel<Sample>>,
        stats: Arc<PipelineStats>,
        stop: Arc<AtomicBool>,
        poll_timeout: Duration,
    ) -> Self {
        let buffers =
            SensorKind::ALL.map(|kind| StreamBuffer::new(kind, stage_capacity));
        let resamplers =
            SensorKind::ALL.map(|kind| resample[kind.index()].then(Resampler::new));
        Self {
            sources,
            buffers,
            resamplers,
            channel,
            stats,
            stop,
            poll_timeout,
        }
    }

    /// Poll-decode-stage-publish until stopped, then flush the stage.
    pub fn run(&mut self) {
        info!(sources = self.sources.len(), "Acquisition loop started");
        while !self.stop.load(Ordering::Acquire) {
            self.poll_once();
            self.publish();
        }
        self.publish();
        info!("Acquisition loop stopped");
    }

    /// One pass over every source. Decode failures are counted and
    /// skipped; a failing source does not stall its peers.
    fn poll_once(&mut self) {
        for i in 0..self.sources.len() {
            let records = match self.sources[i].poll(self.poll_timeout) {
                Ok(records) => records,
                Err(err) => {
                    warn!(source = self.sources[i].name(), %err, "Source poll failed");
                    continue;
                }
            };
            for record in records {
                match record.decode() {
                    Ok(sample) => self.stage(sample),
                    Err(err) => {
                        self.stats.record_decode_error();
                        warn!(source = self.sources[i].name(), %err, "Dropping raw record");
                    }
                }
            }
        }
    }

    fn stage(&mut self, sample: Sample) {
        let idx = sample.kind.index();
        let sample = match &mut self.resamplers[idx] {
            Some(resampler) => match resampler.push(sample) {
                Some(sample) => sample,
                None => return,
            },
            None => sample,
        };
        if let Some(evicted) = self.buffers[idx].push(sample) {
            self.stats.record_overflow_drop();
            debug!(
                kind = %evicted.kind,
                timestamp_ns = evicted.timestamp_ns,
                "Stage buffer full, oldest sample evicted"
            );
        }
    }

    /// Move everything staged this cycle into the shared channel and wake
    /// the consumer. Empty cycles take no lock.
    fn publish(&mut self) {
        let mut published = false;
        for buffer in &mut self.buffers {
            if buffer.is_empty() {
                continue;
            }
            let mut batch = buffer.take();
            let dropped = self.channel.push_batch(&mut batch);
            if dropped > 0 {
                self.stats.record_merge_drops(dropped as u64);
            }
            published = true;
        }
        if published {
            self.stats.record_batch();
        }
    }
}
