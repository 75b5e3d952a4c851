//! Diagnostic counters for the pipeline.
//!
//! The overflow policy sheds the oldest data without failing the caller,
//! so every drop and skip path increments a counter here; operators read
//! a snapshot instead of grepping logs.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared atomic counters, one instance per daemon.
#[derive(Debug, Default)]
pub struct PipelineStats {
    overflow_drops: AtomicU64,
    merge_drops: AtomicU64,
    decode_errors: AtomicU64,
    batches_merged: AtomicU64,
    frames_aligned: AtomicU64,
    events_delivered: AtomicU64,
}

impl PipelineStats {
    /// A staging buffer evicted its oldest sample on push.
    pub fn record_overflow_drop(&self) {
        self.overflow_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// A channel merge truncated `count` oldest samples to capacity.
    pub fn record_merge_drops(&self, count: u64) {
        if count > 0 {
            self.merge_drops.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// A raw record failed to decode and was skipped.
    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// The acquisition loop pushed one batched merge into the channel.
    pub fn record_batch(&self) {
        self.batches_merged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frames(&self, count: u64) {
        self.frames_aligned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_event(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            overflow_drops: self.overflow_drops.load(Ordering::Relaxed),
            merge_drops: self.merge_drops.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            batches_merged: self.batches_merged.load(Ordering::Relaxed),
            frames_aligned: self.frames_aligned.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub overflow_drops: u64,
    pub merge_drops: u64,
    pub decode_errors: u64,
    pub batches_merged: u64,
    pub frames_aligned: u64,
    pub events_delivered: u64,
}

impl StatsSnapshot {
    /// Total samples lost to the drop-oldest policy.
    #[must_use]
    pub fn total_drops(&self) -> u64 {
        self.overflow_drops + self.merge_drops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = PipelineStats::default();
        stats.record_overflow_drop();
        stats.record_merge_drops(3);
        stats.record_merge_drops(0);
        stats.record_decode_error();
        stats.record_batch();
        stats.record_frames(5);
        stats.record_event();

        let snap = stats.snapshot();
        assert_eq!(snap.overflow_drops, 1);
        assert_eq!(snap.merge_drops, 3);
        assert_eq!(snap.decode_errors, 1);
        assert_eq!(snap.batches_merged, 1);
        assert_eq!(snap.frames_aligned, 5);
        assert_eq!(snap.events_delivered, 1);
        assert_eq!(snap.total_drops(), 4);
    }
}
