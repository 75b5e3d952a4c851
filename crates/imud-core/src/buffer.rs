//! Per-stream staging buffers used on the acquisition side.

use crate::queue::BoundedQueue;
use crate::sample::{Sample, SensorKind};

/// Thread-local accumulation for one sensor kind.
///
/// The acquisition loop stages decoded samples here between polls, then
/// hands the whole buffer to the shared channel in one batched merge.
#[derive(Debug)]
pub struct StreamBuffer {
    kind: SensorKind,
    queue: BoundedQueue<Sample>,
}

impl StreamBuffer {
    #[must_use]
    pub fn new(kind: SensorKind, capacity: usize) -> Self {
        Self {
            kind,
            queue: BoundedQueue::new(capacity),
        }
    }

    #[must_use]
    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Stage one sample, returning the evicted oldest sample when full.
    pub fn push(&mut self, sample: Sample) -> Option<Sample> {
        self.queue.enqueue(sample)
    }

    /// Swap out the staged contents for an empty queue of equal capacity.
    pub fn take(&mut self) -> BoundedQueue<Sample> {
        let capacity = self.queue.capacity();
        std::mem::replace(&mut self.queue, BoundedQueue::new(capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_leaves_buffer_empty() {
        let mut buffer = StreamBuffer::new(SensorKind::Accel, 8);
        buffer.push(Sample::new(SensorKind::Accel, 1, 2, 3, 100));
        buffer.push(Sample::new(SensorKind::Accel, 4, 5, 6, 200));

        let taken = buffer.take();
        assert_eq!(taken.len(), 2);
        assert!(buffer.is_empty());
        assert_eq!(buffer.take().len(), 0);
    }

    #[test]
    fn test_push_reports_eviction() {
        let mut buffer = StreamBuffer::new(SensorKind::Gyro, 1);
        let first = Sample::new(SensorKind::Gyro, 1, 1, 1, 1);
        assert!(buffer.push(first).is_none());
        let evicted = buffer.push(Sample::new(SensorKind::Gyro, 2, 2, 2, 2));
        assert_eq!(evicted, Some(first));
    }
}
