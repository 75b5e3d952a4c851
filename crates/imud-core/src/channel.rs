//! The single point of cross-thread communication between the acquisition
//! and processing threads: one bounded queue under a mutex/condvar pair.

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::queue::BoundedQueue;

#[derive(Debug)]
struct ChannelState<T> {
    queue: BoundedQueue<T>,
    closed: bool,
}

/// A bounded queue guarded by a mutex and condition variable.
///
/// All queue mutations happen with the mutex held. The condvar is signaled
/// when a merge makes the queue non-empty; a waiting consumer re-checks
/// emptiness after every wake, so spurious wakeups are harmless.
#[derive(Debug)]
pub struct SharedChannel<T> {
    state: Mutex<ChannelState<T>>,
    ready: Condvar,
}

impl<T> SharedChannel<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(ChannelState {
                queue: BoundedQueue::new(capacity),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Merge an entire staged batch into the channel and wake the consumer.
    ///
    /// Returns the number of items the capacity truncation dropped. The
    /// batch is left empty. An empty batch is a no-op that takes no lock.
    pub fn push_batch(&self, batch: &mut BoundedQueue<T>) -> usize {
        if batch.is_empty() {
            return 0;
        }
        let mut state = self.state.lock();
        let dropped = state.queue.merge(batch);
        if dropped > 0 {
            warn!(dropped, "channel over capacity, dropped oldest samples");
        }
        self.ready.notify_one();
        dropped
    }

    /// Block until data is available, then swap out and return the entire
    /// internal queue.
    ///
    /// Returns `None` only after [`close`](Self::close) has been called and
    /// the queue is empty; pending data is always drained before shutdown
    /// is observed. This is the pipeline's sole suspension point.
    pub fn drain_blocking(&self) -> Option<BoundedQueue<T>> {
        let mut state = self.state.lock();
        while state.queue.is_empty() {
            if state.closed {
                return None;
            }
            self.ready.wait(&mut state);
        }
        let capacity = state.queue.capacity();
        Some(std::mem::replace(
            &mut state.queue,
            BoundedQueue::new(capacity),
        ))
    }

    /// Swap out whatever is queued right now without blocking.
    pub fn try_drain(&self) -> Option<BoundedQueue<T>> {
        let mut state = self.state.lock();
        if state.queue.is_empty() {
            return None;
        }
        let capacity = state.queue.capacity();
        Some(std::mem::replace(
            &mut state.queue,
            BoundedQueue::new(capacity),
        ))
    }

    /// Mark the channel closed and wake every waiter.
    ///
    /// Already-queued items remain drainable; only the empty-and-closed
    /// state reads as shutdown.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.ready.notify_all();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }
}
