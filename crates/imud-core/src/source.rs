//! The hardware-source seam.
//!
//! Physical sensor I/O (input device nodes, iio buffers, vendor FIFOs)
//! lives behind this trait; the acquisition loop only ever sees raw
//! records. Each hardware solution (IMU-only, e-Compass, 9-axis) provides
//! its own implementation, selected once at configuration time.

use std::time::Duration;

use crate::error::ImudResult;
use crate::sample::RawRecord;

/// A raw hardware input channel.
pub trait RawSource: Send {
    /// Short identifier used in log messages.
    fn name(&self) -> &str;

    /// Read every immediately available raw record, waiting at most
    /// `timeout` for the first one.
    ///
    /// An empty vector means the wait timed out with no data; that is not
    /// an error. Errors are per-poll and the caller decides whether to
    /// retry on the next iteration.
    fn poll(&mut self, timeout: Duration) -> ImudResult<Vec<RawRecord>>;
}
