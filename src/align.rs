//! Multi-stream timestamp alignment.
//!
//! The fusion engine wants its inputs delivered in timestamp order with
//! concurrent readings from different streams grouped into one step. Each
//! input array is already time-ordered (FIFO order is preserved end to
//! end), so a single O(n) multi-way merge suffices; this is not a sort.

use imud_core::{Sample, StreamMask};

/// One aligned instant across the input streams.
///
/// Each `Some` index points into the corresponding input slice passed to
/// [`align_streams`]; the frame is consumed immediately to build fusion
/// inputs and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignedFrame {
    pub timestamp_ns: i64,
    pub accel: Option<usize>,
    pub gyro: Option<usize>,
    pub mag: Option<usize>,
}

impl AlignedFrame {
    /// Which streams contributed a sample at this instant.
    #[must_use]
    pub fn contributing(&self) -> StreamMask {
        let mut mask = StreamMask::EMPTY;
        if self.accel.is_some() {
            mask.insert(StreamMask::ACC);
        }
        if self.gyro.is_some() {
            mask.insert(StreamMask::GYR);
        }
        if self.mag.is_some() {
            mask.insert(StreamMask::MAG);
        }
        mask
    }
}

/// Interleave three pre-ordered streams into a sequence of aligned frames.
///
/// Each step takes the minimum timestamp among the current stream heads
/// (gyro consulted first, then accel, then mag; a tie-break convention
/// only, the result is a true minimum) and advances every stream whose
/// head equals it. Equal timestamps coalesce into one frame; later
/// timestamps wait for a later frame. Empty streams are skipped; all-empty
/// input yields an empty sequence.
#[must_use]
pub fn align_streams(accel: &[Sample], gyro: &[Sample], mag: &[Sample]) -> Vec<AlignedFrame> {
    let mut frames = Vec::with_capacity(accel.len() + gyro.len() + mag.len());
    let mut ai = 0;
    let mut gi = 0;
    let mut mi = 0;

    while ai < accel.len() || gi < gyro.len() || mi < mag.len() {
        let mut base_tm: Option<i64> = None;
        if gi < gyro.len() {
            base_tm = Some(gyro[gi].timestamp_ns);
        }
        if ai < accel.len() {
            let t = accel[ai].timestamp_ns;
            base_tm = Some(base_tm.map_or(t, |b| b.min(t)));
        }
        if mi < mag.len() {
            let t = mag[mi].timestamp_ns;
            base_tm = Some(base_tm.map_or(t, |b| b.min(t)));
        }
        let Some(timestamp_ns) = base_tm else {
            break;
        };

        let mut frame = AlignedFrame {
            timestamp_ns,
            accel: None,
            gyro: None,
            mag: None,
        };
        if ai < accel.len() && accel[ai].timestamp_ns == timestamp_ns {
            frame.accel = Some(ai);
            ai += 1;
        }
        if gi < gyro.len() && gyro[gi].timestamp_ns == timestamp_ns {
            frame.gyro = Some(gi);
            gi += 1;
        }
        if mi < mag.len() && mag[mi].timestamp_ns == timestamp_ns {
            frame.mag = Some(mi);
            mi += 1;
        }
        frames.push(frame);
    }

    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use imud_core::SensorKind;

    fn sample(kind: SensorKind, timestamp_ns: i64) -> Sample {
        Sample::new(kind, 1, 2, 3, timestamp_ns)
    }

    fn accel(ts: &[i64]) -> Vec<Sample> {
        ts.iter().map(|&t| sample(SensorKind::Accel, t)).collect()
    }

    fn gyro(ts: &[i64]) -> Vec<Sample> {
        ts.iter().map(|&t| sample(SensorKind::Gyro, t)).collect()
    }

    fn mag(ts: &[i64]) -> Vec<Sample> {
        ts.iter().map(|&t| sample(SensorKind::Mag, t)).collect()
    }

    #[test]
    fn test_equal_timestamps_coalesce() {
        let frames = align_streams(&accel(&[0, 10]), &gyro(&[0, 5]), &[]);
        assert_eq!(frames.len(), 3);

        assert_eq!(frames[0].timestamp_ns, 0);
        assert_eq!(frames[0].contributing(), StreamMask::ACC | StreamMask::GYR);
        assert_eq!(frames[0].accel, Some(0));
        assert_eq!(frames[0].gyro, Some(0));

        assert_eq!(frames[1].timestamp_ns, 5);
        assert_eq!(frames[1].contributing(), StreamMask::GYR);
        assert_eq!(frames[1].gyro, Some(1));

        assert_eq!(frames[2].timestamp_ns, 10);
        assert_eq!(frames[2].contributing(), StreamMask::ACC);
        assert_eq!(frames[2].accel, Some(1));
    }

    #[test]
    fn test_all_empty_yields_no_frames() {
        assert!(align_streams(&[], &[], &[]).is_empty());
    }

    #[test]
    fn test_single_stream_passes_through() {
        let frames = align_streams(&[], &gyro(&[1, 2, 3]), &[]);
        let timestamps: Vec<_> = frames.iter().map(|f| f.timestamp_ns).collect();
        assert_eq!(timestamps, vec![1, 2, 3]);
        assert!(frames.iter().all(|f| f.contributing() == StreamMask::GYR));
    }

    #[test]
    fn test_three_streams_interleave_in_order() {
        let frames = align_streams(&accel(&[0, 20, 40]), &gyro(&[10, 20, 30]), &mag(&[20]));
        let timestamps: Vec<_> = frames.iter().map(|f| f.timestamp_ns).collect();
        assert_eq!(timestamps, vec![0, 10, 20, 30, 40]);

        let triple = &frames[2];
        assert_eq!(
            triple.contributing(),
            StreamMask::ACC | StreamMask::GYR | StreamMask::MAG
        );
        assert_eq!(triple.accel, Some(1));
        assert_eq!(triple.gyro, Some(1));
        assert_eq!(triple.mag, Some(0));
    }

    #[test]
    fn test_zero_timestamp_is_a_valid_instant() {
        // A head at t=0 must not be confused with "no data".
        let frames = align_streams(&accel(&[0]), &gyro(&[-5]), &[]);
        let timestamps: Vec<_> = frames.iter().map(|f| f.timestamp_ns).collect();
        assert_eq!(timestamps, vec![-5, 0]);
    }
}
