//! Fixed-ratio 5-to-4 resampling.
//!
//! Converts every 5 consecutive input samples into 4 evenly spaced output
//! samples: phase 0 replays the retained previous sample, phases 1-3
//! interpolate between previous and current, phase 4 produces nothing.
//! The only state is the carried previous sample, owned by the caller.

use imud_core::Sample;

// Interpolation clamps inputs just below the integer limits so the
// quarter-weight sums cannot overflow.
const CLAMP_I32: i32 = i32::MAX - 2;
const CLAMP_I64: i64 = i64::MAX - 2;

/// The retained previous sample between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResampleState {
    pub data: [i32; 3],
    pub timestamp_ns: i64,
}

/// One resampler output tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resampled {
    pub data: [i32; 3],
    pub timestamp_ns: i64,
    /// When false the caller must not forward this tick downstream.
    pub valid: bool,
}

fn quarter_i32(v: i32) -> i32 {
    (v.min(CLAMP_I32) + 2) >> 2
}

fn quarter_i64(v: i64) -> i64 {
    (v.min(CLAMP_I64) + 2) >> 2
}

/// Run one input sample through the 5-to-4 cycle keyed by `counter % 5`.
///
/// Whatever the phase, the current input becomes the new previous state
/// before returning, so the caller just threads `prev` through every call.
pub fn resample_5to4(
    data: [i32; 3],
    timestamp_ns: i64,
    prev: &mut ResampleState,
    counter: u32,
) -> Resampled {
    let phase = counter % 5;

    let out = match phase {
        0 => Resampled {
            data: prev.data,
            timestamp_ns: prev.timestamp_ns,
            valid: true,
        },
        1..=3 => {
            let n = phase as i32;
            let interpolated = [
                (4 - n) * quarter_i32(prev.data[0]) + n * quarter_i32(data[0]),
                (4 - n) * quarter_i32(prev.data[1]) + n * quarter_i32(data[1]),
                (4 - n) * quarter_i32(prev.data[2]) + n * quarter_i32(data[2]),
            ];
            let n64 = i64::from(n);
            let tm = (4 - n64) * quarter_i64(prev.timestamp_ns) + n64 * quarter_i64(timestamp_ns);
            Resampled {
                data: interpolated,
                timestamp_ns: tm,
                valid: true,
            }
        }
        _ => Resampled {
            data,
            timestamp_ns,
            valid: false,
        },
    };

    *prev = ResampleState {
        data,
        timestamp_ns,
    };
    out
}

/// Per-stream resampler wrapping the pure function with its carried state.
#[derive(Debug, Default)]
pub struct Resampler {
    state: ResampleState,
    counter: u32,
}

impl Resampler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample through the cycle; `None` on the swallowed phase.
    pub fn push(&mut self, sample: Sample) -> Option<Sample> {
        let out = resample_5to4(
            sample.xyz(),
            sample.timestamp_ns,
            &mut self.state,
            self.counter,
        );
        self.counter = self.counter.wrapping_add(1);
        out.valid.then(|| {
            Sample::new(
                sample.kind,
                out.data[0],
                out.data[1],
                out.data[2],
                out.timestamp_ns,
            )
        })
    }
}
