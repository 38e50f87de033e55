/*
MIT License

Copyright (c) 2024 Philipp Schuster

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/

//! Time-domain heart rate estimation.
//!
//! Every local extremum of the (smoothed) signal is a sign change of its first
//! difference. One cardiac cycle produces a peak and a trough, i.e., two sign
//! changes:
//! ```text
//!    x         x
//!   x x       x x        dx: + + - - + + - -
//! -x---x-----x---x--          ^   ^   ^   ^  sign changes
//!       x   x
//!        x x
//! ```
//! This has a finer resolution than the spectrum but is sensitive to noise in
//! the derivative. See [`TemporalEstimator`].

use core::time::Duration;

const SECONDS_PER_MINUTE: f32 = 60.0;

/// Result of one temporal estimation cycle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TemporalEstimate {
    /// Sign changes of the first difference in the analyzed sub-window.
    pub zero_crossing_count: usize,
    /// Heart rate derived from the crossings. Never negative.
    pub bpm: f32,
}

/// Zero-crossing counter over the trailing part of the window.
#[derive(Clone, Debug)]
pub struct TemporalEstimator {
    temporal_window: Duration,
    noise_floor: f32,
}

impl TemporalEstimator {
    /// Creates a new estimator that looks at the last `temporal_window` of
    /// samples. Differences with a magnitude at or below `noise_floor` are
    /// treated as flat.
    pub fn new(temporal_window: Duration, noise_floor: f32) -> Self {
        debug_assert!(!temporal_window.is_zero());
        debug_assert!(noise_floor >= 0.0);
        Self {
            temporal_window,
            noise_floor,
        }
    }

    /// Estimates the heart rate of the given window (oldest to newest).
    ///
    /// The sub-window covers the last `temporal_window` at the current
    /// capture rate, or the whole window if it is shorter. Its duration is
    /// measured between the first and the last sample.
    pub fn estimate(&self, window: &[f32], capture_rate_hz: f32) -> TemporalEstimate {
        debug_assert!(capture_rate_hz.is_normal() && capture_rate_hz > 0.0);

        let sub_window_len = self.sub_window_len(window.len(), capture_rate_hz);
        let sub_window = &window[window.len() - sub_window_len..];

        // Need at least two differences for a single sign change.
        if sub_window.len() < 3 {
            return TemporalEstimate {
                zero_crossing_count: 0,
                bpm: 0.0,
            };
        }

        let differences = sub_window.windows(2).map(|pair| pair[1] - pair[0]);
        let zero_crossing_count = count_sign_changes(differences, self.noise_floor);
        // N samples span N - 1 frame intervals.
        let sub_window_duration = (sub_window_len - 1) as f32 / capture_rate_hz;
        let bpm = crossings_to_bpm(zero_crossing_count, sub_window_duration);

        log::trace!(
            "temporal estimate: {zero_crossing_count} crossings in {sub_window_duration}s ({sub_window_len} samples), bpm={bpm}"
        );

        TemporalEstimate {
            zero_crossing_count,
            bpm,
        }
    }

    /// Amount of trailing samples that the estimator looks at: enough to
    /// span `temporal_window`, i.e., one more than the frame intervals in it.
    fn sub_window_len(&self, available: usize, capture_rate_hz: f32) -> usize {
        let intervals = libm::roundf(self.temporal_window.as_secs_f32() * capture_rate_hz) as usize;
        intervals.saturating_add(1).min(available)
    }
}

/// Counts the transitions from rising to falling and vice versa in a sequence
/// of differences. Differences with a magnitude at or below `noise_floor`
/// don't carry a sign and neither break nor start a trend.
pub fn count_sign_changes(differences: impl Iterator<Item = f32>, noise_floor: f32) -> usize {
    differences
        .filter(|dx| libm::fabsf(*dx) > noise_floor)
        .map(|dx| dx > 0.0)
        .fold((0, None), |(count, previous_rising), rising| {
            match previous_rising {
                Some(previous_rising) if previous_rising != rising => (count + 1, Some(rising)),
                _ => (count, Some(rising)),
            }
        })
        .0
}

/// Converts sign changes within the given duration (seconds) to a heart
/// rate. Two sign changes make one beat.
#[inline]
pub fn crossings_to_bpm(crossings: usize, duration_secs: f32) -> f32 {
    if duration_secs <= 0.0 {
        return 0.0;
    }
    (crossings as f32 / 2.0) * (SECONDS_PER_MINUTE / duration_secs)
}
