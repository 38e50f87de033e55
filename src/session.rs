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

//! Session bookkeeping: elapsed time since the session started and the
//! measured capture rate of the camera.
//!
//! See [`SessionState`] and [`CaptureRateMeter`].

use core::time::Duration;

/// State of one measurement session. Created on session start and reset on
/// restart.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    elapsed: Duration,
    min_collection: Duration,
    consumed_frames: usize,
}

impl SessionState {
    /// Creates a new session that collects data until it is older than
    /// `min_collection`.
    pub const fn new(min_collection: Duration) -> Self {
        Self {
            elapsed: Duration::ZERO,
            min_collection,
            consumed_frames: 0,
        }
    }

    /// Accounts for one more frame that covers `frame_duration`.
    #[inline]
    pub fn advance(&mut self, frame_duration: Duration) {
        self.elapsed = self.elapsed.saturating_add(frame_duration);
        self.consumed_frames += 1;
    }

    /// Returns the passed time since the session started.
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Amount of frames delivered in this session, including dropped ones.
    pub const fn consumed_frames(&self) -> usize {
        self.consumed_frames
    }

    /// Whether not enough data was collected yet to report a number.
    pub fn is_collecting(&self) -> bool {
        self.elapsed <= self.min_collection
    }

    /// Starts over with a fresh session.
    pub fn restart(&mut self) {
        *self = Self::new(self.min_collection);
    }
}

/// Measures the capture rate from the timestamps of consecutive frames.
///
/// Cameras don't deliver frames at a constant rate; the rate is re-measured
/// for every frame.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct CaptureRateMeter {
    previous_timestamp: Option<Duration>,
    latest_rate_hz: Option<f32>,
}

impl CaptureRateMeter {
    pub const fn new() -> Self {
        Self {
            previous_timestamp: None,
            latest_rate_hz: None,
        }
    }

    /// Registers the timestamp of a new frame and returns the capture rate
    /// derived from the distance to the previous frame.
    ///
    /// Returns `None` for the first frame and for timestamps that are not
    /// strictly increasing. The latter don't replace the previous timestamp.
    pub fn tick(&mut self, timestamp: Duration) -> Option<f32> {
        let Some(previous) = self.previous_timestamp else {
            self.previous_timestamp.replace(timestamp);
            return None;
        };

        if timestamp <= previous {
            log::warn!(
                "Frame timestamp {timestamp:?} is not after previous timestamp {previous:?}; ignoring"
            );
            return None;
        }

        self.previous_timestamp.replace(timestamp);
        let rate_hz = 1.0 / (timestamp - previous).as_secs_f32();
        self.latest_rate_hz.replace(rate_hz);
        Some(rate_hz)
    }

    /// The rate measured on the latest valid [`Self::tick`].
    pub const fn latest_rate_hz(&self) -> Option<f32> {
        self.latest_rate_hz
    }

    /// Timestamp of the latest accepted frame.
    pub const fn previous_timestamp(&self) -> Option<Duration> {
        self.previous_timestamp
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
