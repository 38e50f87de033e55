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

//! Configuration of the [`PulseDetector`].
//!
//! All values carry their unit in the field name. The defaults correspond to a
//! phone camera delivering roughly 30 frames per second with the torch turned
//! on.
//!
//! [`PulseDetector`]: crate::PulseDetector

use core::time::Duration;
use thiserror::Error;

/// Default amount of samples in the analysis window. At 30 fps this covers
/// ~8.5 seconds.
pub const DEFAULT_WINDOW_SIZE: usize = 256;

/// Smallest window that still yields a usable spectrum.
pub const MIN_WINDOW_SIZE: usize = 16;

/// Lowest plausible heart rate.
pub const DEFAULT_MIN_HEART_RATE_BPM: f32 = 40.0;

/// Highest plausible heart rate.
pub const DEFAULT_MAX_HEART_RATE_BPM: f32 = 230.0;

/// Minimum amount of collected data before any number is reported.
pub const DEFAULT_MIN_COLLECTION: Duration = Duration::from_secs(15);

/// Both estimators must be at most this far apart to report a locked reading.
pub const DEFAULT_AGREEMENT_THRESHOLD_BPM: f32 = 5.0;

/// Trailing part of the window that the zero-crossing counter looks at.
pub const DEFAULT_TEMPORAL_WINDOW: Duration = Duration::from_secs(10);

/// Capture rate assumed until the first valid measurement arrives.
pub const DEFAULT_CAPTURE_RATE_HZ: f32 = 30.0;

/// Possible errors when validating a [`DetectorConfig`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The FFT needs a power of two.
    #[error("window size {0} is not a power of two")]
    WindowSizeNotPowerOfTwo(usize),
    #[error("window size {0} is smaller than the minimum of {MIN_WINDOW_SIZE}")]
    WindowSizeTooSmall(usize),
    #[error("invalid heart rate range: {min_bpm} bpm..={max_bpm} bpm")]
    InvalidBpmRange { min_bpm: f32, max_bpm: f32 },
    #[error("agreement threshold must be a finite, non-negative number of bpm, is {0}")]
    InvalidAgreementThreshold(f32),
    #[error("the duration `{0}` must not be zero")]
    InvalidDuration(&'static str),
    #[error("capture rate must be finite and positive, is {0} Hz")]
    InvalidCaptureRate(f32),
    #[error("derivative noise floor must be finite and non-negative, is {0}")]
    InvalidNoiseFloor(f32),
}

/// Tunables of the detector. Use [`DetectorConfig::default`] and override
/// single fields as needed.
///
/// ```rust
/// use pulse_detector::DetectorConfig;
/// let config = DetectorConfig {
///     window_size: 512,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Amount of samples in the sliding window. Must be a power of two.
    pub window_size: usize,
    /// Lower bound of the spectral search band.
    pub min_heart_rate_bpm: f32,
    /// Upper bound of the spectral search band.
    pub max_heart_rate_bpm: f32,
    /// Readings stay [`Reading::Collecting`] until the session is older than
    /// this.
    ///
    /// [`Reading::Collecting`]: crate::Reading::Collecting
    pub min_collection: Duration,
    /// Maximum difference of both estimates for a locked reading.
    pub agreement_threshold_bpm: f32,
    /// Length of the trailing sub-window for the zero-crossing counter.
    pub temporal_window: Duration,
    /// Capture rate used until a valid rate was delivered.
    pub initial_capture_rate_hz: f32,
    /// Differences below this magnitude don't count as rising or falling.
    pub derivative_noise_floor: f32,
    /// Runs the smoothed signal through a bandpass before windowing. Only
    /// needed for sources with strong drift or flicker.
    pub bandpass_prefilter: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            min_heart_rate_bpm: DEFAULT_MIN_HEART_RATE_BPM,
            max_heart_rate_bpm: DEFAULT_MAX_HEART_RATE_BPM,
            min_collection: DEFAULT_MIN_COLLECTION,
            agreement_threshold_bpm: DEFAULT_AGREEMENT_THRESHOLD_BPM,
            temporal_window: DEFAULT_TEMPORAL_WINDOW,
            initial_capture_rate_hz: DEFAULT_CAPTURE_RATE_HZ,
            derivative_noise_floor: 0.0,
            bandpass_prefilter: false,
        }
    }
}

impl DetectorConfig {
    /// Creates the default configuration with a custom window size.
    #[must_use]
    pub fn with_window_size(window_size: usize) -> Self {
        Self {
            window_size,
            ..Default::default()
        }
    }

    /// Checks all structural properties. A detector refuses to run with an
    /// invalid configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.window_size.is_power_of_two() {
            return Err(ConfigError::WindowSizeNotPowerOfTwo(self.window_size));
        }
        if self.window_size < MIN_WINDOW_SIZE {
            return Err(ConfigError::WindowSizeTooSmall(self.window_size));
        }

        let bpm_range_valid = self.min_heart_rate_bpm.is_finite()
            && self.max_heart_rate_bpm.is_finite()
            && self.min_heart_rate_bpm > 0.0
            && self.min_heart_rate_bpm < self.max_heart_rate_bpm;
        if !bpm_range_valid {
            return Err(ConfigError::InvalidBpmRange {
                min_bpm: self.min_heart_rate_bpm,
                max_bpm: self.max_heart_rate_bpm,
            });
        }

        if !self.agreement_threshold_bpm.is_finite() || self.agreement_threshold_bpm < 0.0 {
            return Err(ConfigError::InvalidAgreementThreshold(
                self.agreement_threshold_bpm,
            ));
        }

        if self.temporal_window.is_zero() {
            return Err(ConfigError::InvalidDuration("temporal_window"));
        }

        if !self.initial_capture_rate_hz.is_normal() || self.initial_capture_rate_hz < 0.0 {
            return Err(ConfigError::InvalidCaptureRate(
                self.initial_capture_rate_hz,
            ));
        }

        if !self.derivative_noise_floor.is_finite() || self.derivative_noise_floor < 0.0 {
            return Err(ConfigError::InvalidNoiseFloor(self.derivative_noise_floor));
        }

        Ok(())
    }
}
