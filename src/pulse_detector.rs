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

//! Module for [`PulseDetector`].

use crate::config::{ConfigError, DetectorConfig};
use crate::prefilter::Prefilter;
use crate::reconciler::{Reading, Reconciler};
use crate::sample_window::SampleWindow;
use crate::session::{CaptureRateMeter, SessionState};
use crate::smoother::Smoother;
use crate::spectral::{SpectralEstimator, SpectrumEstimate};
use crate::temporal::{TemporalEstimate, TemporalEstimator};
use core::time::Duration;

/// Pulse detector following the properties described in the
/// [module description].
///
/// The detector is fed one scalar per camera frame, for example the average
/// hue of the frame, together with the currently measured capture rate. Once
/// per second (counted in frames), it estimates the heart rate and updates
/// the [`Reading`].
///
/// ## Example with a known capture rate
/// ```rust
/// use pulse_detector::{PulseDetector, Reading};
/// let mut detector = PulseDetector::with_window_size(256).unwrap();
///
/// // regularly call this with the latest frame data
/// for frame_value in [0.951, 0.953, 0.949 /*, ... */] {
///     detector.on_sample(frame_value, 30.0);
/// }
/// assert_eq!(detector.latest_reading(), Reading::Collecting);
/// ```
///
/// ## Example with frame timestamps
/// ```rust
/// use core::time::Duration;
/// use pulse_detector::PulseDetector;
/// let mut detector = PulseDetector::with_window_size(256).unwrap();
///
/// // the capture rate is measured from the timestamps
/// detector.on_frame(0.951, Duration::from_millis(0));
/// detector.on_frame(0.953, Duration::from_millis(33));
/// println!("{}", detector.latest_reading());
/// ```
///
/// [module description]: crate
#[derive(Debug)]
pub struct PulseDetector {
    config: DetectorConfig,
    smoother: Smoother,
    prefilter: Prefilter,
    window: SampleWindow,
    /// Window content in order, handed to the estimators. Reused to not
    /// allocate in every cycle.
    ordered_window: Vec<f32>,
    reconciler: Reconciler,
    session: SessionState,
    rate_meter: CaptureRateMeter,
    /// Latest valid capture rate.
    capture_rate_hz: f32,
    frames_since_cycle: usize,
    latest_reading: Reading,
}

impl PulseDetector {
    /// Creates a new detector and sets up the FFT for the configured window
    /// size. Fails if the configuration is invalid, most notably if the
    /// window size is not a power of two.
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let spectral = SpectralEstimator::new(
            config.window_size,
            config.min_heart_rate_bpm,
            config.max_heart_rate_bpm,
        );
        let temporal =
            TemporalEstimator::new(config.temporal_window, config.derivative_noise_floor);
        let reconciler = Reconciler::new(
            spectral,
            temporal,
            config.min_collection,
            config.agreement_threshold_bpm,
        );

        let prefilter = if config.bandpass_prefilter {
            Prefilter::new(config.min_heart_rate_bpm, config.max_heart_rate_bpm)
        } else {
            Prefilter::new_passthrough()
        };

        log::debug!("Created pulse detector: {config:?}");

        Ok(Self {
            smoother: Smoother::new(),
            prefilter,
            window: SampleWindow::new(config.window_size),
            ordered_window: Vec::with_capacity(config.window_size),
            reconciler,
            session: SessionState::new(config.min_collection),
            rate_meter: CaptureRateMeter::new(),
            capture_rate_hz: config.initial_capture_rate_hz,
            frames_since_cycle: 0,
            latest_reading: Reading::Collecting,
            config,
        })
    }

    /// Creates a new detector with the default configuration and the given
    /// window size.
    pub fn with_window_size(window_size: usize) -> Result<Self, ConfigError> {
        Self::new(DetectorConfig::with_window_size(window_size))
    }

    /// Consumes the value of the latest frame together with the currently
    /// measured capture rate. The session time advances by one frame
    /// duration (`1 / capture_rate_hz`).
    ///
    /// Returns the new reading if this sample completed an estimation cycle.
    /// Cycles run once every `capture_rate_hz` frames, i.e., about once per
    /// second.
    ///
    /// Invalid capture rates are replaced by the latest valid one. Samples
    /// that are not finite are dropped. Neither is an error.
    pub fn on_sample(&mut self, value: f32, capture_rate_hz: f32) -> Option<Reading> {
        let capture_rate_hz = self.accept_capture_rate(capture_rate_hz);
        // Absurdly slow rates exceed the range of `Duration`.
        let frame_duration =
            Duration::try_from_secs_f32(1.0 / capture_rate_hz).unwrap_or(Duration::MAX);
        self.consume_sample(value, capture_rate_hz, frame_duration)
    }

    /// Consumes the value of the latest frame together with its capture
    /// timestamp. The capture rate is measured from the distance to the
    /// previous frame, the session time advances by that distance.
    ///
    /// Timestamps only need to be monotonic; their origin doesn't matter.
    pub fn on_frame(&mut self, value: f32, timestamp: Duration) -> Option<Reading> {
        let previous_timestamp = self.rate_meter.previous_timestamp();
        match self.rate_meter.tick(timestamp) {
            Some(measured_rate_hz) => {
                let capture_rate_hz = self.accept_capture_rate(measured_rate_hz);
                // previous timestamp is always set if a rate was measured
                let frame_duration = timestamp - previous_timestamp.unwrap_or(timestamp);
                self.consume_sample(value, capture_rate_hz, frame_duration)
            }
            None if previous_timestamp.is_none() => {
                // First frame of the session: nothing to measure yet.
                self.consume_sample(value, self.capture_rate_hz, Duration::ZERO)
            }
            // Out-of-order timestamp, already reported by the meter.
            None => None,
        }
    }

    /// Returns the most recent reading. Calling this repeatedly without new
    /// samples returns the same value.
    pub const fn latest_reading(&self) -> Reading {
        self.latest_reading
    }

    /// Starts a new session. All collected samples and estimates are
    /// dropped; the detector reports [`Reading::Collecting`] again. The FFT
    /// setup and the latest valid capture rate are kept.
    pub fn restart_session(&mut self) {
        log::debug!(
            "Restarting session after {:?} ({} frames)",
            self.session.elapsed(),
            self.session.consumed_frames()
        );
        self.smoother.reset();
        self.prefilter.reset();
        self.window.clear();
        self.reconciler.reset();
        self.session.restart();
        self.rate_meter.reset();
        self.frames_since_cycle = 0;
        self.latest_reading = Reading::Collecting;
    }

    /// Spectral estimate of the latest cycle after the collection phase.
    pub const fn latest_spectrum(&self) -> Option<SpectrumEstimate> {
        self.reconciler.latest_spectrum()
    }

    /// Temporal estimate of the latest cycle after the collection phase.
    pub const fn latest_temporal(&self) -> Option<TemporalEstimate> {
        self.reconciler.latest_temporal()
    }

    /// Power spectrum of the latest cycle, e.g., for a debug view.
    pub fn power_spectrum(&self) -> &[f32] {
        self.reconciler.power_spectrum()
    }

    /// Access the window of smoothed samples, e.g., to draw the waveform.
    pub const fn window(&self) -> &SampleWindow {
        &self.window
    }

    pub const fn session(&self) -> &SessionState {
        &self.session
    }

    pub const fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Latest valid capture rate.
    pub const fn capture_rate_hz(&self) -> f32 {
        self.capture_rate_hz
    }

    /// Returns the given capture rate if it is usable and remembers it.
    /// Otherwise, returns the latest valid one.
    fn accept_capture_rate(&mut self, capture_rate_hz: f32) -> f32 {
        if capture_rate_hz.is_normal() && capture_rate_hz > 0.0 {
            self.capture_rate_hz = capture_rate_hz;
        } else {
            log::warn!(
                "Invalid capture rate {capture_rate_hz} Hz; using {} Hz",
                self.capture_rate_hz
            );
        }
        self.capture_rate_hz
    }

    /// Smooths the sample, adds it to the window, and runs an estimation
    /// cycle when it is due.
    fn consume_sample(
        &mut self,
        value: f32,
        capture_rate_hz: f32,
        frame_duration: Duration,
    ) -> Option<Reading> {
        // Time passes even if the frame is unusable.
        self.session.advance(frame_duration);

        if !value.is_finite() {
            log::warn!("Dropping non-finite sample {value}");
            return None;
        }

        let smoothed = self.smoother.smooth(value);
        let filtered = self.prefilter.process(smoothed, capture_rate_hz);
        self.window.push(filtered);
        log::trace!("sample: raw={value}, smoothed={smoothed}, filtered={filtered}");

        self.frames_since_cycle += 1;
        if self.frames_since_cycle < Self::frames_per_cycle(capture_rate_hz) {
            return None;
        }
        self.frames_since_cycle = 0;

        Some(self.run_cycle(capture_rate_hz))
    }

    /// One cycle per second, counted in frames.
    fn frames_per_cycle(capture_rate_hz: f32) -> usize {
        (libm::roundf(capture_rate_hz) as usize).max(1)
    }

    fn run_cycle(&mut self, capture_rate_hz: f32) -> Reading {
        self.ordered_window.clear();
        self.ordered_window.extend(self.window.iter().copied());

        let elapsed = self.session.elapsed();
        let reading = self
            .reconciler
            .evaluate(&self.ordered_window, capture_rate_hz, elapsed);

        log::debug!(
            "{:.1}s, {capture_rate_hz:.1} Hz, {} samples: {reading} (spectral: {:?}, temporal: {:?})",
            elapsed.as_secs_f32(),
            self.ordered_window.len(),
            self.reconciler.latest_spectrum().map(|estimate| estimate.bpm),
            self.reconciler.latest_temporal().map(|estimate| estimate.bpm),
        );

        self.latest_reading = reading;
        reading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::Confidence;
    use crate::test_utils::signals;
    use crate::DEFAULT_MIN_COLLECTION;

    #[test]
    fn is_send_and_sync() {
        fn accept<I: Send + Sync>() {}

        accept::<PulseDetector>();
    }

    /// Feeds all samples with a constant capture rate and returns the
    /// readings of all completed cycles.
    fn simulate_camera(
        detector: &mut PulseDetector,
        samples: &[f32],
        capture_rate_hz: f32,
    ) -> Vec<Reading> {
        samples
            .iter()
            .flat_map(|&sample| detector.on_sample(sample, capture_rate_hz))
            .collect()
    }

    #[test]
    fn rejects_invalid_window_size() {
        check!(
            PulseDetector::with_window_size(300).unwrap_err()
                == ConfigError::WindowSizeNotPowerOfTwo(300)
        );
        check!(PulseDetector::with_window_size(512).is_ok());
    }

    #[test]
    fn latest_reading_is_idempotent() {
        let mut detector = PulseDetector::with_window_size(256).unwrap();
        let samples = signals::ppg_like(1.2, 30.0, 20 * 30, 0.2, 1);
        simulate_camera(&mut detector, &samples, 30.0);

        let first = detector.latest_reading();
        let second = detector.latest_reading();
        check!(first == second);
    }

    #[test]
    fn collecting_before_threshold() {
        let mut detector = PulseDetector::with_window_size(256).unwrap();
        // 10 s at 30 Hz of a perfect pulse
        let samples = signals::ppg_like(1.2, 30.0, 10 * 30, 0.0, 1);
        let readings = simulate_camera(&mut detector, &samples, 30.0);

        check!(!readings.is_empty());
        check!(readings.iter().all(|reading| *reading == Reading::Collecting));
        check!(detector.latest_reading() == Reading::Collecting);
        check!(detector.latest_spectrum() == None);
        check!(detector.session().is_collecting());
    }

    #[test]
    fn cycles_run_once_per_second() {
        let mut detector = PulseDetector::with_window_size(256).unwrap();
        let samples = signals::sine(1.0, 30.0, 30 * 7);
        let readings = simulate_camera(&mut detector, &samples, 30.0);
        check!(readings.len() == 7);

        let mut detector = PulseDetector::with_window_size(256).unwrap();
        let samples = signals::sine(1.0, 15.0, 15 * 7);
        let readings = simulate_camera(&mut detector, &samples, 15.0);
        check!(readings.len() == 7);
    }

    #[test]
    fn window_fills_and_slides() {
        let mut detector = PulseDetector::with_window_size(64).unwrap();
        for i in 0..40 {
            detector.on_sample(i as f32, 30.0);
        }
        check!(detector.window().len() == 40);
        check!(!detector.window().is_full());

        for i in 0..40 {
            detector.on_sample(i as f32, 30.0);
        }
        check!(detector.window().len() == 64);
        check!(detector.window().is_full());
        check!(detector.window().total_pushed_samples() == 80);
    }

    #[test]
    fn clean_pulse_locks_after_collection() {
        // 32 Hz and 256 samples: 75 bpm is exactly bin 10
        let mut detector = PulseDetector::with_window_size(256).unwrap();
        let samples = signals::ppg_like(1.25, 32.0, 25 * 32, 0.0, 7);
        let readings = simulate_camera(&mut detector, &samples, 32.0);

        check!(readings.len() == 25);
        let collecting = readings
            .iter()
            .take_while(|reading| **reading == Reading::Collecting)
            .count();
        // 15 s threshold is inclusive
        check!(collecting == DEFAULT_MIN_COLLECTION.as_secs() as usize);

        let reading = detector.latest_reading();
        check!(reading.confidence() == Confidence::Locked, "{reading}");
        let bpm = reading.bpm().unwrap();
        check!((72..=78).contains(&bpm), "{reading}");
        check!(detector.latest_spectrum().unwrap().bpm == 75.0);
    }

    #[test]
    fn noisy_pulse_is_found_with_prefilter() {
        let config = DetectorConfig {
            window_size: 512,
            bandpass_prefilter: true,
            derivative_noise_floor: 0.0005,
            min_collection: Duration::from_secs(5),
            ..Default::default()
        };
        let mut detector = PulseDetector::new(config).unwrap();
        let samples = signals::ppg_like(1.1, 30.0, 30 * 30, 0.3, 3);
        simulate_camera(&mut detector, &samples, 30.0);

        let spectrum = detector.latest_spectrum().unwrap();
        check!((spectrum.bpm - 66.0).abs() <= crate::spectral::bin_width_bpm(512, 30.0));
        check!(detector.latest_reading() != Reading::Collecting);
        check!(detector.latest_reading().bpm_range().is_some());
    }

    #[test]
    fn invalid_input_degrades_gracefully() {
        let mut detector = PulseDetector::with_window_size(256).unwrap();
        detector.on_sample(0.5, 25.0);
        check!(detector.capture_rate_hz() == 25.0);

        // invalid rate: previous one is used
        detector.on_sample(0.5, 0.0);
        detector.on_sample(0.5, f32::NAN);
        detector.on_sample(0.5, -30.0);
        check!(detector.capture_rate_hz() == 25.0);
        check!(detector.window().len() == 4);

        // invalid sample: dropped, but time passes
        check!(detector.on_sample(f32::NAN, 25.0) == None);
        check!(detector.on_sample(f32::INFINITY, 25.0) == None);
        check!(detector.window().len() == 4);
        check!(detector.session().consumed_frames() == 6);
        check!(detector.latest_reading() == Reading::Collecting);
    }

    #[test]
    fn extreme_capture_rates_do_not_panic() {
        let mut detector = PulseDetector::with_window_size(256).unwrap();
        // one frame lasts longer than `Duration` can express
        detector.on_sample(0.5, 1e-20);
        check!(detector.capture_rate_hz() == 1e-20);
        check!(detector.session().elapsed() == Duration::MAX);
        check!(detector.latest_reading().confidence() == Confidence::Ranged);

        let mut detector = PulseDetector::with_window_size(256).unwrap();
        detector.on_frame(0.5, Duration::ZERO);
        detector.on_frame(0.5, Duration::from_secs(u64::MAX));
        check!(detector.capture_rate_hz() < 1e-18);
        // the measured rate is reused for the invalid one
        detector.on_sample(0.5, f32::NAN);
        check!(detector.session().consumed_frames() == 3);
        check!(detector.session().elapsed() == Duration::MAX);
        check!(detector.window().len() == 3);
    }

    #[test]
    fn flat_signal_is_not_an_error() {
        let config = DetectorConfig {
            min_collection: Duration::ZERO,
            ..Default::default()
        };
        let mut detector = PulseDetector::new(config).unwrap();
        let readings = simulate_camera(&mut detector, &[0.0; 300], 30.0);
        check!(readings.len() == 10);

        let temporal = detector.latest_temporal().unwrap();
        check!(temporal.zero_crossing_count == 0);
        check!(temporal.bpm == 0.0);
        check!(detector.latest_reading().confidence() == Confidence::Ranged);
    }

    #[test]
    fn frame_timestamps_drive_rate_and_session() {
        let mut detector = PulseDetector::with_window_size(256).unwrap();
        let samples = signals::sine(1.0, 25.0, 50);
        for (i, sample) in samples.into_iter().enumerate() {
            detector.on_frame(sample, Duration::from_millis(5000 + i as u64 * 40));
        }

        check!(approx_eq!(f32, detector.capture_rate_hz(), 25.0, epsilon = 0.01));
        check!(detector.session().consumed_frames() == 50);
        let drift = detector.session().elapsed().abs_diff(Duration::from_millis(49 * 40));
        check!(drift < Duration::from_millis(1));

        // out-of-order frames are dropped
        check!(detector.on_frame(0.0, Duration::from_millis(10)) == None);
        check!(detector.session().consumed_frames() == 50);
        check!(detector.window().len() == 50);
    }

    #[test]
    fn restart_session_starts_collecting_again() {
        let config = DetectorConfig {
            min_collection: Duration::from_secs(2),
            ..Default::default()
        };
        let mut detector = PulseDetector::new(config).unwrap();
        // 32 Hz: frame durations sum up to exact seconds
        let samples = signals::sine(1.2, 32.0, 32 * 5);
        simulate_camera(&mut detector, &samples, 32.0);
        check!(detector.latest_reading() != Reading::Collecting);

        detector.restart_session();
        check!(detector.latest_reading() == Reading::Collecting);
        check!(detector.window().is_empty());
        check!(detector.latest_spectrum() == None);
        check!(detector.session().elapsed() == Duration::ZERO);
        check!(detector.capture_rate_hz() == 32.0);

        let readings = simulate_camera(&mut detector, &samples[..64], 32.0);
        check!(readings == [Reading::Collecting, Reading::Collecting]);
    }
}
