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

//! Optional bandpass filter for the smoothed samples.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};

/// Relative capture rate drift that triggers a redesign of the filter.
const MAX_RATE_DRIFT: f32 = 0.2;

const SECONDS_PER_MINUTE: f32 = 60.0;

/// Helper to pass samples through a bandpass filter that only keeps
/// plausible heart rates. Removes slow brightness drift (e.g., the camera's
/// auto exposure) and flicker.
///
/// The filter coefficients depend on the capture rate. The filter is
/// designed for the first capture rate it sees and redesigned if the rate
/// drifts away by more than 20%. Redesigning resets the filter state.
///
/// Please note that the filter introduces a short group delay and needs a
/// few samples to settle.
#[derive(Debug)]
pub struct Prefilter {
    /// Lower and upper cutoff in Hz. `None` for a passthrough filter.
    band_hz: Option<(f32, f32)>,
    filter: Option<DirectForm2Transposed<f32>>,
    /// Capture rate the current coefficients were designed for.
    design_rate_hz: Option<f32>,
}

impl Prefilter {
    /// Creates a new bandpass filter for the given heart rate band.
    pub fn new(min_bpm: f32, max_bpm: f32) -> Self {
        debug_assert!(min_bpm > 0.0 && min_bpm < max_bpm);
        Self {
            band_hz: Some((min_bpm / SECONDS_PER_MINUTE, max_bpm / SECONDS_PER_MINUTE)),
            filter: None,
            design_rate_hz: None,
        }
    }

    /// Creates a new no-op filter.
    pub const fn new_passthrough() -> Self {
        Self {
            band_hz: None,
            filter: None,
            design_rate_hz: None,
        }
    }

    pub const fn is_passthrough(&self) -> bool {
        self.band_hz.is_none()
    }

    /// Runs one sample through the filter and updates the internal state.
    ///
    /// If no valid filter can be designed for the capture rate (the band is
    /// above the Nyquist frequency), the sample passes unchanged.
    pub fn process(&mut self, sample: f32, capture_rate_hz: f32) -> f32 {
        let Some(band_hz) = self.band_hz else {
            return sample;
        };

        if self.needs_redesign(capture_rate_hz) {
            self.filter = Self::create_biquad_filter(band_hz, capture_rate_hz);
            self.design_rate_hz.replace(capture_rate_hz);
        }

        match self.filter.as_mut() {
            Some(filter) => filter.run(sample),
            None => sample,
        }
    }

    /// Clears the filter state. The next sample designs a new filter.
    pub fn reset(&mut self) {
        self.filter = None;
        self.design_rate_hz = None;
    }

    fn needs_redesign(&self, capture_rate_hz: f32) -> bool {
        match self.design_rate_hz {
            None => true,
            Some(design_rate_hz) => {
                libm::fabsf(capture_rate_hz - design_rate_hz) / design_rate_hz > MAX_RATE_DRIFT
            }
        }
    }

    /// Creates a [`biquad`] bandpass centered at the geometric mean of the
    /// band. The Q factor follows from the band width.
    fn create_biquad_filter(
        (low_hz, high_hz): (f32, f32),
        capture_rate_hz: f32,
    ) -> Option<DirectForm2Transposed<f32>> {
        let center_hz = libm::sqrtf(low_hz * high_hz);
        let q = center_hz / (high_hz - low_hz);

        let f0 = center_hz.hz();
        let fs = capture_rate_hz.hz();

        match Coefficients::<f32>::from_params(Type::BandPass, fs, f0, q) {
            Ok(coefficients) => {
                log::debug!(
                    "Designed bandpass for {capture_rate_hz} Hz: center {center_hz} Hz, Q {q}"
                );
                Some(DirectForm2Transposed::<f32>::new(coefficients))
            }
            Err(e) => {
                log::warn!(
                    "Cannot design bandpass at {center_hz} Hz for capture rate {capture_rate_hz} Hz ({e:?}); passing samples through"
                );
                None
            }
        }
    }
}
