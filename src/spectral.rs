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

//! Spectral heart rate estimation.
//!
//! The pulse modulates the brightness of the illuminated skin, so the
//! strongest frequency of the windowed signal inside the plausible heart rate
//! band is the heart rate. The resolution is limited by the bin width:
//! `capture_rate_hz * 60 / window_size` bpm.
//!
//! See [`SpectralEstimator`].

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

const SECONDS_PER_MINUTE: f32 = 60.0;

/// Tolerance when mapping a bpm limit to a fractional bin index, so that
/// limits that hit a bin exactly are not pushed to the neighbour by rounding
/// errors.
const BIN_EPSILON: f32 = 1e-4;

/// Result of one spectral estimation cycle. Recomputed from scratch every
/// cycle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpectrumEstimate {
    /// Absolute index of the strongest bin in the search band.
    pub peak_bin: usize,
    /// Power (`re^2 + im^2`) of the strongest bin.
    pub peak_power: f32,
    /// Heart rate corresponding to `peak_bin`.
    pub bpm: f32,
}

/// Half-open range of spectrum bins that correspond to plausible heart rates
/// for a given window size and capture rate.
///
/// The range is derived from bpm limits every cycle because the capture rate
/// of a camera drifts. It never contains bin 0 (DC) and never reaches
/// `window_size / 2`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BinRange {
    first_bin: usize,
    bin_count: usize,
    /// The band contains no bin at all and the range was collapsed to the
    /// closest valid bin.
    collapsed: bool,
}

impl BinRange {
    /// Maps the bpm limits to bins: the first bin at or above
    /// `min_bpm` up to the last bin at or below `max_bpm`.
    pub fn from_bpm_limits(
        window_size: usize,
        capture_rate_hz: f32,
        min_bpm: f32,
        max_bpm: f32,
    ) -> Self {
        debug_assert!(window_size.is_power_of_two() && window_size >= 4);
        debug_assert!(capture_rate_hz.is_normal() && capture_rate_hz > 0.0);
        debug_assert!(min_bpm < max_bpm);

        let bpm_to_bin = |bpm: f32| bpm / SECONDS_PER_MINUTE * window_size as f32 / capture_rate_hz;
        let highest_bin = window_size / 2 - 1;

        let first_bin = libm::ceilf(bpm_to_bin(min_bpm) - BIN_EPSILON).max(1.0) as usize;
        let last_bin = libm::floorf(bpm_to_bin(max_bpm) + BIN_EPSILON) as usize;
        let last_bin = last_bin.min(highest_bin);

        if last_bin < first_bin {
            Self {
                first_bin: first_bin.clamp(1, highest_bin),
                bin_count: 1,
                collapsed: true,
            }
        } else {
            Self {
                first_bin,
                bin_count: last_bin - first_bin + 1,
                collapsed: false,
            }
        }
    }

    /// First bin of the search band.
    pub const fn first_bin(&self) -> usize {
        self.first_bin
    }

    /// Exclusive end of the search band.
    pub const fn end_bin(&self) -> usize {
        self.first_bin + self.bin_count
    }

    pub const fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// Whether no bin fits the requested bpm band at the given capture rate.
    pub const fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub const fn contains(&self, bin: usize) -> bool {
        bin >= self.first_bin && bin < self.end_bin()
    }
}

/// Returns the heart rate that corresponds to a spectrum bin.
#[inline]
pub fn bin_to_bpm(bin: usize, window_size: usize, capture_rate_hz: f32) -> f32 {
    bin as f32 / window_size as f32 * capture_rate_hz * SECONDS_PER_MINUTE
}

/// Returns the width of one spectrum bin in bpm.
#[inline]
pub fn bin_width_bpm(window_size: usize, capture_rate_hz: f32) -> f32 {
    bin_to_bpm(1, window_size, capture_rate_hz)
}

/// FFT based estimator. Owns the FFT plan and all scratch buffers; they are
/// created once and reused in every cycle.
pub struct SpectralEstimator {
    window_size: usize,
    min_bpm: f32,
    max_bpm: f32,
    fft: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// `window_size / 2` power bins of the latest cycle.
    power: Vec<f32>,
}

impl SpectralEstimator {
    /// Plans the FFT for the given window size. The window size is expected
    /// to be validated already, see [`crate::DetectorConfig::validate`].
    pub fn new(window_size: usize, min_bpm: f32, max_bpm: f32) -> Self {
        debug_assert!(window_size.is_power_of_two());
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);

        let input = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        Self {
            window_size,
            min_bpm,
            max_bpm,
            fft,
            input,
            spectrum,
            scratch,
            power: vec![0.0; window_size / 2],
        }
    }

    /// Estimates the heart rate of the given window (oldest to newest).
    ///
    /// Shorter windows are zero-padded; for longer ones, only the newest
    /// `window_size` samples are used. The signal mean is removed before the
    /// transformation. An all-zero window yields the first bin of the search
    /// band.
    pub fn estimate(&mut self, window: &[f32], capture_rate_hz: f32) -> SpectrumEstimate {
        let window = if window.len() > self.window_size {
            &window[window.len() - self.window_size..]
        } else {
            window
        };

        self.fill_input(window);
        self.update_power_spectrum();

        let range = self.bin_range(capture_rate_hz);
        let (peak_bin, peak_power) = self.find_peak(range);

        let mut bpm = bin_to_bpm(peak_bin, self.window_size, capture_rate_hz);
        if range.is_collapsed() {
            log::warn!(
                "No spectrum bin matches {}..={} bpm at {capture_rate_hz} Hz; clamping",
                self.min_bpm,
                self.max_bpm
            );
            bpm = bpm.clamp(self.min_bpm, self.max_bpm);
        }

        log::trace!(
            "spectral estimate: bin={peak_bin} (band {}..{}), power={peak_power}, bpm={bpm}",
            range.first_bin(),
            range.end_bin()
        );

        SpectrumEstimate {
            peak_bin,
            peak_power,
            bpm,
        }
    }

    /// Returns the search band for the given capture rate.
    pub fn bin_range(&self, capture_rate_hz: f32) -> BinRange {
        BinRange::from_bpm_limits(
            self.window_size,
            capture_rate_hz,
            self.min_bpm,
            self.max_bpm,
        )
    }

    /// Power spectrum of the latest cycle (`window_size / 2` bins).
    pub fn power_spectrum(&self) -> &[f32] {
        &self.power
    }

    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    /// Copies the window mean-free into the FFT input and zero-pads the rest.
    fn fill_input(&mut self, window: &[f32]) {
        let mean = if window.is_empty() {
            0.0
        } else {
            window.iter().sum::<f32>() / window.len() as f32
        };

        let (head, tail) = self.input.split_at_mut(window.len());
        head.iter_mut()
            .zip(window)
            .for_each(|(dst, &src)| *dst = src - mean);
        tail.fill(0.0);
    }

    fn update_power_spectrum(&mut self) {
        // The input is used as scratch space by the FFT and is refilled every
        // cycle anyway.
        let res = self
            .fft
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch);

        if let Err(e) = res {
            // Only happens on buffer length mismatches. All buffers come from
            // the plan, so treat the spectrum as silent.
            log::error!("FFT failed: {e}");
            self.power.fill(0.0);
            return;
        }

        self.power
            .iter_mut()
            .zip(&self.spectrum)
            .for_each(|(power, bin)| *power = bin.norm_sqr());
    }

    /// Returns the first bin with maximal power inside the range.
    fn find_peak(&self, range: BinRange) -> (usize, f32) {
        self.power[range.first_bin()..range.end_bin()]
            .iter()
            .enumerate()
            .fold((range.first_bin(), f32::NEG_INFINITY), |best, (i, &power)| {
                if power > best.1 {
                    (range.first_bin() + i, power)
                } else {
                    best
                }
            })
    }
}

impl core::fmt::Debug for SpectralEstimator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpectralEstimator")
            .field("window_size", &self.window_size)
            .field("min_bpm", &self.min_bpm)
            .field("max_bpm", &self.max_bpm)
            .finish_non_exhaustive()
    }
}
