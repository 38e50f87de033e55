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

//! Combines both estimators into a single [`Reading`].
//!
//! There is no ground truth at runtime. The only confidence signal is
//! whether the spectral and the temporal estimate agree:
//! - `Collecting`: not enough data yet, no number is shown.
//! - `Locked`: both estimates agree, their average is shown.
//! - `Ranged`: both estimates disagree, both are shown as interval.

use crate::spectral::{SpectralEstimator, SpectrumEstimate};
use crate::temporal::{TemporalEstimate, TemporalEstimator};
use core::fmt::{Display, Formatter};
use core::ops::RangeInclusive;
use core::time::Duration;

/// Confidence tag of a [`Reading`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Confidence {
    /// See [`Reading::Collecting`].
    Collecting,
    /// See [`Reading::Locked`].
    Locked,
    /// See [`Reading::Ranged`].
    Ranged,
}

/// The reconciled heart rate, the only value exposed to the UI.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Reading {
    /// Not enough data collected yet.
    #[default]
    Collecting,
    /// Spectral and temporal estimate agree.
    Locked {
        /// Average of both estimates.
        bpm: u16,
        /// Difference of both estimates, shown as `± error_bound_bpm`.
        error_bound_bpm: u16,
    },
    /// Spectral and temporal estimate disagree.
    Ranged { low_bpm: u16, high_bpm: u16 },
}

impl Reading {
    pub const fn confidence(&self) -> Confidence {
        match self {
            Self::Collecting => Confidence::Collecting,
            Self::Locked { .. } => Confidence::Locked,
            Self::Ranged { .. } => Confidence::Ranged,
        }
    }

    /// Returns the heart rate of a locked reading.
    pub const fn bpm(&self) -> Option<u16> {
        match self {
            Self::Locked { bpm, .. } => Some(*bpm),
            _ => None,
        }
    }

    /// Returns the interval the heart rate is in. For locked readings, this
    /// is `bpm ± error_bound_bpm`.
    pub fn bpm_range(&self) -> Option<RangeInclusive<u16>> {
        match *self {
            Self::Collecting => None,
            Self::Locked {
                bpm,
                error_bound_bpm,
            } => Some(bpm.saturating_sub(error_bound_bpm)..=bpm.saturating_add(error_bound_bpm)),
            Self::Ranged { low_bpm, high_bpm } => Some(low_bpm..=high_bpm),
        }
    }
}

impl Display for Reading {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Collecting => write!(f, "collecting..."),
            Self::Locked {
                bpm,
                error_bound_bpm,
            } => write!(f, "{bpm} ± {error_bound_bpm} bpm"),
            Self::Ranged { low_bpm, high_bpm } => write!(f, "{low_bpm}-{high_bpm} bpm"),
        }
    }
}

/// Rounds a bpm value for display. Negative and `NaN` values become 0, huge
/// values saturate.
#[inline]
fn round_bpm(bpm: f32) -> u16 {
    libm::roundf(bpm) as u16
}

/// Decides between [`Reading::Locked`] and [`Reading::Ranged`].
pub fn reconcile_estimates(spectral_bpm: f32, temporal_bpm: f32, agreement_threshold_bpm: f32) -> Reading {
    let delta_bpm = libm::fabsf(temporal_bpm - spectral_bpm);
    if delta_bpm <= agreement_threshold_bpm {
        Reading::Locked {
            bpm: round_bpm((spectral_bpm + temporal_bpm) / 2.0),
            error_bound_bpm: round_bpm(delta_bpm),
        }
    } else {
        Reading::Ranged {
            low_bpm: round_bpm(spectral_bpm.min(temporal_bpm)),
            high_bpm: round_bpm(spectral_bpm.max(temporal_bpm)),
        }
    }
}

/// Runs both estimators on the window once enough data was collected and
/// reconciles their results.
#[derive(Debug)]
pub struct Reconciler {
    spectral: SpectralEstimator,
    temporal: TemporalEstimator,
    min_collection: Duration,
    agreement_threshold_bpm: f32,
    latest_spectrum: Option<SpectrumEstimate>,
    latest_temporal: Option<TemporalEstimate>,
}

impl Reconciler {
    pub fn new(
        spectral: SpectralEstimator,
        temporal: TemporalEstimator,
        min_collection: Duration,
        agreement_threshold_bpm: f32,
    ) -> Self {
        Self {
            spectral,
            temporal,
            min_collection,
            agreement_threshold_bpm,
            latest_spectrum: None,
            latest_temporal: None,
        }
    }

    /// Whether a session of the given age is still collecting data.
    pub fn is_collecting(&self, elapsed: Duration) -> bool {
        elapsed <= self.min_collection
    }

    /// Performs one estimation cycle on the window (oldest to newest).
    ///
    /// While the session is collecting, the estimators are not invoked.
    pub fn evaluate(&mut self, window: &[f32], capture_rate_hz: f32, elapsed: Duration) -> Reading {
        if self.is_collecting(elapsed) {
            return Reading::Collecting;
        }

        let spectrum = self.spectral.estimate(window, capture_rate_hz);
        let temporal = self.temporal.estimate(window, capture_rate_hz);
        self.latest_spectrum.replace(spectrum);
        self.latest_temporal.replace(temporal);

        reconcile_estimates(spectrum.bpm, temporal.bpm, self.agreement_threshold_bpm)
    }

    /// Spectral estimate of the latest cycle that ran the estimators.
    pub const fn latest_spectrum(&self) -> Option<SpectrumEstimate> {
        self.latest_spectrum
    }

    /// Temporal estimate of the latest cycle that ran the estimators.
    pub const fn latest_temporal(&self) -> Option<TemporalEstimate> {
        self.latest_temporal
    }

    /// Power spectrum of the latest cycle, e.g., for a debug view.
    pub fn power_spectrum(&self) -> &[f32] {
        self.spectral.power_spectrum()
    }

    /// Forgets the estimates of previous cycles.
    pub fn reset(&mut self) {
        self.latest_spectrum = None;
        self.latest_temporal = None;
    }
}
