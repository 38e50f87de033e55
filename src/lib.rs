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

//! Heart rate estimation from the color signal of a fingertip pressed onto a
//! camera lens (photoplethysmography, PPG).
//!
//! The crate is the signal processing core only. The capture layer reduces
//! each camera frame to one scalar (for example the average hue) and feeds it
//! together with the currently measured capture rate into a
//! [`PulseDetector`]. The detector smooths the samples, keeps them in a
//! sliding window, and estimates the heart rate once per second with two
//! independent methods:
//! - a spectral estimate: the strongest FFT bin within the plausible heart
//!   rate band,
//! - a temporal estimate: the amount of sign changes of the first difference
//!   (peaks and valleys) within the last few seconds.
//!
//! If both estimates agree, the detector reports a [`Reading::Locked`] value
//! with an error bound, otherwise a [`Reading::Ranged`] interval. During the
//! first seconds of a session, it reports [`Reading::Collecting`].
//!
//! ## Example
//! ```rust
//! use pulse_detector::{DetectorConfig, PulseDetector, Reading};
//!
//! let mut detector = PulseDetector::new(DetectorConfig::default()).unwrap();
//! // Called by the capture layer for every frame.
//! if let Some(reading) = detector.on_sample(0.95, 30.0) {
//!     println!("{reading}");
//! }
//! assert_eq!(detector.latest_reading(), Reading::Collecting);
//! ```
//!
//! ## Cargo features
//! - `thread` (default): [`stdlib::detector_thread`] to run the detector on
//!   a dedicated thread that is fed over a channel.

#![deny(
    clippy::all,
    clippy::nursery,
    // clippy::restriction,
    // clippy::pedantic
)]
// Reason: Too noisy for DSP code.
#![allow(
    clippy::suboptimal_flops,
    clippy::cast_precision_loss,
    clippy::redundant_pub_crate
)]
#![deny(missing_debug_implementations)]

#[cfg_attr(test, macro_use)]
#[cfg(test)]
extern crate assert2;

#[cfg_attr(test, macro_use)]
#[cfg(test)]
extern crate float_cmp;

mod config;
mod pulse_detector;
mod reconciler;

pub mod prefilter;
pub mod sample_window;
pub mod session;
pub mod smoother;
pub mod spectral;
pub mod temporal;

#[cfg(feature = "thread")]
pub mod stdlib;

#[cfg(test)]
mod test_utils;

pub use config::*;
pub use pulse_detector::*;
pub use reconciler::*;
