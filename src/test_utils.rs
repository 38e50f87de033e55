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

//! Synthetic camera signals for tests.

/// Generators for sample sequences as the capture layer would deliver them
/// (one scalar per frame).
pub mod signals {
    use core::f32::consts::PI;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Pure sine with amplitude 1.
    pub fn sine(frequency_hz: f32, capture_rate_hz: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| i as f32 / capture_rate_hz)
            .map(|t| libm::sinf(2.0 * PI * frequency_hz * t))
            .collect()
    }

    /// Amplitude of the pulse in [`ppg_like`] signals.
    pub const PPG_PULSE_AMPLITUDE: f32 = 0.01;

    /// Signal that resembles the hue of a fingertip on a camera: a large
    /// offset, the pulse, its first harmonic (dicrotic notch), and uniform
    /// noise. `relative_noise` is the noise amplitude relative to the pulse
    /// amplitude. The noise is reproducible via `seed`.
    pub fn ppg_like(
        frequency_hz: f32,
        capture_rate_hz: f32,
        len: usize,
        relative_noise: f32,
        seed: u64,
    ) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len)
            .map(|i| i as f32 / capture_rate_hz)
            .map(|t| {
                let phase = 2.0 * PI * frequency_hz * t;
                let pulse = libm::sinf(phase) + 0.3 * libm::sinf(2.0 * phase + 0.7);
                let noise = relative_noise * rng.random_range(-1.0_f32..=1.0);
                0.95 + PPG_PULSE_AMPLITUDE * (pulse + noise)
            })
            .collect()
    }

    /// Piecewise linear wave with segments of the given lengths, alternating
    /// rising and falling (starting with rising). Each segment boundary is
    /// one sign change of the first difference.
    pub fn triangle(segment_lens: &[usize]) -> Vec<f32> {
        let mut value = 0.0;
        let mut samples = Vec::with_capacity(segment_lens.iter().sum());
        for (i, &len) in segment_lens.iter().enumerate() {
            let step = if i % 2 == 0 { 1.0 } else { -1.0 };
            for _ in 0..len {
                value += step;
                samples.push(value);
            }
        }
        samples
    }
}
