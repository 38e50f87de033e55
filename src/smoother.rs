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

//! Module for [`Smoother`].

use ringbuffer::{ConstGenericRingBuffer, RingBuffer};

/// Amount of raw samples the rolling average is computed over.
pub const SMOOTHING_LEN: usize = 5;

/// Rolling average over the last [`SMOOTHING_LEN`] raw samples. Reduces the
/// shot noise of the camera before the samples enter the analysis window.
#[derive(Debug, Default)]
pub struct Smoother {
    history: ConstGenericRingBuffer<f32, SMOOTHING_LEN>,
}

impl Smoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes the raw value (evicting the oldest one if the history is full)
    /// and returns the arithmetic mean of the current history.
    #[inline]
    pub fn smooth(&mut self, raw: f32) -> f32 {
        self.history.push(raw);
        let sum = self.history.iter().sum::<f32>();
        sum / self.history.len() as f32
    }

    /// Forgets all previous samples.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Amount of samples currently in the history.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_over_partial_history() {
        let mut smoother = Smoother::new();
        check!(smoother.is_empty());
        check!(smoother.smooth(2.0) == 2.0);
        check!(smoother.smooth(4.0) == 3.0);
        check!(smoother.smooth(6.0) == 4.0);
        check!(smoother.len() == 3);
    }

    #[test]
    fn oldest_sample_is_evicted() {
        let mut smoother = Smoother::new();
        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            smoother.smooth(value);
        }
        check!(smoother.len() == SMOOTHING_LEN);

        // 1.0 is gone: (2 + 3 + 4 + 5 + 11) / 5
        check!(smoother.smooth(11.0) == 5.0);
        check!(smoother.len() == SMOOTHING_LEN);
    }

    #[test]
    fn constant_input_stays_constant() {
        let mut smoother = Smoother::new();
        for _ in 0..20 {
            check!(approx_eq!(f32, smoother.smooth(0.42), 0.42, ulps = 4));
        }
    }

    #[test]
    fn reset_forgets_history() {
        let mut smoother = Smoother::new();
        smoother.smooth(100.0);
        smoother.reset();
        check!(smoother.is_empty());
        check!(smoother.smooth(1.0) == 1.0);
    }
}
