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

//! Module for [`SampleWindow`].

use ringbuffer::{AllocRingBuffer, RingBuffer};

/// Sliding window over the most recent smoothed samples.
///
/// Until `capacity` samples were pushed, the window holds every sample seen
/// so far. Afterwards, each push evicts the oldest sample. The estimators
/// accept partial windows and zero-pad them.
#[derive(Debug)]
pub struct SampleWindow {
    buffer: AllocRingBuffer<f32>,
    total_pushed_samples: usize,
}

impl SampleWindow {
    /// Creates an empty window. The capacity is expected to be validated
    /// already, see [`crate::DetectorConfig::validate`].
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        Self {
            buffer: AllocRingBuffer::new(capacity),
            total_pushed_samples: 0,
        }
    }

    /// Appends the newest sample. Evicts the oldest one if the window is
    /// full.
    #[inline]
    pub fn push(&mut self, value: f32) {
        debug_assert!(value.is_finite());
        self.buffer.push(value);
        self.total_pushed_samples += 1;
    }

    /// Returns the content from oldest to newest.
    #[must_use]
    pub fn as_ordered(&self) -> Vec<f32> {
        self.buffer.iter().copied().collect()
    }

    /// Iterates the content from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &f32> + '_ {
        self.buffer.iter()
    }

    /// Whether the window holds `capacity` samples.
    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Total amount of samples pushed since creation or the last
    /// [`Self::clear`], including evicted ones.
    pub const fn total_pushed_samples(&self) -> usize {
        self.total_pushed_samples
    }

    /// Returns the amount of evicted samples, i.e., samples that are not in
    /// the underlying ringbuffer anymore.
    pub fn evicted_samples(&self) -> usize {
        self.total_pushed_samples.saturating_sub(self.buffer.len())
    }

    /// Drops all samples.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.total_pushed_samples = 0;
    }
}
