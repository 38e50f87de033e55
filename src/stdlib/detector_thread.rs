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

//! Module for running a [`PulseDetector`] on its own thread.
//!
//! The capture layer delivers frames from its own callback context. All
//! detector updates are serialized onto one worker thread that owns the
//! detector; frames reach it over a channel.

use crate::{ConfigError, DetectorConfig, PulseDetector, Reading};
use core::time::Duration;
use std::sync::mpsc::{self, Receiver, SendError, Sender};
use std::thread::JoinHandle;
use thiserror::Error;

/// Name of the spawned worker thread.
pub const THREAD_NAME: &str = "pulse-detector";

/// Errors of [`start_detector_thread`].
#[derive(Debug, Error)]
pub enum StartDetectorThreadError {
    /// The configuration was rejected by [`PulseDetector::new`].
    #[error("invalid detector configuration")]
    Config(#[from] ConfigError),
    /// The operating system refused to spawn the thread.
    #[error("failed to spawn the detector thread")]
    Spawn(#[from] std::io::Error),
}

/// Errors when talking to a running [`DetectorThread`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectorThreadError {
    /// The worker is gone and doesn't accept input anymore.
    #[error("the detector thread has terminated")]
    Disconnected,
    /// The worker panicked, most likely in the user callback.
    #[error("the detector thread panicked")]
    Panicked,
}

impl<T> From<SendError<T>> for DetectorThreadError {
    fn from(_: SendError<T>) -> Self {
        Self::Disconnected
    }
}

/// Input for the worker thread.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DetectorInput {
    /// Frame value with its capture timestamp. See [`PulseDetector::on_frame`].
    Frame { value: f32, timestamp: Duration },
    /// Frame value with the measured capture rate. See
    /// [`PulseDetector::on_sample`].
    Sample { value: f32, capture_rate_hz: f32 },
    /// See [`PulseDetector::restart_session`].
    RestartSession,
}

/// Handle to the worker thread started by [`start_detector_thread`].
///
/// The worker runs until all senders are dropped, i.e., until this handle
/// and every [`Sender`] obtained via [`DetectorThread::sender`] are gone.
#[derive(Debug)]
pub struct DetectorThread {
    sender: Sender<DetectorInput>,
    handle: JoinHandle<Reading>,
}

impl DetectorThread {
    /// Returns an additional sender, e.g., to move into the camera callback.
    pub fn sender(&self) -> Sender<DetectorInput> {
        self.sender.clone()
    }

    /// Passes one input to the worker.
    pub fn send(&self, input: DetectorInput) -> Result<(), DetectorThreadError> {
        self.sender.send(input)?;
        Ok(())
    }

    /// Closes this handle's sender and waits until the worker consumed all
    /// pending input. Returns the latest reading of the detector.
    ///
    /// Blocks as long as other senders are alive.
    pub fn join(self) -> Result<Reading, DetectorThreadError> {
        drop(self.sender);
        self.handle.join().map_err(|_| DetectorThreadError::Panicked)
    }
}

/// Starts a thread that owns a [`PulseDetector`] built from the given
/// configuration. Every completed estimation cycle invokes `on_reading_cb`
/// with the new [`Reading`] on that thread.
pub fn start_detector_thread(
    config: DetectorConfig,
    on_reading_cb: impl FnMut(Reading) + Send + 'static,
) -> Result<DetectorThread, StartDetectorThreadError> {
    // Fail early and on the caller's thread.
    let detector = PulseDetector::new(config)?;
    let (sender, receiver) = mpsc::channel();

    let handle = std::thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || run_detector(detector, receiver, on_reading_cb))?;

    log::debug!("Started thread '{THREAD_NAME}'");

    Ok(DetectorThread { sender, handle })
}

/// Main loop of the worker thread.
fn run_detector(
    mut detector: PulseDetector,
    receiver: Receiver<DetectorInput>,
    mut on_reading_cb: impl FnMut(Reading),
) -> Reading {
    for input in receiver {
        let reading = match input {
            DetectorInput::Frame { value, timestamp } => detector.on_frame(value, timestamp),
            DetectorInput::Sample {
                value,
                capture_rate_hz,
            } => detector.on_sample(value, capture_rate_hz),
            DetectorInput::RestartSession => {
                detector.restart_session();
                None
            }
        };

        if let Some(reading) = reading {
            on_reading_cb(reading);
        }
    }

    log::debug!(
        "All senders dropped; stopping thread '{THREAD_NAME}' after {} frames",
        detector.session().consumed_frames()
    );
    detector.latest_reading()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::Confidence;
    use crate::test_utils::signals;

    #[test]
    fn invalid_config_is_reported_on_start() {
        let config = DetectorConfig::with_window_size(100);
        let res = start_detector_thread(config, |_| {});
        check!(let Err(StartDetectorThreadError::Config(ConfigError::WindowSizeNotPowerOfTwo(100))) = res);
    }

    #[test]
    fn readings_are_delivered_to_callback() {
        let (reading_sender, reading_receiver) = mpsc::channel();
        let thread = start_detector_thread(DetectorConfig::default(), move |reading| {
            let _ = reading_sender.send(reading);
        })
        .unwrap();

        // 20 s of a 75 bpm pulse at 32 Hz, delivered from another thread
        let sender = thread.sender();
        std::thread::spawn(move || {
            for (i, value) in signals::sine(1.25, 32.0, 20 * 32).into_iter().enumerate() {
                let timestamp = Duration::from_secs_f64(i as f64 / 32.0);
                sender.send(DetectorInput::Frame { value, timestamp }).unwrap();
            }
        })
        .join()
        .unwrap();

        let final_reading = thread.join().unwrap();
        let readings = reading_receiver.iter().collect::<Vec<_>>();

        check!(readings.len() == 20);
        check!(readings[0] == Reading::Collecting);
        check!(readings.last() == Some(&final_reading));
        check!(final_reading.confidence() == Confidence::Locked, "{final_reading}");
    }

    #[test]
    fn restart_is_forwarded() {
        let config = DetectorConfig {
            min_collection: Duration::from_secs(1),
            ..Default::default()
        };
        let thread = start_detector_thread(config, |_| {}).unwrap();
        for value in signals::sine(1.0, 32.0, 3 * 32) {
            thread
                .send(DetectorInput::Sample {
                    value,
                    capture_rate_hz: 32.0,
                })
                .unwrap();
        }
        thread.send(DetectorInput::RestartSession).unwrap();

        check!(thread.join() == Ok(Reading::Collecting));
    }
}
