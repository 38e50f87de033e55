//! Feeds a synthetic fingertip signal with camera-like timing jitter into the
//! detector thread and prints every reading.
//!
//! Run with `$ cargo run --example synthetic-pulse [bpm]`.

use log::LevelFilter;
use pulse_detector::stdlib::detector_thread::{start_detector_thread, DetectorInput};
use pulse_detector::DetectorConfig;
use rand::Rng;
use std::f32::consts::PI;
use std::time::Duration;

/// Simulated session length.
const DURATION: Duration = Duration::from_secs(40);
const NOMINAL_CAPTURE_RATE_HZ: f32 = 30.0;

fn init_logger() {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Debug)
        .with_colors(true)
        .with_utc_timestamps()
        .init()
        .unwrap();
}

fn main() {
    init_logger();

    let bpm = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<f32>().expect("should be a number"))
        .unwrap_or(72.0);
    log::info!("Simulating a pulse of {bpm} bpm for {DURATION:?}");

    let handle = start_detector_thread(DetectorConfig::default(), |reading| {
        println!("reading: {reading}");
    })
    .unwrap();

    let mut rng = rand::rng();
    let frequency_hz = bpm / 60.0;
    let nominal_frame_time = 1.0 / NOMINAL_CAPTURE_RATE_HZ;
    let mut t = 0.0_f32;
    while t < DURATION.as_secs_f32() {
        let phase = 2.0 * PI * frequency_hz * t;
        let pulse = phase.sin() + 0.3 * (2.0 * phase + 0.7).sin();
        let noise = rng.random_range(-0.3..=0.3);
        let value = 0.95 + 0.01 * (pulse + noise);

        handle
            .send(DetectorInput::Frame {
                value,
                timestamp: Duration::from_secs_f32(t),
            })
            .unwrap();

        // Cameras don't deliver frames at a perfectly constant rate.
        t += nominal_frame_time * rng.random_range(0.9..=1.1);
    }

    let reading = handle.join().unwrap();
    log::info!("Final reading: {reading}");
}
