// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Player sink contract: where demodulated audio leaves the library.

use std::sync::{Arc, Mutex};

/// Audio output sink.  The demodulator resamples internally to the
/// rate the player declares.
pub trait Player: Send {
    /// Output sample rate in Hz, fixed for the life of the sink.
    fn sample_rate(&self) -> u32;

    /// Play one block; `left` and `right` have equal length.
    fn play(&mut self, left: &[f32], right: &[f32]);

    /// Volume in `[0, 1]`.
    fn set_volume(&mut self, volume: f32);

    fn volume(&self) -> f32;
}

/// Player that discards audio; stands in where no output is wired up.
pub struct NullPlayer {
    sample_rate: u32,
    volume: f32,
}

impl NullPlayer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            volume: 1.0,
        }
    }
}

impl Player for NullPlayer {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play(&mut self, _left: &[f32], _right: &[f32]) {}

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        self.volume
    }
}

/// Player that appends every block to shared buffers, for tests and
/// offline decoding.
pub struct CapturePlayer {
    sample_rate: u32,
    volume: f32,
    frames: Arc<Mutex<(Vec<f32>, Vec<f32>)>>,
}

impl CapturePlayer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            volume: 1.0,
            frames: Arc::new(Mutex::new((Vec::new(), Vec::new()))),
        }
    }

    /// Shared handle to the captured left/right streams.
    pub fn frames(&self) -> Arc<Mutex<(Vec<f32>, Vec<f32>)>> {
        Arc::clone(&self.frames)
    }
}

impl Player for CapturePlayer {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play(&mut self, left: &[f32], right: &[f32]) {
        let mut frames = self.frames.lock().unwrap_or_else(|e| e.into_inner());
        frames.0.extend_from_slice(left);
        frames.1.extend_from_slice(right);
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        self.volume
    }
}
