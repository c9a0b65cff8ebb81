// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Narrow-band carrier detector and reconstructor.
//!
//! Downshifts the real input by the target frequency, low-passes the
//! complex beat, normalizes it to unit magnitude, estimates the
//! residual frequency from consecutive samples, and upshifts back to
//! produce a clean unit-amplitude carrier.  Lock requires both a
//! residual-frequency estimate inside the tolerance and a plausible
//! beat-to-envelope magnitude ratio, so silence never reads as locked.

use crate::dsp::filter::Biquad;
use crate::dsp::math;
use crate::dsp::shift::FrequencyShifter;

/// Minimum filtered-beat to input-envelope ratio for a lock.
const MIN_CARRIER_RATIO: f32 = 0.01;
/// Envelope floor below which lock is never reported.
const ENVELOPE_FLOOR: f32 = 1e-6;

pub struct PilotDetector {
    sample_rate: f32,
    tolerance_hz: f32,
    down: FrequencyShifter,
    up: FrequencyShifter,
    lp_i: Biquad,
    lp_q: Biquad,
    envelope: Biquad,
    beat_level: Biquad,
    speed_alpha: f32,
    speed: f32,
    last_i: f32,
    last_q: f32,
    locked: bool,
    scratch_i: Vec<f32>,
    scratch_q: Vec<f32>,
}

impl PilotDetector {
    pub fn new(sample_rate: f32, pilot_hz: f32, tolerance_hz: f32) -> Self {
        let sr = sample_rate.max(1.0);
        let corner = (100.0 * tolerance_hz).clamp(10.0, sr * 0.45);
        let level_corner = (10.0 * tolerance_hz).clamp(1.0, sr * 0.45);
        Self {
            sample_rate: sr,
            tolerance_hz,
            down: FrequencyShifter::new(sr, -pilot_hz),
            up: FrequencyShifter::new(sr, pilot_hz),
            lp_i: Biquad::low_pass(sr, corner, 0.7071),
            lp_q: Biquad::low_pass(sr, corner, 0.7071),
            envelope: Biquad::one_pole_low_pass(sr, level_corner),
            beat_level: Biquad::one_pole_low_pass(sr, level_corner),
            speed_alpha: 1.0 - (-std::f32::consts::TAU * (2.0 * tolerance_hz).max(1.0) / sr).exp(),
            speed: 0.0,
            last_i: 1.0,
            last_q: 0.0,
            locked: false,
            scratch_i: Vec::new(),
            scratch_q: Vec::new(),
        }
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    /// Reconstruct the carrier from `input`, writing the unit-magnitude
    /// cosine and sine tracks into `out_cos` / `out_sin`.
    pub fn process(&mut self, input: &[f32], out_cos: &mut [f32], out_sin: &mut [f32]) {
        debug_assert_eq!(input.len(), out_cos.len());
        debug_assert_eq!(input.len(), out_sin.len());

        self.scratch_i.clear();
        self.scratch_i.extend_from_slice(input);
        self.scratch_q.clear();
        self.scratch_q.resize(input.len(), 0.0);
        self.down.shift(&mut self.scratch_i, &mut self.scratch_q);

        let mut envelope = 0.0;
        let mut beat = 0.0;
        for n in 0..input.len() {
            let bi = self.lp_i.process(self.scratch_i[n]);
            let bq = self.lp_q.process(self.scratch_q[n]);
            envelope = self.envelope.process(input[n].abs());
            let magnitude = (bi * bi + bq * bq).sqrt();
            beat = self.beat_level.process(magnitude);

            let (ni, nq) = if magnitude > 0.0 {
                (bi / magnitude, bq / magnitude)
            } else {
                (1.0, 0.0)
            };
            // Instantaneous residual frequency from consecutive
            // normalized samples, then a one-pole smoother.
            let cross = nq * self.last_i - ni * self.last_q;
            let dot = ni * self.last_i + nq * self.last_q;
            let instantaneous = math::atan2(cross, dot);
            self.speed += self.speed_alpha * (instantaneous - self.speed);
            self.last_i = ni;
            self.last_q = nq;

            self.scratch_i[n] = ni;
            self.scratch_q[n] = nq;
        }

        self.up.shift(&mut self.scratch_i, &mut self.scratch_q);
        out_cos.copy_from_slice(&self.scratch_i);
        out_sin.copy_from_slice(&self.scratch_q);

        let speed_ok =
            self.speed.abs() <= self.tolerance_hz * std::f32::consts::TAU / self.sample_rate;
        let carrier_ok =
            envelope > ENVELOPE_FLOOR && beat / envelope.max(ENVELOPE_FLOOR) > MIN_CARRIER_RATIO;
        self.locked = speed_ok && carrier_ok;
    }
}
