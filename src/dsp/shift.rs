// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Complex frequency shifter.
//!
//! Multiplies the I/Q signal by `e^{j 2 pi f t / R}` using phasor
//! recursion, two multiplies per sample with no per-sample trig.  The
//! phasor is renormalized every 1024 samples to bound amplitude drift
//! over long runs.

const RENORM_INTERVAL: u32 = 1024;

#[derive(Debug, Clone)]
pub struct FrequencyShifter {
    sample_rate: f32,
    frequency: f32,
    phasor_re: f32,
    phasor_im: f32,
    step_re: f32,
    step_im: f32,
    counter: u32,
}

impl FrequencyShifter {
    pub fn new(sample_rate: f32, frequency_hz: f32) -> Self {
        let mut shifter = Self {
            sample_rate: sample_rate.max(1.0),
            frequency: 0.0,
            phasor_re: 1.0,
            phasor_im: 0.0,
            step_re: 1.0,
            step_im: 0.0,
            counter: 0,
        };
        shifter.set_frequency(frequency_hz);
        shifter
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Change the shift frequency; the phasor keeps its phase so the
    /// output stays continuous.
    pub fn set_frequency(&mut self, frequency_hz: f32) {
        self.frequency = frequency_hz;
        let step = std::f32::consts::TAU * frequency_hz / self.sample_rate;
        self.step_re = step.cos();
        self.step_im = step.sin();
    }

    pub fn reset(&mut self) {
        self.phasor_re = 1.0;
        self.phasor_im = 0.0;
        self.counter = 0;
    }

    /// Shift the I/Q block in place.
    pub fn shift(&mut self, i: &mut [f32], q: &mut [f32]) {
        debug_assert_eq!(i.len(), q.len());
        let (mut pr, mut pi) = (self.phasor_re, self.phasor_im);
        for (si, sq) in i.iter_mut().zip(q.iter_mut()) {
            let (xr, xi) = (*si, *sq);
            *si = xr * pr - xi * pi;
            *sq = xr * pi + xi * pr;
            let next_re = pr * self.step_re - pi * self.step_im;
            let next_im = pr * self.step_im + pi * self.step_re;
            pr = next_re;
            pi = next_im;
            self.counter += 1;
            if self.counter >= RENORM_INTERVAL {
                self.counter = 0;
                let inv = 1.0 / (pr * pr + pi * pi).sqrt();
                pr *= inv;
                pi *= inv;
            }
        }
        self.phasor_re = pr;
        self.phasor_im = pi;
    }
}
