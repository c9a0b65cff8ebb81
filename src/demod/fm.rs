// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! FM quadrature discriminator.

use crate::dsp::math;

/// Instantaneous frequency via `arg(s[n] * conj(s[n-1]))`, normalized
/// so full output scale corresponds to `max_deviation_hz`.
pub struct FmDetector {
    last_re: f32,
    last_im: f32,
    gain: f64,
}

impl FmDetector {
    pub fn new(sample_rate: f32, max_deviation_hz: f32) -> Self {
        Self {
            last_re: 0.0,
            last_im: 0.0,
            gain: sample_rate as f64 / (std::f64::consts::TAU * max_deviation_hz as f64),
        }
    }

    pub fn reset(&mut self) {
        self.last_re = 0.0;
        self.last_im = 0.0;
    }

    pub fn process(&mut self, i: &[f32], q: &[f32], out: &mut Vec<f32>) {
        debug_assert_eq!(i.len(), q.len());
        out.reserve(i.len());
        let (mut lr, mut li) = (self.last_re, self.last_im);
        for n in 0..i.len() {
            let (re, im) = (i[n], q[n]);
            // s * conj(prev)
            let pr = (re * lr + im * li) as f64;
            let pi = (im * lr - re * li) as f64;
            out.push((math::atan2_wide(pi, pr) * self.gain) as f32);
            lr = re;
            li = im;
        }
        self.last_re = lr;
        self.last_im = li;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complex_tone(rate: f64, freq: f64, len: usize) -> (Vec<f32>, Vec<f32>) {
        let w = std::f64::consts::TAU * freq / rate;
        let i = (0..len).map(|n| (w * n as f64).cos() as f32).collect();
        let q = (0..len).map(|n| (w * n as f64).sin() as f32).collect();
        (i, q)
    }

    #[test]
    fn discriminator_is_linear_over_the_deviation_range() {
        let rate = 48_000.0;
        let max_dev = 4_800.0;
        // Sweep -max_dev..=max_dev in 5% steps; the settled DC level
        // must equal freq / max_dev.
        for step in -20..=20 {
            let freq = max_dev * step as f64 / 20.0;
            let (i, q) = complex_tone(rate, freq, 2048);
            let mut detector = FmDetector::new(rate as f32, max_dev as f32);
            let mut out = Vec::new();
            detector.process(&i, &q, &mut out);
            let expected = freq / max_dev;
            let tail = &out[1024..];
            let rms = (tail
                .iter()
                .map(|&s| (s as f64 - expected).powi(2))
                .sum::<f64>()
                / tail.len() as f64)
                .sqrt();
            assert!(rms < 1e-6, "step {step}: rms {rms}");
        }
    }

    #[test]
    fn constant_phase_yields_zero() {
        let mut detector = FmDetector::new(48_000.0, 5_000.0);
        let i = vec![0.7_f32; 64];
        let q = vec![0.1_f32; 64];
        let mut out = Vec::new();
        detector.process(&i, &q, &mut out);
        // First sample pairs with the zero history.
        for &sample in &out[1..] {
            assert!(sample.abs() < 1e-6);
        }
    }

    #[test]
    fn history_spans_blocks() {
        let rate = 48_000.0;
        let (i, q) = complex_tone(rate, 1_000.0, 512);
        let mut whole = Vec::new();
        let mut detector = FmDetector::new(rate as f32, 5_000.0);
        detector.process(&i, &q, &mut whole);

        let mut split = Vec::new();
        let mut detector = FmDetector::new(rate as f32, 5_000.0);
        detector.process(&i[..200], &q[..200], &mut split);
        detector.process(&i[200..], &q[200..], &mut split);

        for (a, b) in whole.iter().zip(&split) {
            assert!((a - b).abs() < 1e-7);
        }
    }
}
