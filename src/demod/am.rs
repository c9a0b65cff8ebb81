// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! AM envelope detector and the AM pipeline.

use crate::demod::{mean_power, snr_indicator, AudioBlock, SchemePipeline};
use crate::dsp::buffer::BufferPool;
use crate::dsp::coeffs::low_pass_kernel;
use crate::dsp::resample::ComplexDecimator;
use crate::dsp::shift::FrequencyShifter;

/// Envelope detector with carrier-amplitude tracking.
///
/// The carrier level follows the envelope through a one-pole smoother
/// with a 0.5 s time constant; the output is `r / carrier - 1`, which
/// removes the carrier DC while the modulation passes at unit depth.
pub struct EnvelopeDetector {
    carrier: f32,
    alpha: f32,
}

impl EnvelopeDetector {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            carrier: 0.0,
            alpha: 1.0 - (-1.0 / (0.5 * sample_rate.max(1.0))).exp(),
        }
    }

    pub fn reset(&mut self) {
        self.carrier = 0.0;
    }

    pub fn process(&mut self, i: &[f32], q: &[f32], out: &mut Vec<f32>) {
        debug_assert_eq!(i.len(), q.len());
        out.reserve(i.len());
        for n in 0..i.len() {
            let r = (i[n] * i[n] + q[n] * q[n]).sqrt();
            self.carrier += self.alpha * (r - self.carrier);
            out.push(if self.carrier > 0.0 {
                r / self.carrier - 1.0
            } else {
                0.0
            });
        }
    }
}

const AM_KERNEL_TAPS: usize = 151;

/// AM scheme: shift to center, band-limit at the scheme bandwidth,
/// decimate to the audio rate, envelope-detect.
pub struct AmPipeline {
    shifter: FrequencyShifter,
    decimator: ComplexDecimator,
    detector: EnvelopeDetector,
    pool: BufferPool,
    inter_i: Vec<f32>,
    inter_q: Vec<f32>,
    audio: Vec<f32>,
}

impl AmPipeline {
    pub fn new(input_rate: u32, audio_rate: u32, bandwidth_hz: u32) -> Self {
        let factor = (input_rate / audio_rate.max(1)).max(1) as usize;
        let inter_rate = input_rate / factor as u32;
        let kernel = low_pass_kernel(
            input_rate as f32,
            (bandwidth_hz as f32 / 2.0).min(inter_rate as f32 * 0.45),
            AM_KERNEL_TAPS,
        );
        Self {
            shifter: FrequencyShifter::new(input_rate as f32, 0.0),
            decimator: ComplexDecimator::new(factor, kernel),
            detector: EnvelopeDetector::new(inter_rate as f32),
            pool: BufferPool::new(2, 0),
            inter_i: Vec::new(),
            inter_q: Vec::new(),
            audio: Vec::new(),
        }
    }
}

impl SchemePipeline for AmPipeline {
    fn demodulate(&mut self, i: &[f32], q: &[f32], frequency_offset: f64) -> AudioBlock {
        let (buf_i, buf_q) = self.pool.get_pair(i.len());
        buf_i.copy_from_slice(i);
        buf_q.copy_from_slice(q);
        self.shifter.set_frequency(-frequency_offset as f32);
        self.shifter.shift(buf_i, buf_q);
        let total = mean_power(buf_i, buf_q);

        self.inter_i.clear();
        self.inter_q.clear();
        self.decimator
            .process(buf_i, buf_q, &mut self.inter_i, &mut self.inter_q);
        let in_band = mean_power(&self.inter_i, &self.inter_q);

        self.audio.clear();
        self.detector
            .process(&self.inter_i, &self.inter_q, &mut self.audio);

        AudioBlock {
            left: self.audio.clone(),
            right: self.audio.clone(),
            stereo: false,
            snr: snr_indicator(in_band, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_of_a_steady_carrier_is_zero() {
        let mut detector = EnvelopeDetector::new(48_000.0);
        let i = vec![0.1_f32; 192_000];
        let q = vec![0.0_f32; 192_000];
        let mut out = Vec::new();
        detector.process(&i, &q, &mut out);
        // After the carrier tracker settles, a plain carrier is DC-free.
        assert!(out[191_999].abs() < 1e-3, "residual {}", out[191_999]);
    }

    #[test]
    fn envelope_recovers_modulation_depth() {
        let rate = 48_000.0_f64;
        let len = 3 * 48_000;
        let w = std::f64::consts::TAU * 600.0 / rate;
        let i: Vec<f32> = (0..len)
            .map(|n| (0.1 * (1.0 + 0.5 * (w * n as f64).sin())) as f32)
            .collect();
        let q = vec![0.0_f32; len];
        let mut detector = EnvelopeDetector::new(rate as f32);
        let mut out = Vec::new();
        detector.process(&i, &q, &mut out);

        let tail = &out[2 * 48_000..];
        let rms = (tail.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / tail.len() as f64)
            .sqrt();
        let amplitude = rms * std::f64::consts::SQRT_2;
        assert!(
            (amplitude - 0.5).abs() < 0.02,
            "recovered depth {amplitude}"
        );
    }

    #[test]
    fn zero_carrier_yields_silence() {
        let mut detector = EnvelopeDetector::new(48_000.0);
        let i = vec![0.0_f32; 128];
        let q = vec![0.0_f32; 128];
        let mut out = Vec::new();
        detector.process(&i, &q, &mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
