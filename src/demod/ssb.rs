// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! SSB product detector plus the SSB and CW pipelines.

use crate::demod::{mean_power, mean_power_real, snr_indicator, AudioBlock, SchemePipeline};
use crate::dsp::buffer::BufferPool;
use crate::dsp::coeffs::{hilbert_kernel, low_pass_kernel};
use crate::dsp::filter::{BlockFilter, DelayFilter, FftFilter, Filter, FirFilter};
use crate::dsp::resample::ComplexDecimator;
use crate::dsp::shift::FrequencyShifter;

/// Hilbert-pair sideband combiner.
///
/// Delays I by the Hilbert filter's group delay, runs Q through the
/// Hilbert filter, and outputs `(i - q_hat) / 2` for the upper sideband
/// or `(i + q_hat) / 2` for the lower; the opposite sideband cancels.
pub struct SsbDetector {
    delay: DelayFilter,
    hilbert: FirFilter,
    sign: f32,
    scratch_i: Vec<f32>,
    scratch_q: Vec<f32>,
}

impl SsbDetector {
    pub fn new(hilbert_taps: usize, upper: bool) -> Self {
        let hilbert = FirFilter::new(hilbert_kernel(hilbert_taps));
        let delay = DelayFilter::new(hilbert.delay());
        Self {
            delay,
            hilbert,
            sign: if upper { -1.0 } else { 1.0 },
            scratch_i: Vec::new(),
            scratch_q: Vec::new(),
        }
    }

    pub fn process(&mut self, i: &[f32], q: &[f32], out: &mut Vec<f32>) {
        debug_assert_eq!(i.len(), q.len());
        self.scratch_i.clear();
        self.scratch_i.extend_from_slice(i);
        self.scratch_q.clear();
        self.scratch_q.extend_from_slice(q);
        self.delay.process_in_place(&mut self.scratch_i);
        self.hilbert.process_in_place(&mut self.scratch_q);
        out.reserve(i.len());
        for n in 0..i.len() {
            out.push((self.scratch_i[n] + self.sign * self.scratch_q[n]) * 0.5);
        }
    }
}

const SSB_HILBERT_TAPS: usize = 255;
const SSB_KERNEL_TAPS: usize = 151;
/// The CW beat tone sits low in the audio band, where a short Hilbert
/// kernel loses amplitude; the beat path gets a longer one.
const CW_HILBERT_TAPS: usize = 511;

/// SSB scheme: band-limit, decimate to the audio rate, combine the
/// Hilbert pair, then low-pass the demodulated audio at the scheme
/// bandwidth.  The sideband bit selects USB or LSB.
pub struct SsbPipeline {
    shifter: FrequencyShifter,
    decimator: ComplexDecimator,
    detector: SsbDetector,
    audio_filter: BlockFilter,
    pool: BufferPool,
    inter_i: Vec<f32>,
    inter_q: Vec<f32>,
    audio: Vec<f32>,
}

impl SsbPipeline {
    pub fn new(input_rate: u32, audio_rate: u32, bandwidth_hz: u32, upper: bool) -> Self {
        let factor = (input_rate / audio_rate.max(1)).max(1) as usize;
        let inter_rate = (input_rate / factor as u32) as f32;
        let front_kernel = low_pass_kernel(
            input_rate as f32,
            (bandwidth_hz as f32).min(inter_rate * 0.45),
            SSB_KERNEL_TAPS,
        );
        let audio_kernel = low_pass_kernel(
            inter_rate,
            (bandwidth_hz as f32).min(inter_rate * 0.45),
            SSB_KERNEL_TAPS,
        );
        Self {
            shifter: FrequencyShifter::new(input_rate as f32, 0.0),
            decimator: ComplexDecimator::new(factor, front_kernel),
            detector: SsbDetector::new(SSB_HILBERT_TAPS, upper),
            audio_filter: BlockFilter::for_kernel(audio_kernel),
            pool: BufferPool::new(2, 0),
            inter_i: Vec::new(),
            inter_q: Vec::new(),
            audio: Vec::new(),
        }
    }
}

impl SchemePipeline for SsbPipeline {
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

        self.audio.clear();
        self.detector
            .process(&self.inter_i, &self.inter_q, &mut self.audio);
        self.audio_filter.process_in_place(&mut self.audio);

        // The rejected sideband only disappears in the demodulated
        // audio, so the in-band estimate is taken there.
        let in_band = mean_power_real(&self.audio);

        AudioBlock {
            left: self.audio.clone(),
            right: self.audio.clone(),
            stereo: false,
            snr: snr_indicator(in_band, total),
        }
    }
}

/// Beat frequency the CW carrier is translated to.
pub const CW_BEAT_HZ: f32 = 600.0;
const CW_FRONT_CUTOFF_HZ: f32 = 3_000.0;
const CW_NARROW_TAPS: usize = 2047;

/// CW scheme: translate the carrier to an audible beat, apply a narrow
/// band-pass around the beat via shift / low-pass / shift, and detect
/// the upper sideband.
pub struct CwPipeline {
    shifter: FrequencyShifter,
    front: ComplexDecimator,
    down: FrequencyShifter,
    narrow_i: FftFilter,
    narrow_q: FftFilter,
    up: FrequencyShifter,
    detector: SsbDetector,
    pool: BufferPool,
    inter_i: Vec<f32>,
    inter_q: Vec<f32>,
    audio: Vec<f32>,
}

impl CwPipeline {
    pub fn new(input_rate: u32, audio_rate: u32, bandwidth_hz: u32) -> Self {
        let bandwidth = bandwidth_hz.clamp(50, 1_000) as f32;
        let factor = (input_rate / audio_rate.max(1)).max(1) as usize;
        let inter_rate = (input_rate / factor as u32) as f32;
        let front_kernel = low_pass_kernel(
            input_rate as f32,
            CW_FRONT_CUTOFF_HZ.min(inter_rate * 0.45),
            SSB_KERNEL_TAPS,
        );
        let narrow_kernel = low_pass_kernel(inter_rate, bandwidth / 2.0, CW_NARROW_TAPS);
        Self {
            shifter: FrequencyShifter::new(input_rate as f32, 0.0),
            front: ComplexDecimator::new(factor, front_kernel),
            down: FrequencyShifter::new(inter_rate, -CW_BEAT_HZ),
            narrow_i: FftFilter::new(narrow_kernel.clone()),
            narrow_q: FftFilter::new(narrow_kernel),
            up: FrequencyShifter::new(inter_rate, CW_BEAT_HZ),
            detector: SsbDetector::new(CW_HILBERT_TAPS, true),
            pool: BufferPool::new(2, 0),
            inter_i: Vec::new(),
            inter_q: Vec::new(),
            audio: Vec::new(),
        }
    }
}

impl SchemePipeline for CwPipeline {
    fn demodulate(&mut self, i: &[f32], q: &[f32], frequency_offset: f64) -> AudioBlock {
        let (buf_i, buf_q) = self.pool.get_pair(i.len());
        buf_i.copy_from_slice(i);
        buf_q.copy_from_slice(q);
        // Put the tuned carrier at the beat frequency.
        self.shifter
            .set_frequency(CW_BEAT_HZ - frequency_offset as f32);
        self.shifter.shift(buf_i, buf_q);
        let total = mean_power(buf_i, buf_q);

        self.inter_i.clear();
        self.inter_q.clear();
        self.front
            .process(buf_i, buf_q, &mut self.inter_i, &mut self.inter_q);

        // Narrow band-pass centered on the beat.
        self.down.shift(&mut self.inter_i, &mut self.inter_q);
        self.narrow_i.process_in_place(&mut self.inter_i);
        self.narrow_q.process_in_place(&mut self.inter_q);
        self.up.shift(&mut self.inter_i, &mut self.inter_q);
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
