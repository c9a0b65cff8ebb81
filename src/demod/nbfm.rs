// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Narrowband FM.

use crate::demod::fm::FmDetector;
use crate::demod::{mean_power, snr_indicator, AudioBlock, SchemePipeline};
use crate::dsp::buffer::BufferPool;
use crate::dsp::coeffs::low_pass_kernel;
use crate::dsp::filter::{DcBlocker, Filter};
use crate::dsp::resample::ComplexDecimator;
use crate::dsp::shift::FrequencyShifter;

const NBFM_KERNEL_TAPS: usize = 151;

/// Narrowband FM: the channel bandwidth is twice the maximum
/// deviation, so the band-limit sits at `max_deviation` and the
/// discriminator is normalized to it.
pub struct NbfmPipeline {
    shifter: FrequencyShifter,
    decimator: ComplexDecimator,
    fm: FmDetector,
    dc: DcBlocker,
    pool: BufferPool,
    inter_i: Vec<f32>,
    inter_q: Vec<f32>,
    audio: Vec<f32>,
}

impl NbfmPipeline {
    pub fn new(input_rate: u32, audio_rate: u32, max_deviation_hz: u32) -> Self {
        let factor = (input_rate / audio_rate.max(1)).max(1) as usize;
        let inter_rate = input_rate / factor as u32;
        let kernel = low_pass_kernel(
            input_rate as f32,
            (max_deviation_hz as f32).min(inter_rate as f32 * 0.45),
            NBFM_KERNEL_TAPS,
        );
        Self {
            shifter: FrequencyShifter::new(input_rate as f32, 0.0),
            decimator: ComplexDecimator::new(factor, kernel),
            fm: FmDetector::new(inter_rate as f32, max_deviation_hz as f32),
            dc: DcBlocker::new(inter_rate as f32),
            pool: BufferPool::new(2, 0),
            inter_i: Vec::new(),
            inter_q: Vec::new(),
            audio: Vec::new(),
        }
    }
}

impl SchemePipeline for NbfmPipeline {
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
        self.fm.process(&self.inter_i, &self.inter_q, &mut self.audio);
        self.dc.process_in_place(&mut self.audio);

        AudioBlock {
            left: self.audio.clone(),
            right: self.audio.clone(),
            stereo: false,
            snr: snr_indicator(in_band, total),
        }
    }
}
