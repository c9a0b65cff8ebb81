// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Wideband broadcast FM with optional pilot-locked stereo.

use crate::demod::fm::FmDetector;
use crate::demod::stereo::StereoSeparator;
use crate::demod::{mean_power, snr_indicator, AudioBlock, SchemePipeline};
use crate::dsp::buffer::BufferPool;
use crate::dsp::coeffs::low_pass_kernel;
use crate::dsp::filter::{Biquad, Filter};
use crate::dsp::resample::{ComplexDecimator, RealDecimator};
use crate::dsp::shift::FrequencyShifter;

/// Broadcast FM channel width; not user-adjustable.
pub const WBFM_BANDWIDTH_HZ: u32 = 150_000;
/// Default de-emphasis time constant (75 for the US and Korea).
pub const DEFAULT_DEEMPHASIS_US: u32 = 50;

const MAX_DEVIATION_HZ: f32 = 75_000.0;
const PILOT_HZ: f32 = 19_000.0;
const INTER_RATE_TARGET: u32 = 336_000;
const AUDIO_CUTOFF_HZ: f32 = 15_000.0;
const STAGE1_TAPS: usize = 151;
const AUDIO_TAPS: usize = 255;

/// Two-stage WBFM pipeline: decimate to an intermediate rate wide
/// enough for the whole multiplex, discriminate, then split the
/// multiplex into sum and difference audio.
pub struct WbfmPipeline {
    stereo_enabled: bool,
    shifter: FrequencyShifter,
    stage1: ComplexDecimator,
    fm: FmDetector,
    separator: StereoSeparator,
    sum_decimator: RealDecimator,
    diff_decimator: RealDecimator,
    deemph_left: Biquad,
    deemph_right: Biquad,
    pool: BufferPool,
    inter_i: Vec<f32>,
    inter_q: Vec<f32>,
    multiplex: Vec<f32>,
    diff_raw: Vec<f32>,
    sum_audio: Vec<f32>,
    diff_audio: Vec<f32>,
}

impl WbfmPipeline {
    pub fn new(input_rate: u32, audio_rate: u32, stereo: bool, deemphasis_us: u32) -> Self {
        let factor1 = ((input_rate + INTER_RATE_TARGET / 2) / INTER_RATE_TARGET).max(1) as usize;
        let inter_rate = input_rate / factor1 as u32;
        let stage1_kernel = low_pass_kernel(
            input_rate as f32,
            (WBFM_BANDWIDTH_HZ as f32 / 2.0).min(inter_rate as f32 * 0.45),
            STAGE1_TAPS,
        );

        let audio_factor = (inter_rate / audio_rate.max(1)).max(1) as usize;
        let audio_kernel = low_pass_kernel(
            inter_rate as f32,
            AUDIO_CUTOFF_HZ.min(audio_rate as f32 * 0.45),
            AUDIO_TAPS,
        );

        let tau = deemphasis_us.max(1) as f32 * 1e-6;
        Self {
            stereo_enabled: stereo,
            shifter: FrequencyShifter::new(input_rate as f32, 0.0),
            stage1: ComplexDecimator::new(factor1, stage1_kernel),
            fm: FmDetector::new(inter_rate as f32, MAX_DEVIATION_HZ),
            separator: StereoSeparator::new(inter_rate as f32, PILOT_HZ),
            sum_decimator: RealDecimator::new(audio_factor, audio_kernel.clone()),
            diff_decimator: RealDecimator::new(audio_factor, audio_kernel),
            deemph_left: Biquad::deemphasis(audio_rate as f32, tau),
            deemph_right: Biquad::deemphasis(audio_rate as f32, tau),
            pool: BufferPool::new(2, 0),
            inter_i: Vec::new(),
            inter_q: Vec::new(),
            multiplex: Vec::new(),
            diff_raw: Vec::new(),
            sum_audio: Vec::new(),
            diff_audio: Vec::new(),
        }
    }

    pub fn stereo_enabled(&self) -> bool {
        self.stereo_enabled
    }
}

impl SchemePipeline for WbfmPipeline {
    fn demodulate(&mut self, i: &[f32], q: &[f32], frequency_offset: f64) -> AudioBlock {
        let (buf_i, buf_q) = self.pool.get_pair(i.len());
        buf_i.copy_from_slice(i);
        buf_q.copy_from_slice(q);
        self.shifter.set_frequency(-frequency_offset as f32);
        self.shifter.shift(buf_i, buf_q);
        let total = mean_power(buf_i, buf_q);

        self.inter_i.clear();
        self.inter_q.clear();
        self.stage1
            .process(buf_i, buf_q, &mut self.inter_i, &mut self.inter_q);
        let in_band = mean_power(&self.inter_i, &self.inter_q);

        self.multiplex.clear();
        self.fm
            .process(&self.inter_i, &self.inter_q, &mut self.multiplex);

        self.sum_audio.clear();
        self.sum_decimator.process(&self.multiplex, &mut self.sum_audio);

        let mut found = false;
        if self.stereo_enabled {
            self.diff_raw.clear();
            found = self.separator.separate(&self.multiplex, &mut self.diff_raw);
            self.diff_audio.clear();
            self.diff_decimator.process(&self.diff_raw, &mut self.diff_audio);
        }

        let (mut left, mut right) = if found {
            let left: Vec<f32> = self
                .sum_audio
                .iter()
                .zip(&self.diff_audio)
                .map(|(&m, &d)| m + d)
                .collect();
            let right: Vec<f32> = self
                .sum_audio
                .iter()
                .zip(&self.diff_audio)
                .map(|(&m, &d)| m - d)
                .collect();
            (left, right)
        } else {
            (self.sum_audio.clone(), self.sum_audio.clone())
        };
        self.deemph_left.process_in_place(&mut left);
        self.deemph_right.process_in_place(&mut right);

        AudioBlock {
            left,
            right,
            stereo: found,
            snr: snr_indicator(in_band, total),
        }
    }
}
