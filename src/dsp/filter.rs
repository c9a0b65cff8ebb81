// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! The filter family: time-domain FIR, overlap-save FFT FIR, integer
//! delay, one-pole and biquad IIR, DC blocker and AGC.
//!
//! Every filter processes blocks in place without changing their
//! length, keeps whatever history it needs across calls (so filtering
//! consecutive blocks equals filtering their concatenation), reports
//! its group delay in samples, and can produce a fresh copy with the
//! same coefficients but cleared state.

use crate::dsp::buffer::SampleRing;
use crate::dsp::coeffs::{self, BiquadCoeffs};
use crate::dsp::fft::Fft;
use crate::dsp::math;

/// Common block-filter contract.
pub trait Filter: Send {
    /// Filter `samples` in place.  The length never changes.
    fn process_in_place(&mut self, samples: &mut [f32]);

    /// Group delay in samples at DC.
    fn delay(&self) -> usize;

    /// Clear the filter state, keeping the coefficients.
    fn reset(&mut self);
}

// ---------------------------------------------------------------------------
// Time-domain FIR
// ---------------------------------------------------------------------------

/// Direct convolution with an arbitrary kernel.
///
/// Keeps the last `N - 1` input samples across calls.  The inner dot
/// product runs four accumulators wide; at the tap counts used by the
/// narrowband pipelines this is the hottest loop in the crate.
#[derive(Clone)]
pub struct FirFilter {
    kernel: Vec<f32>,
    kernel_rev: Vec<f32>,
    history: Vec<f32>,
    scratch: Vec<f32>,
}

impl FirFilter {
    pub fn new(kernel: Vec<f32>) -> Self {
        assert!(!kernel.is_empty(), "FIR kernel must have at least one tap");
        let mut kernel_rev = kernel.clone();
        kernel_rev.reverse();
        let history = vec![0.0; kernel.len() - 1];
        Self {
            kernel,
            kernel_rev,
            history,
            scratch: Vec::new(),
        }
    }

    pub fn kernel(&self) -> &[f32] {
        &self.kernel
    }

    /// Fresh filter with the same kernel and cleared history.
    pub fn fresh(&self) -> Self {
        Self::new(self.kernel.clone())
    }
}

impl Filter for FirFilter {
    fn process_in_place(&mut self, samples: &mut [f32]) {
        let taps = self.kernel_rev.len();
        let hist = taps - 1;
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.history);
        self.scratch.extend_from_slice(samples);

        for (i, out) in samples.iter_mut().enumerate() {
            let window = &self.scratch[i..i + taps];
            let mut acc = [0.0_f32; 4];
            let mut j = 0;
            while j + 4 <= taps {
                acc[0] += self.kernel_rev[j] * window[j];
                acc[1] += self.kernel_rev[j + 1] * window[j + 1];
                acc[2] += self.kernel_rev[j + 2] * window[j + 2];
                acc[3] += self.kernel_rev[j + 3] * window[j + 3];
                j += 4;
            }
            let mut sum = (acc[0] + acc[1]) + (acc[2] + acc[3]);
            while j < taps {
                sum += self.kernel_rev[j] * window[j];
                j += 1;
            }
            *out = sum;
        }

        if hist > 0 {
            let total = self.scratch.len();
            self.history.copy_from_slice(&self.scratch[total - hist..]);
        }
    }

    fn delay(&self) -> usize {
        self.kernel.len() / 2
    }

    fn reset(&mut self) {
        self.history.fill(0.0);
    }
}

// ---------------------------------------------------------------------------
// Overlap-save FFT FIR
// ---------------------------------------------------------------------------

/// Same transfer function as [`FirFilter`], computed by overlap-save.
///
/// Transform length is the next power of two of `2 N`.  Input
/// accumulates into an L-sample frame; a full frame is transformed,
/// multiplied pointwise by the precomputed kernel spectrum, inverse
/// transformed, and its last `L - (N - 1)` samples go to an output
/// ring that the caller's buffer drains from.  The frame fill shows up
/// as extra latency: the group delay is `L - (N - 1) / 2`.
pub struct FftFilter {
    fft: Fft,
    kernel: Vec<f32>,
    kernel_re: Vec<f32>,
    kernel_im: Vec<f32>,
    frame: Vec<f32>,
    filled: usize,
    out: SampleRing,
    /// Warm-up zeros still owed to the output stream.
    lead: usize,
    scratch_re: Vec<f32>,
    scratch_im: Vec<f32>,
}

impl FftFilter {
    pub fn new(kernel: Vec<f32>) -> Self {
        assert!(!kernel.is_empty(), "FFT filter kernel must have at least one tap");
        let taps = kernel.len();
        let mut fft = Fft::of_length(2 * taps);
        let len = fft.len();

        let mut kernel_re = vec![0.0; len];
        kernel_re[..taps].copy_from_slice(&kernel);
        let mut kernel_im = vec![0.0; len];
        fft.transform(&mut kernel_re, &mut kernel_im);

        let overlap = taps - 1;
        Self {
            fft,
            kernel,
            kernel_re,
            kernel_im,
            frame: vec![0.0; len],
            filled: overlap,
            out: SampleRing::new(2 * len),
            lead: len - overlap,
            scratch_re: vec![0.0; len],
            scratch_im: vec![0.0; len],
        }
    }

    pub fn fresh(&self) -> Self {
        Self::new(self.kernel.clone())
    }

    fn run_frame(&mut self) {
        let len = self.fft.len();
        let overlap = self.kernel.len() - 1;
        self.scratch_re.copy_from_slice(&self.frame);
        self.scratch_im.fill(0.0);
        self.fft.transform(&mut self.scratch_re, &mut self.scratch_im);
        // Both spectra carry the forward 1/L scale; fold one back in so
        // the inverse transform lands at unit gain.
        let scale = len as f32;
        for k in 0..len {
            let (xr, xi) = (self.scratch_re[k], self.scratch_im[k]);
            let (hr, hi) = (self.kernel_re[k], self.kernel_im[k]);
            self.scratch_re[k] = (xr * hr - xi * hi) * scale;
            self.scratch_im[k] = (xr * hi + xi * hr) * scale;
        }
        self.fft.reverse(&mut self.scratch_re, &mut self.scratch_im);
        self.out.store(&self.scratch_re[overlap..]);
        self.frame.copy_within(len - overlap.., 0);
        self.filled = overlap;
    }
}

impl Filter for FftFilter {
    fn process_in_place(&mut self, samples: &mut [f32]) {
        let len = self.fft.len();
        let total = samples.len();
        let mut in_pos = 0;
        let mut out_pos = 0;
        while in_pos < total {
            let take = (len - self.filled).min(total - in_pos);
            self.frame[self.filled..self.filled + take]
                .copy_from_slice(&samples[in_pos..in_pos + take]);
            self.filled += take;
            in_pos += take;
            if self.filled == len {
                self.run_frame();
            }
            // Fill the slots whose inputs we have consumed: warm-up
            // zeros first, then whatever the output ring holds.
            while out_pos < in_pos {
                if self.lead > 0 {
                    let zeros = self.lead.min(in_pos - out_pos);
                    samples[out_pos..out_pos + zeros].fill(0.0);
                    self.lead -= zeros;
                    out_pos += zeros;
                    continue;
                }
                let ready = (in_pos - out_pos).min(self.out.readable());
                if ready == 0 {
                    break;
                }
                self.out.move_to(&mut samples[out_pos..out_pos + ready]);
                out_pos += ready;
            }
        }
        debug_assert_eq!(out_pos, total);
    }

    fn delay(&self) -> usize {
        self.fft.len() - (self.kernel.len() - 1) / 2
    }

    fn reset(&mut self) {
        let overlap = self.kernel.len() - 1;
        self.frame.fill(0.0);
        self.filled = overlap;
        self.out.clear();
        self.lead = self.fft.len() - overlap;
    }
}

/// A FIR realized either directly or by overlap-save, chosen at
/// construction.  Long kernels go to the FFT path.
pub enum BlockFilter {
    Fir(FirFilter),
    Fft(FftFilter),
}

/// Tap count above which overlap-save beats direct convolution.
const FFT_FILTER_THRESHOLD: usize = 96;

impl BlockFilter {
    pub fn for_kernel(kernel: Vec<f32>) -> Self {
        if kernel.len() >= FFT_FILTER_THRESHOLD {
            Self::Fft(FftFilter::new(kernel))
        } else {
            Self::Fir(FirFilter::new(kernel))
        }
    }

    pub fn fresh(&self) -> Self {
        match self {
            Self::Fir(f) => Self::Fir(f.fresh()),
            Self::Fft(f) => Self::Fft(f.fresh()),
        }
    }
}

impl Filter for BlockFilter {
    fn process_in_place(&mut self, samples: &mut [f32]) {
        match self {
            Self::Fir(f) => f.process_in_place(samples),
            Self::Fft(f) => f.process_in_place(samples),
        }
    }

    fn delay(&self) -> usize {
        match self {
            Self::Fir(f) => f.delay(),
            Self::Fft(f) => f.delay(),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Fir(f) => f.reset(),
            Self::Fft(f) => f.reset(),
        }
    }
}

// ---------------------------------------------------------------------------
// Integer delay
// ---------------------------------------------------------------------------

/// Delays the signal by a whole number of samples.
#[derive(Clone)]
pub struct DelayFilter {
    line: Vec<f32>,
    pos: usize,
}

impl DelayFilter {
    pub fn new(delay: usize) -> Self {
        Self {
            line: vec![0.0; delay],
            pos: 0,
        }
    }

    pub fn fresh(&self) -> Self {
        Self::new(self.line.len())
    }
}

impl Filter for DelayFilter {
    fn process_in_place(&mut self, samples: &mut [f32]) {
        if self.line.is_empty() {
            return;
        }
        for sample in samples.iter_mut() {
            let delayed = self.line[self.pos];
            self.line[self.pos] = *sample;
            *sample = delayed;
            self.pos = (self.pos + 1) % self.line.len();
        }
    }

    fn delay(&self) -> usize {
        self.line.len()
    }

    fn reset(&mut self) {
        self.line.fill(0.0);
        self.pos = 0;
    }
}

// ---------------------------------------------------------------------------
// Biquad IIR (covers the one-pole case with b2 = a2 = 0)
// ---------------------------------------------------------------------------

/// Direct-Form-I biquad.
#[derive(Debug, Clone)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn one_pole_low_pass(sample_rate: f32, corner_hz: f32) -> Self {
        Self::new(coeffs::one_pole_low_pass(sample_rate, corner_hz))
    }

    pub fn low_pass(sample_rate: f32, corner_hz: f32, q: f32) -> Self {
        Self::new(coeffs::biquad_low_pass(sample_rate, corner_hz, q))
    }

    pub fn deemphasis(sample_rate: f32, time_constant_s: f32) -> Self {
        Self::new(coeffs::deemphasis(sample_rate, time_constant_s))
    }

    pub fn fresh(&self) -> Self {
        Self::new(self.coeffs)
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }

    /// Analytic phase response at `frequency_hz`, in radians.
    pub fn phase_shift(&self, sample_rate: f32, frequency_hz: f32) -> f32 {
        let w = 2.0 * std::f32::consts::PI * frequency_hz / sample_rate;
        let c = &self.coeffs;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());
        let num_re = c.b0 + c.b1 * c1 + c.b2 * c2;
        let num_im = -(c.b1 * s1 + c.b2 * s2);
        let den_re = 1.0 + c.a1 * c1 + c.a2 * c2;
        let den_im = -(c.a1 * s1 + c.a2 * s2);
        math::atan2(num_im, num_re) - math::atan2(den_im, den_re)
    }
}

impl Filter for Biquad {
    fn process_in_place(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    fn delay(&self) -> usize {
        0
    }

    fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

// ---------------------------------------------------------------------------
// DC blocker
// ---------------------------------------------------------------------------

/// One-pole high-pass with its corner at an 0.5 Hz equivalent time
/// constant, stripping carrier DC without touching audible bass.
#[derive(Debug, Clone)]
pub struct DcBlocker {
    r: f32,
    x1: f32,
    y1: f32,
}

impl DcBlocker {
    pub fn new(sample_rate: f32) -> Self {
        let r = (-std::f32::consts::TAU * 0.5 / sample_rate.max(1.0)).exp();
        Self { r, x1: 0.0, y1: 0.0 }
    }

    pub fn fresh(&self) -> Self {
        Self {
            r: self.r,
            x1: 0.0,
            y1: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = x - self.x1 + self.r * self.y1;
        self.x1 = x;
        self.y1 = y;
        y
    }
}

impl Filter for DcBlocker {
    fn process_in_place(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    fn delay(&self) -> usize {
        0
    }

    fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

// ---------------------------------------------------------------------------
// AGC
// ---------------------------------------------------------------------------

/// Peak-hold automatic gain control.
///
/// Tracks the signal peak with a hold window of one second of samples;
/// a sample above 90% of the tracked peak re-arms the hold, so attack
/// is immediate while release is a one-pole decay toward the current
/// level.  Gain is bounded by `max_gain`.
#[derive(Debug, Clone)]
pub struct Agc {
    max_gain: f32,
    peak: f32,
    hold: usize,
    hold_window: usize,
    release: f32,
}

impl Agc {
    pub fn new(sample_rate: f32, max_gain: f32) -> Self {
        let sr = sample_rate.max(1.0);
        Self {
            max_gain: max_gain.max(1.0),
            peak: 0.0,
            hold: 0,
            hold_window: sr as usize,
            release: 1.0 - (-1.0 / (0.5 * sr)).exp(),
        }
    }

    pub fn fresh(&self) -> Self {
        let mut copy = self.clone();
        copy.reset();
        copy
    }
}

impl Filter for Agc {
    fn process_in_place(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let level = sample.abs();
            if level > self.peak {
                self.peak = level;
                self.hold = self.hold_window;
            } else if level > 0.9 * self.peak {
                self.hold = self.hold_window;
            } else if self.hold > 0 {
                self.hold -= 1;
            } else {
                self.peak += self.release * (level - self.peak);
            }
            let gain = if self.peak > 1e-6 {
                (1.0 / self.peak).min(self.max_gain)
            } else {
                self.max_gain
            };
            *sample *= gain;
        }
    }

    fn delay(&self) -> usize {
        0
    }

    fn reset(&mut self) {
        self.peak = 0.0;
        self.hold = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::coeffs::{hilbert_kernel, low_pass_kernel};

    fn rms(samples: &[f32]) -> f64 {
        (samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / samples.len() as f64)
            .sqrt()
    }

    #[test]
    fn fir_block_split_equals_whole() {
        let kernel = low_pass_kernel(48_000.0, 8_000.0, 63);
        let input: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.21).sin()).collect();

        let mut whole = input.clone();
        let mut filter = FirFilter::new(kernel.clone());
        filter.process_in_place(&mut whole);

        let mut split = input.clone();
        let mut filter = FirFilter::new(kernel);
        let (a, b) = split.split_at_mut(333);
        filter.process_in_place(a);
        filter.process_in_place(b);

        for (x, y) in whole.iter().zip(&split) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn fir_dc_passthrough_after_settling() {
        let mut filter = FirFilter::new(low_pass_kernel(48_000.0, 4_000.0, 151));
        let mut block = vec![1.0_f32; 400];
        filter.process_in_place(&mut block);
        assert!((block[300] - 1.0).abs() < 1e-4, "dc {}", block[300]);
    }

    fn tone_gain_through(kernel: Vec<f32>, rate: f32, freq: f32) -> f64 {
        let mut filter = FirFilter::new(kernel);
        let w = std::f32::consts::TAU * freq / rate;
        let n = 8192;
        let mut block: Vec<f32> = (0..n).map(|k| (w * k as f32).sin()).collect();
        filter.process_in_place(&mut block);
        // Steady-state amplitude from the tail.
        rms(&block[n / 2..]) * std::f64::consts::SQRT_2
    }

    #[test]
    fn low_pass_corner_sits_at_half_amplitude() {
        let rate = 48_000.0;
        let corner = 6_000.0;
        let kernel = low_pass_kernel(rate, corner, 151);
        let at_corner = tone_gain_through(kernel.clone(), rate, corner);
        assert!(
            (at_corner - 0.5).abs() < 0.02,
            "corner gain {at_corner} (expected -6 dB)"
        );
        let past_corner = tone_gain_through(kernel, rate, corner * 1.2);
        assert!(past_corner < 0.01, "stopband leak {past_corner}");
    }

    #[test]
    fn fft_filter_matches_fir_modulo_delay() {
        let kernel = low_pass_kernel(48_000.0, 5_000.0, 101);
        let mut fir = FirFilter::new(kernel.clone());
        let mut fft = FftFilter::new(kernel);

        let input: Vec<f32> = (0..4096)
            .map(|i| 0.5 + (i as f32 * 0.13).sin() * 0.4 + (i as f32 * 0.71).cos() * 0.2)
            .collect();
        let mut via_fir = input.clone();
        fir.process_in_place(&mut via_fir);
        let mut via_fft = input.clone();
        // Feed in uneven chunks to exercise the frame accumulator.
        let mut via_fft_stream = Vec::new();
        for chunk in via_fft.chunks_mut(517) {
            fft.process_in_place(chunk);
            via_fft_stream.extend_from_slice(chunk);
        }

        let skew = fft.delay() - fir.delay();
        let compare = 2048;
        let mut err = Vec::with_capacity(compare);
        for n in 0..compare {
            err.push(via_fir[n] - via_fft_stream[n + skew]);
        }
        let amplitude = rms(&via_fir[..compare]);
        assert!(
            rms(&err) < 1e-3 * amplitude.max(1.0),
            "rms error {} vs amplitude {}",
            rms(&err),
            amplitude
        );
    }

    #[test]
    fn fft_filter_delay_formula() {
        let taps = 101;
        let filter = FftFilter::new(low_pass_kernel(48_000.0, 5_000.0, taps));
        let fft_len = (2 * taps).next_power_of_two();
        assert_eq!(filter.delay(), fft_len - (taps - 1) / 2);
    }

    #[test]
    fn delay_filter_shifts_by_exactly_d() {
        let mut filter = DelayFilter::new(5);
        let mut block: Vec<f32> = (1..=10).map(|v| v as f32).collect();
        filter.process_in_place(&mut block);
        assert_eq!(&block[..5], &[0.0; 5]);
        assert_eq!(&block[5..], &[1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn hilbert_filter_shifts_quadrature() {
        // A cosine through the Hilbert filter becomes a sine (a -pi/2
        // shift at positive frequencies), modulo the group delay.
        let taps = 151;
        let rate = 48_000.0_f32;
        let freq = 6_000.0_f32;
        let mut filter = FirFilter::new(hilbert_kernel(taps));
        let delay = filter.delay();

        let n = 4096;
        let w = std::f32::consts::TAU * freq / rate;
        let mut block: Vec<f32> = (0..n).map(|i| (w * i as f32).cos()).collect();
        filter.process_in_place(&mut block);

        let mut err = Vec::new();
        for i in 1000..3000 {
            let expected = (w * ((i - delay) as f32) - std::f32::consts::FRAC_PI_2).cos();
            err.push(block[i] - expected);
        }
        assert!(rms(&err) < 5e-3, "hilbert rms {}", rms(&err));
    }

    #[test]
    fn biquad_phase_shift_is_zero_at_dc() {
        let filter = Biquad::low_pass(48_000.0, 2_000.0, 0.7071);
        let phase = filter.phase_shift(48_000.0, 0.0);
        assert!(phase.abs() < 1e-5, "dc phase {phase}");
    }

    #[test]
    fn biquad_fresh_clears_state() {
        let mut filter = Biquad::low_pass(48_000.0, 2_000.0, 0.7071);
        let mut block = vec![1.0_f32; 64];
        filter.process_in_place(&mut block);
        let fresh = filter.fresh();
        assert_eq!(fresh.x1, 0.0);
        assert_eq!(fresh.y1, 0.0);
    }

    #[test]
    fn dc_blocker_removes_offset() {
        let mut filter = DcBlocker::new(48_000.0);
        let mut block = vec![0.5_f32; 96_000];
        filter.process_in_place(&mut block);
        assert!(block[95_999].abs() < 0.01, "residual {}", block[95_999]);
    }

    #[test]
    fn agc_levels_a_quiet_tone_within_bounds() {
        let mut agc = Agc::new(48_000.0, 30.0);
        let mut block: Vec<f32> = (0..48_000)
            .map(|i| 0.1 * (i as f32 * 0.13).sin())
            .collect();
        agc.process_in_place(&mut block);
        let peak = block.iter().fold(0.0_f32, |a, &b| a.max(b.abs()));
        assert!(peak <= 1.0 + 1e-3, "peak {peak}");
        assert!(peak > 0.5, "agc did not lift the tone: {peak}");
    }
}
