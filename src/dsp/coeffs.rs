// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Filter kernel and IIR coefficient formulas.

use std::f32::consts::PI;

#[inline]
fn hamming(i: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }
    0.54 - 0.46 * (2.0 * PI * i as f32 / (len - 1) as f32).cos()
}

/// Hamming-windowed sinc low-pass kernel with corner `corner_hz`,
/// normalized to unit DC gain and scaled by `gain`.  Odd lengths keep
/// the group delay at exactly `len / 2` samples.
pub fn low_pass_kernel_with_gain(
    sample_rate: f32,
    corner_hz: f32,
    len: usize,
    gain: f32,
) -> Vec<f32> {
    assert!(len >= 1, "kernel must have at least one tap");
    assert!(sample_rate > 0.0, "sample rate must be positive");
    let cutoff = (corner_hz / sample_rate).clamp(0.0, 0.5);
    let mid = (len / 2) as isize;
    let mut kernel = Vec::with_capacity(len);
    for i in 0..len {
        let x = i as isize - mid;
        let sinc = if x == 0 {
            2.0 * cutoff
        } else {
            (2.0 * PI * cutoff * x as f32).sin() / (PI * x as f32)
        };
        kernel.push(sinc * hamming(i, len));
    }
    let sum: f32 = kernel.iter().sum();
    if sum.abs() > 1e-12 {
        let norm = gain / sum;
        for tap in &mut kernel {
            *tap *= norm;
        }
    }
    kernel
}

pub fn low_pass_kernel(sample_rate: f32, corner_hz: f32, len: usize) -> Vec<f32> {
    low_pass_kernel_with_gain(sample_rate, corner_hz, len, 1.0)
}

/// Hilbert transformer kernel of odd length: even taps zero, odd taps
/// `2 / (pi k)`, Hamming-windowed.  A filter built from it shifts
/// positive frequencies by -pi/2 and negative frequencies by +pi/2.
pub fn hilbert_kernel(len: usize) -> Vec<f32> {
    assert!(len % 2 == 1, "Hilbert kernel length must be odd");
    let mid = (len / 2) as isize;
    (0..len)
        .map(|i| {
            let k = i as isize - mid;
            if k % 2 == 0 {
                0.0
            } else {
                2.0 / (PI * k as f32) * hamming(i, len)
            }
        })
        .collect()
}

/// Direct-Form-I biquad coefficients, `a0` already normalized out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

/// First-order low-pass from the bilinear transform of `1/(1 + s/wc)`.
pub fn one_pole_low_pass(sample_rate: f32, corner_hz: f32) -> BiquadCoeffs {
    let k = (PI * (corner_hz / sample_rate).clamp(1e-6, 0.499)).tan();
    let norm = 1.0 / (k + 1.0);
    BiquadCoeffs {
        b0: k * norm,
        b1: k * norm,
        b2: 0.0,
        a1: (k - 1.0) * norm,
        a2: 0.0,
    }
}

/// Audio EQ Cookbook second-order low-pass with corner `corner_hz` and
/// quality `q`.
pub fn biquad_low_pass(sample_rate: f32, corner_hz: f32, q: f32) -> BiquadCoeffs {
    let w0 = 2.0 * PI * (corner_hz / sample_rate).clamp(1e-6, 0.499);
    let alpha = w0.sin() / (2.0 * q.max(0.1));
    let cos_w0 = w0.cos();
    let inv_a0 = 1.0 / (1.0 + alpha);
    let b1 = (1.0 - cos_w0) * inv_a0;
    BiquadCoeffs {
        b0: b1 * 0.5,
        b1,
        b2: b1 * 0.5,
        a1: -2.0 * cos_w0 * inv_a0,
        a2: (1.0 - alpha) * inv_a0,
    }
}

/// Broadcast-FM de-emphasis: matched-z pole from the time constant and
/// a zero pinned at 0.9 pi so the response flattens at the top of the
/// band instead of rolling off forever.  Unity gain at DC.
pub fn deemphasis(sample_rate: f32, time_constant_s: f32) -> BiquadCoeffs {
    let pole = (-1.0 / (time_constant_s.max(1e-9) * sample_rate)).exp();
    let zero = (-0.9 * PI).exp();
    let gain = (1.0 - pole) / (1.0 - zero);
    BiquadCoeffs {
        b0: gain,
        b1: -gain * zero,
        b2: 0.0,
        a1: -pole,
        a2: 0.0,
    }
}
