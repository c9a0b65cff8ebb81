// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Fixed-length FFT with the crate's scaling and windowing conventions.
//!
//! The transform length is rounded up to the next power of two (minimum
//! 4) and the plans are cached per instance.  The forward transform
//! divides by N so the magnitude sum of a DC input equals the input
//! value; the reverse transform is unscaled, making
//! `reverse(transform(x))` the identity up to floating-point error.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft as FftPlan, FftPlanner};

pub struct Fft {
    len: usize,
    forward: Arc<dyn FftPlan<f32>>,
    inverse: Arc<dyn FftPlan<f32>>,
    window: Option<Vec<f32>>,
    packed: Vec<Complex<f32>>,
}

impl Fft {
    /// Plan a transform of at least `n` points (next power of two, >= 4).
    pub fn of_length(n: usize) -> Self {
        let len = n.max(4).next_power_of_two();
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        Self {
            len,
            forward,
            inverse,
            window: None,
            packed: vec![Complex::new(0.0, 0.0); len],
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Pointwise window applied before every forward transform.
    pub fn set_window(&mut self, window: Vec<f32>) {
        assert_eq!(window.len(), self.len, "window length must match FFT length");
        self.window = Some(window);
    }

    /// Forward transform in place, scaled by 1/N.
    pub fn transform(&mut self, re: &mut [f32], im: &mut [f32]) {
        assert_eq!(re.len(), self.len);
        assert_eq!(im.len(), self.len);
        match &self.window {
            Some(window) => {
                for k in 0..self.len {
                    self.packed[k] = Complex::new(re[k] * window[k], im[k] * window[k]);
                }
            }
            None => {
                for k in 0..self.len {
                    self.packed[k] = Complex::new(re[k], im[k]);
                }
            }
        }
        self.forward.process(&mut self.packed);
        let scale = 1.0 / self.len as f32;
        for k in 0..self.len {
            re[k] = self.packed[k].re * scale;
            im[k] = self.packed[k].im * scale;
        }
    }

    /// Reverse transform in place, unscaled.
    pub fn reverse(&mut self, re: &mut [f32], im: &mut [f32]) {
        assert_eq!(re.len(), self.len);
        assert_eq!(im.len(), self.len);
        for k in 0..self.len {
            self.packed[k] = Complex::new(re[k], im[k]);
        }
        self.inverse.process(&mut self.packed);
        for k in 0..self.len {
            re[k] = self.packed[k].re;
            im[k] = self.packed[k].im;
        }
    }
}

/// Blackman window of the given length.
pub fn blackman(len: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    if len <= 1 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| {
            let x = 2.0 * PI * i as f32 / (len - 1) as f32;
            0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_power_of_two() {
        assert_eq!(Fft::of_length(1).len(), 4);
        assert_eq!(Fft::of_length(4).len(), 4);
        assert_eq!(Fft::of_length(5).len(), 8);
        assert_eq!(Fft::of_length(1000).len(), 1024);
    }

    #[test]
    fn dc_input_lands_in_bin_zero_with_unit_scale() {
        let mut fft = Fft::of_length(16);
        let mut re = vec![2.5_f32; 16];
        let mut im = vec![0.0_f32; 16];
        fft.transform(&mut re, &mut im);
        assert!((re[0] - 2.5).abs() < 1e-6, "dc bin {}", re[0]);
        for k in 1..16 {
            assert!(re[k].abs() < 1e-5 && im[k].abs() < 1e-5, "bin {k} not empty");
        }
    }

    #[test]
    fn round_trip_is_identity() {
        let n = 256;
        let mut fft = Fft::of_length(n);
        let original: Vec<f32> = (0..n)
            .map(|i| (i as f32 * 0.37).sin() + 0.25 * (i as f32 * 1.9).cos())
            .collect();
        let mut re = original.clone();
        let mut im = vec![0.0_f32; n];
        fft.transform(&mut re, &mut im);
        fft.reverse(&mut re, &mut im);
        let rms = original
            .iter()
            .zip(&re)
            .map(|(a, b)| ((a - b) * (a - b)) as f64)
            .sum::<f64>()
            .sqrt()
            / (n as f64).sqrt();
        assert!(rms < 1e-5, "round-trip rms {rms}");
    }

    #[test]
    fn window_is_applied_on_forward_only() {
        let n = 8;
        let mut fft = Fft::of_length(n);
        fft.set_window(vec![0.0; n]);
        let mut re = vec![1.0_f32; n];
        let mut im = vec![0.0_f32; n];
        fft.transform(&mut re, &mut im);
        assert!(re.iter().chain(im.iter()).all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn blackman_endpoints_near_zero() {
        let w = blackman(64);
        assert!(w[0].abs() < 1e-6);
        assert!(w[63].abs() < 1e-6);
        assert!((w[31] - 0.9).abs() < 0.12);
    }
}
