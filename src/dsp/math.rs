// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Polynomial arctangent used everywhere phase is measured.

use std::f64::consts::{FRAC_PI_2, PI};

/// Odd-polynomial arctangent on `[-1, 1]`, |err| <= 2e-8.
const ATAN_COEFFS: [f64; 8] = [
    0.999_999_332_9,
    -0.333_298_560_5,
    0.199_465_359_9,
    -0.139_085_335_1,
    0.096_420_044_1,
    -0.055_909_886_1,
    0.021_861_228_8,
    -0.004_054_058_0,
];

#[inline]
fn atan_poly(z: f64) -> f64 {
    let z2 = z * z;
    let mut acc = ATAN_COEFFS[7];
    for &c in ATAN_COEFFS[..7].iter().rev() {
        acc = acc * z2 + c;
    }
    acc * z
}

/// Four-quadrant arctangent computed from the min/max argument ratio.
///
/// Maximum absolute error is bounded by the polynomial (2e-8), so the
/// result is indistinguishable from `f64::atan2` for phase work.
#[inline]
pub fn atan2_wide(y: f64, x: f64) -> f64 {
    if x == 0.0 && y == 0.0 {
        return 0.0;
    }
    let ay = y.abs();
    let ax = x.abs();
    let swapped = ay > ax;
    let ratio = if swapped { ax / ay } else { ay / ax };
    let mut angle = atan_poly(ratio);
    if swapped {
        angle = FRAC_PI_2 - angle;
    }
    if x < 0.0 {
        angle = PI - angle;
    }
    if y < 0.0 {
        -angle
    } else {
        angle
    }
}

/// Single-precision wrapper for the hot loops.
#[inline]
pub fn atan2(y: f32, x: f32) -> f32 {
    atan2_wide(y as f64, x as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_over_the_full_circle() {
        let mut worst = 0.0_f64;
        for k in 0..=100_000 {
            let angle = (k as f64 / 100_000.0 - 0.5) * 2.0 * PI;
            let (y, x) = (angle.sin() * 3.0, angle.cos() * 3.0);
            let err = (atan2_wide(y, x) - y.atan2(x)).abs();
            worst = worst.max(err);
        }
        assert!(worst <= 4e-8, "worst error {worst}");
    }

    #[test]
    fn axis_cases() {
        assert_eq!(atan2_wide(0.0, 0.0), 0.0);
        assert!((atan2_wide(1.0, 0.0) - FRAC_PI_2).abs() < 4e-8);
        assert!((atan2_wide(-1.0, 0.0) + FRAC_PI_2).abs() < 4e-8);
        assert!((atan2_wide(0.0, -1.0) - PI).abs() < 4e-8);
        assert!((atan2_wide(0.0, 1.0)).abs() < 4e-8);
    }

    #[test]
    fn single_precision_wrapper_tracks_std() {
        for k in 0..1000 {
            let angle = k as f32 * 0.00628;
            let (y, x) = (angle.sin(), angle.cos());
            let err = (atan2(y, x) - y.atan2(x)).abs();
            assert!(err <= 2e-7, "err {err} at {angle}");
        }
    }
}
