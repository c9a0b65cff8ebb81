// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! DSP kernel: buffers, FFT, kernels, filters, shifting, pilot
//! detection and decimation.

pub mod buffer;
pub mod coeffs;
pub mod fft;
pub mod filter;
pub mod math;
pub mod pilot;
pub mod resample;
pub mod shift;

pub use buffer::{BufferPool, SampleRing};
pub use fft::{blackman, Fft};
pub use filter::{Agc, Biquad, BlockFilter, DcBlocker, DelayFilter, FftFilter, Filter, FirFilter};
pub use pilot::PilotDetector;
pub use resample::{ComplexDecimator, RealDecimator};
pub use shift::FrequencyShifter;
