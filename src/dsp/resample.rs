// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Integer-ratio decimators for real and complex streams.
//!
//! Band-limit with a FIR (direct or overlap-save, picked by kernel
//! length), then keep every k-th sample.  The pick phase persists
//! across blocks so arbitrary block sizes decimate cleanly.

use crate::dsp::filter::{BlockFilter, Filter};

pub struct RealDecimator {
    factor: usize,
    filter: BlockFilter,
    phase: usize,
    scratch: Vec<f32>,
}

impl RealDecimator {
    pub fn new(factor: usize, kernel: Vec<f32>) -> Self {
        assert!(factor >= 1, "decimation factor must be at least 1");
        Self {
            factor,
            filter: BlockFilter::for_kernel(kernel),
            phase: 0,
            scratch: Vec::new(),
        }
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Filter `input` and append every `factor`-th sample to `out`.
    pub fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        self.scratch.clear();
        self.scratch.extend_from_slice(input);
        self.filter.process_in_place(&mut self.scratch);
        for &sample in &self.scratch {
            if self.phase == 0 {
                out.push(sample);
            }
            self.phase = (self.phase + 1) % self.factor;
        }
    }

    pub fn reset(&mut self) {
        self.filter.reset();
        self.phase = 0;
    }
}

pub struct ComplexDecimator {
    factor: usize,
    filter_i: BlockFilter,
    filter_q: BlockFilter,
    phase: usize,
    scratch_i: Vec<f32>,
    scratch_q: Vec<f32>,
}

impl ComplexDecimator {
    pub fn new(factor: usize, kernel: Vec<f32>) -> Self {
        assert!(factor >= 1, "decimation factor must be at least 1");
        let filter_i = BlockFilter::for_kernel(kernel.clone());
        let filter_q = BlockFilter::for_kernel(kernel);
        Self {
            factor,
            filter_i,
            filter_q,
            phase: 0,
            scratch_i: Vec::new(),
            scratch_q: Vec::new(),
        }
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Filter the I/Q pair and append every `factor`-th sample to the
    /// output pair.
    pub fn process(
        &mut self,
        i: &[f32],
        q: &[f32],
        out_i: &mut Vec<f32>,
        out_q: &mut Vec<f32>,
    ) {
        debug_assert_eq!(i.len(), q.len());
        self.scratch_i.clear();
        self.scratch_i.extend_from_slice(i);
        self.scratch_q.clear();
        self.scratch_q.extend_from_slice(q);
        self.filter_i.process_in_place(&mut self.scratch_i);
        self.filter_q.process_in_place(&mut self.scratch_q);
        for n in 0..self.scratch_i.len() {
            if self.phase == 0 {
                out_i.push(self.scratch_i[n]);
                out_q.push(self.scratch_q[n]);
            }
            self.phase = (self.phase + 1) % self.factor;
        }
    }

    pub fn reset(&mut self) {
        self.filter_i.reset();
        self.filter_q.reset();
        self.phase = 0;
    }
}
