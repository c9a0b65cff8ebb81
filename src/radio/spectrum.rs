// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Spectrum receiver: a windowed FFT snapshot over the latest samples.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::dsp::buffer::SampleRing;
use crate::dsp::fft::{blackman, Fft};
use crate::radio::receiver::SampleReceiver;

const MIN_FFT_LENGTH: usize = 16;
const POWER_FLOOR: f32 = 1e-12;

struct SpectrumShared {
    ring_i: SampleRing,
    ring_q: SampleRing,
    fft: Fft,
    scratch_re: Vec<f32>,
    scratch_im: Vec<f32>,
    sample_rate: u32,
}

/// Keeps the newest FFT-length samples and renders a log-power
/// spectrum on demand.  Cheap clones share the same state, so one
/// handle can sit in the radio's receiver chain while another serves
/// a UI.
#[derive(Clone)]
pub struct SpectrumReceiver {
    shared: Arc<Mutex<SpectrumShared>>,
    size: usize,
}

impl SpectrumReceiver {
    /// `length` is rounded up to a power of two, minimum 16.
    pub fn new(length: usize) -> Self {
        let size = length.max(MIN_FFT_LENGTH).next_power_of_two();
        let mut fft = Fft::of_length(size);
        fft.set_window(blackman(size));
        let shared = SpectrumShared {
            ring_i: SampleRing::new(size),
            ring_q: SampleRing::new(size),
            fft,
            scratch_re: vec![0.0; size],
            scratch_im: vec![0.0; size],
            sample_rate: 0,
        };
        Self {
            shared: Arc::new(Mutex::new(shared)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn sample_rate(&self) -> u32 {
        self.lock().sample_rate
    }

    fn lock(&self) -> MutexGuard<'_, SpectrumShared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write `10 log10 |X[k]|^2` into `dst`.  Positive frequencies
    /// fill the first half (k = 0 .. N/2-1); negative frequencies
    /// alias into the tail.
    pub fn get_spectrum(&self, dst: &mut [f32]) {
        assert!(dst.len() >= self.size, "spectrum destination too short");
        let mut shared = self.lock();
        let shared = &mut *shared;
        shared.scratch_re.fill(0.0);
        shared.scratch_im.fill(0.0);
        shared.ring_i.copy_to(&mut shared.scratch_re);
        shared.ring_q.copy_to(&mut shared.scratch_im);
        shared
            .fft
            .transform(&mut shared.scratch_re, &mut shared.scratch_im);
        for k in 0..self.size {
            let power = shared.scratch_re[k] * shared.scratch_re[k]
                + shared.scratch_im[k] * shared.scratch_im[k];
            dst[k] = 10.0 * power.max(POWER_FLOOR).log10();
        }
    }
}

impl SampleReceiver for SpectrumReceiver {
    fn set_sample_rate(&mut self, sample_rate: u32) {
        self.lock().sample_rate = sample_rate;
    }

    fn receive(&mut self, i: &[f32], q: &[f32], _frequency: i64, _data: Option<&[u8]>) {
        let mut shared = self.lock();
        shared.ring_i.store(i);
        shared.ring_q.store(q);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_rounds_up() {
        assert_eq!(SpectrumReceiver::new(1).size(), 16);
        assert_eq!(SpectrumReceiver::new(1000).size(), 1024);
    }

    #[test]
    fn positive_tone_lands_in_the_first_half() {
        let size = 1024;
        let mut receiver = SpectrumReceiver::new(size);
        receiver.set_sample_rate(48_000);

        // Complex exponential at bin 100.
        let w = std::f32::consts::TAU * 100.0 / size as f32;
        let i: Vec<f32> = (0..size).map(|n| (w * n as f32).cos()).collect();
        let q: Vec<f32> = (0..size).map(|n| (w * n as f32).sin()).collect();
        receiver.receive(&i, &q, 0, None);

        let mut spectrum = vec![0.0_f32; size];
        receiver.get_spectrum(&mut spectrum);
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(k, _)| k)
            .unwrap();
        assert_eq!(peak, 100);
    }

    #[test]
    fn negative_tone_aliases_into_the_tail() {
        let size = 1024;
        let mut receiver = SpectrumReceiver::new(size);
        let w = std::f32::consts::TAU * 100.0 / size as f32;
        let i: Vec<f32> = (0..size).map(|n| (w * n as f32).cos()).collect();
        let q: Vec<f32> = (0..size).map(|n| -(w * n as f32).sin()).collect();
        receiver.receive(&i, &q, 0, None);

        let mut spectrum = vec![0.0_f32; size];
        receiver.get_spectrum(&mut spectrum);
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(k, _)| k)
            .unwrap();
        assert_eq!(peak, size - 100);
    }

    #[test]
    fn uses_the_latest_samples() {
        let size = 16;
        let mut receiver = SpectrumReceiver::new(size);
        // Flood with DC, then overwrite with silence; the snapshot
        // must reflect the newest samples only.
        receiver.receive(&[1.0; 64], &[0.0; 64], 0, None);
        receiver.receive(&[0.0; 16], &[0.0; 16], 0, None);
        let mut spectrum = vec![0.0_f32; size];
        receiver.get_spectrum(&mut spectrum);
        assert!(spectrum[0] < -100.0, "dc bin {}", spectrum[0]);
    }
}
