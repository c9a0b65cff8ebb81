// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Test-signal generators.
//!
//! Modulation lives here only to exercise the receive chain: tones,
//! AM and FM baseband synthesis, and the broadcast stereo multiplex.
//! Phase accumulates in f64 so second-long test signals stay clean.

use num_complex::Complex;

/// Real sine tone.
pub fn tone(frequency_hz: f64, amplitude: f32, sample_rate: f64, len: usize) -> Vec<f32> {
    let w = std::f64::consts::TAU * frequency_hz / sample_rate;
    (0..len)
        .map(|n| amplitude * (w * n as f64).sin() as f32)
        .collect()
}

/// Baseband I/Q of an AM signal: carrier at `offset_hz` from center,
/// envelope `carrier_amplitude * (1 + audio)`.
pub fn modulate_am(
    audio: &[f32],
    sample_rate: f64,
    offset_hz: f64,
    carrier_amplitude: f32,
) -> (Vec<f32>, Vec<f32>) {
    let w = std::f64::consts::TAU * offset_hz / sample_rate;
    let mut i = Vec::with_capacity(audio.len());
    let mut q = Vec::with_capacity(audio.len());
    for (n, &sample) in audio.iter().enumerate() {
        let envelope = (carrier_amplitude * (1.0 + sample)) as f64;
        let s = Complex::from_polar(envelope, w * n as f64);
        i.push(s.re as f32);
        q.push(s.im as f32);
    }
    (i, q)
}

/// Baseband I/Q of an FM signal: instantaneous frequency
/// `offset_hz + deviation_hz * audio`.
pub fn modulate_fm(
    audio: &[f32],
    sample_rate: f64,
    offset_hz: f64,
    deviation_hz: f64,
    amplitude: f32,
) -> (Vec<f32>, Vec<f32>) {
    let mut phase = 0.0_f64;
    let mut i = Vec::with_capacity(audio.len());
    let mut q = Vec::with_capacity(audio.len());
    for &sample in audio {
        phase += std::f64::consts::TAU * (offset_hz + deviation_hz * sample as f64) / sample_rate;
        phase %= std::f64::consts::TAU;
        let s = Complex::from_polar(amplitude as f64, phase);
        i.push(s.re as f32);
        q.push(s.im as f32);
    }
    (i, q)
}

/// Baseband I/Q of a plain carrier at `offset_hz` (a CW key-down).
pub fn carrier(
    sample_rate: f64,
    offset_hz: f64,
    amplitude: f32,
    len: usize,
) -> (Vec<f32>, Vec<f32>) {
    let w = std::f64::consts::TAU * offset_hz / sample_rate;
    let mut i = Vec::with_capacity(len);
    let mut q = Vec::with_capacity(len);
    for n in 0..len {
        let s = Complex::from_polar(amplitude as f64, w * n as f64);
        i.push(s.re as f32);
        q.push(s.im as f32);
    }
    (i, q)
}

/// Pilot amplitude in the stereo multiplex.
pub const PILOT_AMPLITUDE: f32 = 0.1;

/// Broadcast FM stereo multiplex: `(l + r) / 2`, a 19 kHz pilot
/// cosine, and `(l - r) / 2` DSB-SC on `sin(2 w_p t)`.
pub fn stereo_multiplex(left: &[f32], right: &[f32], sample_rate: f64) -> Vec<f32> {
    debug_assert_eq!(left.len(), right.len());
    let w = std::f64::consts::TAU * 19_000.0 / sample_rate;
    left.iter()
        .zip(right)
        .enumerate()
        .map(|(n, (&l, &r))| {
            let t = w * n as f64;
            let sum = (l + r) * 0.5;
            let diff = (l - r) * 0.5;
            sum + PILOT_AMPLITUDE * t.cos() as f32 + diff * (2.0 * t).sin() as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fm_of_silence_is_a_carrier() {
        let audio = vec![0.0_f32; 1000];
        let (i, q) = modulate_fm(&audio, 48_000.0, 0.0, 5_000.0, 1.0);
        for n in 0..1000 {
            let mag = (i[n] * i[n] + q[n] * q[n]).sqrt();
            assert!((mag - 1.0).abs() < 1e-5);
            assert!((i[n] - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn am_envelope_matches_audio() {
        let audio = tone(600.0, 0.5, 48_000.0, 4_800);
        let (i, q) = modulate_am(&audio, 48_000.0, 0.0, 0.1);
        for n in (0..4_800).step_by(321) {
            let envelope = (i[n] * i[n] + q[n] * q[n]).sqrt();
            let expected = 0.1 * (1.0 + audio[n]);
            assert!((envelope - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn multiplex_mono_has_no_subcarrier_energy() {
        let rate = 336_000.0;
        let audio = tone(1_000.0, 1.0, rate, 33_600);
        let multiplex = stereo_multiplex(&audio, &audio, rate);
        // L == R: the difference channel vanishes, leaving audio + pilot.
        let w38 = std::f64::consts::TAU * 38_000.0 / rate;
        let mut correlation = 0.0_f64;
        for (n, &sample) in multiplex.iter().enumerate() {
            correlation += sample as f64 * (w38 * n as f64).sin();
        }
        correlation /= multiplex.len() as f64;
        assert!(correlation.abs() < 1e-3, "subcarrier leak {correlation}");
    }
}
