// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Stereo difference-channel separator for the FM multiplex.

use crate::dsp::pilot::PilotDetector;

/// Pilot tolerance used for stereo detection.
const PILOT_TOLERANCE_HZ: f32 = 10.0;

/// Coherently down-converts the 38 kHz difference channel.
///
/// The pilot detector reconstructs a unit-magnitude carrier at the
/// pilot frequency; multiplying the multiplex by `cos * sin * 4`
/// (i.e. `2 sin(2 theta)`) lands the DSB-SC difference channel at
/// baseband.  The caller low-passes the product.
pub struct StereoSeparator {
    pilot: PilotDetector,
    carrier_cos: Vec<f32>,
    carrier_sin: Vec<f32>,
}

impl StereoSeparator {
    pub fn new(sample_rate: f32, pilot_hz: f32) -> Self {
        Self {
            pilot: PilotDetector::new(sample_rate, pilot_hz, PILOT_TOLERANCE_HZ),
            carrier_cos: Vec::new(),
            carrier_sin: Vec::new(),
        }
    }

    /// Extract the raw difference signal from the multiplex, returning
    /// whether the pilot was locked this block.
    pub fn separate(&mut self, multiplex: &[f32], diff_out: &mut Vec<f32>) -> bool {
        self.carrier_cos.resize(multiplex.len(), 0.0);
        self.carrier_sin.resize(multiplex.len(), 0.0);
        self.pilot
            .process(multiplex, &mut self.carrier_cos, &mut self.carrier_sin);
        diff_out.reserve(multiplex.len());
        for n in 0..multiplex.len() {
            diff_out.push(multiplex[n] * self.carrier_cos[n] * self.carrier_sin[n] * 4.0);
        }
        self.pilot.locked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_the_difference_channel() {
        let rate = 336_000.0_f64;
        let pilot_hz = 19_000.0_f64;
        let diff_hz = 1_000.0_f64;
        let len = (rate * 0.5) as usize;

        // Multiplex: pilot plus a difference channel on sin(2 w_p t).
        let multiplex: Vec<f32> = (0..len)
            .map(|n| {
                let t = n as f64 / rate;
                let pilot = 0.1 * (std::f64::consts::TAU * pilot_hz * t).cos();
                let diff = (std::f64::consts::TAU * diff_hz * t).sin();
                let sub = (2.0 * std::f64::consts::TAU * pilot_hz * t).sin();
                (pilot + 0.5 * diff * sub) as f32
            })
            .collect();

        let mut separator = StereoSeparator::new(rate as f32, pilot_hz as f32);
        let mut diff = Vec::new();
        let found = separator.separate(&multiplex, &mut diff);
        assert!(found, "pilot should lock");

        // Correlate the tail with the expected 1 kHz difference tone;
        // the product terms at 38/76 kHz average out.
        let start = len / 2;
        let mut num = 0.0_f64;
        let mut den = 0.0_f64;
        for n in start..len {
            let t = n as f64 / rate;
            let reference = (std::f64::consts::TAU * diff_hz * t).sin();
            num += diff[n] as f64 * reference;
            den += reference * reference;
        }
        let recovered = num / den;
        assert!(
            (recovered - 0.5).abs() < 0.05,
            "recovered amplitude {recovered}"
        );
    }

    #[test]
    fn no_pilot_means_no_stereo() {
        let rate = 336_000.0_f32;
        let multiplex = vec![0.0_f32; 33_600];
        let mut separator = StereoSeparator::new(rate, 19_000.0);
        let mut diff = Vec::new();
        assert!(!separator.separate(&multiplex, &mut diff));
    }
}
