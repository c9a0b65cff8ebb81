// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Modes, the scheme registry and the capability-uniform parameter
//! surface that lets one UI drive every scheme.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::demod::am::AmPipeline;
use crate::demod::nbfm::NbfmPipeline;
use crate::demod::ssb::{CwPipeline, SsbPipeline};
use crate::demod::wbfm::WbfmPipeline;
use crate::demod::SchemePipeline;

/// Demodulation scheme identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    WBFM,
    NBFM,
    AM,
    USB,
    LSB,
    CW,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WBFM => "WBFM",
            Self::NBFM => "NBFM",
            Self::AM => "AM",
            Self::USB => "USB",
            Self::LSB => "LSB",
            Self::CW => "CW",
        };
        write!(f, "{name}")
    }
}

/// A scheme plus its tunable parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme")]
pub enum Mode {
    Wbfm { stereo: bool },
    Nbfm { max_f: u32 },
    Am { bandwidth: u32 },
    Ssb { bandwidth: u32, upper: bool },
    Cw { bandwidth: u32 },
}

impl Mode {
    pub fn scheme(&self) -> Scheme {
        match self {
            Self::Wbfm { .. } => Scheme::WBFM,
            Self::Nbfm { .. } => Scheme::NBFM,
            Self::Am { .. } => Scheme::AM,
            Self::Ssb { upper: true, .. } => Scheme::USB,
            Self::Ssb { upper: false, .. } => Scheme::LSB,
            Self::Cw { .. } => Scheme::CW,
        }
    }
}

/// Uniform accessor set over a mode plus the squelch level that lives
/// next to the demodulator.  Setters for absent capabilities are
/// no-ops, so a UI can drive every scheme through one surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeParameters {
    mode: Mode,
    squelch: f32,
}

impl ModeParameters {
    pub fn new(mode: Mode) -> Self {
        Self { mode, squelch: 0.0 }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn into_mode(self) -> Mode {
        self.mode
    }

    pub fn has_bandwidth(&self) -> bool {
        !matches!(self.mode, Mode::Wbfm { .. })
    }

    pub fn bandwidth(&self) -> Option<u32> {
        match self.mode {
            Mode::Wbfm { .. } => None,
            // NBFM bandwidth is twice the maximum deviation.
            Mode::Nbfm { max_f } => Some(max_f * 2),
            Mode::Am { bandwidth } => Some(bandwidth),
            Mode::Ssb { bandwidth, .. } => Some(bandwidth),
            Mode::Cw { bandwidth } => Some(bandwidth),
        }
    }

    pub fn set_bandwidth(&mut self, bandwidth_hz: u32) {
        match &mut self.mode {
            Mode::Wbfm { .. } => {}
            Mode::Nbfm { max_f } => *max_f = bandwidth_hz.clamp(2_000, 50_000) / 2,
            Mode::Am { bandwidth } => *bandwidth = bandwidth_hz.clamp(100, 20_000),
            Mode::Ssb { bandwidth, .. } => *bandwidth = bandwidth_hz.clamp(100, 10_000),
            Mode::Cw { bandwidth } => *bandwidth = bandwidth_hz.clamp(50, 1_000),
        }
    }

    pub fn has_stereo(&self) -> bool {
        matches!(self.mode, Mode::Wbfm { .. })
    }

    pub fn stereo(&self) -> bool {
        matches!(self.mode, Mode::Wbfm { stereo: true })
    }

    pub fn set_stereo(&mut self, enabled: bool) {
        if let Mode::Wbfm { stereo } = &mut self.mode {
            *stereo = enabled;
        }
    }

    pub fn has_squelch(&self) -> bool {
        !matches!(self.mode, Mode::Wbfm { .. })
    }

    pub fn squelch(&self) -> f32 {
        if self.has_squelch() {
            self.squelch
        } else {
            0.0
        }
    }

    pub fn set_squelch(&mut self, level: f32) {
        if self.has_squelch() {
            self.squelch = level.max(0.0);
        }
    }

    pub(crate) fn squelch_level(&self) -> f32 {
        self.squelch
    }
}

/// Everything a pipeline factory needs to size its stages.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub input_rate: u32,
    pub audio_rate: u32,
    pub deemphasis_us: u32,
}

pub type PipelineFactory =
    Arc<dyn Fn(&Mode, &PipelineConfig) -> Box<dyn SchemePipeline> + Send + Sync>;

struct RegistryEntry {
    scheme: Scheme,
    default_mode: Mode,
    factory: PipelineFactory,
}

/// Registration-order registry mapping schemes to default modes and
/// pipeline factories.
pub struct ModeRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for ModeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeRegistry {
    /// Registry with no schemes.
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Registry with the built-in schemes.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(
            Scheme::WBFM,
            Mode::Wbfm { stereo: true },
            Arc::new(|mode, cfg| {
                let stereo = matches!(mode, Mode::Wbfm { stereo: true });
                Box::new(WbfmPipeline::new(
                    cfg.input_rate,
                    cfg.audio_rate,
                    stereo,
                    cfg.deemphasis_us,
                ))
            }),
        );
        registry.register(
            Scheme::NBFM,
            Mode::Nbfm { max_f: 5_000 },
            Arc::new(|mode, cfg| {
                let max_f = match mode {
                    Mode::Nbfm { max_f } => *max_f,
                    _ => 5_000,
                };
                Box::new(NbfmPipeline::new(cfg.input_rate, cfg.audio_rate, max_f))
            }),
        );
        registry.register(
            Scheme::AM,
            Mode::Am { bandwidth: 10_000 },
            Arc::new(|mode, cfg| {
                let bandwidth = match mode {
                    Mode::Am { bandwidth } => *bandwidth,
                    _ => 10_000,
                };
                Box::new(AmPipeline::new(cfg.input_rate, cfg.audio_rate, bandwidth))
            }),
        );
        for (scheme, upper) in [(Scheme::USB, true), (Scheme::LSB, false)] {
            registry.register(
                scheme,
                Mode::Ssb {
                    bandwidth: 2_800,
                    upper,
                },
                Arc::new(move |mode, cfg| {
                    let bandwidth = match mode {
                        Mode::Ssb { bandwidth, .. } => *bandwidth,
                        _ => 2_800,
                    };
                    Box::new(SsbPipeline::new(
                        cfg.input_rate,
                        cfg.audio_rate,
                        bandwidth,
                        upper,
                    ))
                }),
            );
        }
        registry.register(
            Scheme::CW,
            Mode::Cw { bandwidth: 200 },
            Arc::new(|mode, cfg| {
                let bandwidth = match mode {
                    Mode::Cw { bandwidth } => *bandwidth,
                    _ => 200,
                };
                Box::new(CwPipeline::new(cfg.input_rate, cfg.audio_rate, bandwidth))
            }),
        );

        registry
    }

    /// Register a scheme, replacing any previous registration.
    pub fn register(&mut self, scheme: Scheme, default_mode: Mode, factory: PipelineFactory) {
        self.entries.retain(|e| e.scheme != scheme);
        self.entries.push(RegistryEntry {
            scheme,
            default_mode,
            factory,
        });
    }

    /// Default mode instance for a scheme.
    pub fn get_mode(&self, scheme: Scheme) -> Option<Mode> {
        self.entries
            .iter()
            .find(|e| e.scheme == scheme)
            .map(|e| e.default_mode.clone())
    }

    pub fn get_schemes(&self) -> Vec<Scheme> {
        self.entries.iter().map(|e| e.scheme).collect()
    }

    /// Capability-uniform view over a scheme's default mode.
    pub fn mode_parameters(&self, scheme: Scheme) -> Option<ModeParameters> {
        self.get_mode(scheme).map(ModeParameters::new)
    }

    pub(crate) fn build(
        &self,
        mode: &Mode,
        config: &PipelineConfig,
    ) -> Option<Box<dyn SchemePipeline>> {
        self.entries
            .iter()
            .find(|e| e.scheme == mode.scheme())
            .map(|e| (e.factory)(mode, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_covers_all_schemes() {
        let registry = ModeRegistry::new();
        let schemes = registry.get_schemes();
        for scheme in [
            Scheme::WBFM,
            Scheme::NBFM,
            Scheme::AM,
            Scheme::USB,
            Scheme::LSB,
            Scheme::CW,
        ] {
            assert!(schemes.contains(&scheme), "missing {scheme}");
            assert!(registry.get_mode(scheme).is_some());
        }
    }

    #[test]
    fn register_replaces_existing_entry() {
        let mut registry = ModeRegistry::new();
        let count = registry.get_schemes().len();
        registry.register(
            Scheme::AM,
            Mode::Am { bandwidth: 6_000 },
            Arc::new(|_, cfg| Box::new(AmPipeline::new(cfg.input_rate, cfg.audio_rate, 6_000))),
        );
        assert_eq!(registry.get_schemes().len(), count);
        assert_eq!(
            registry.get_mode(Scheme::AM),
            Some(Mode::Am { bandwidth: 6_000 })
        );
    }

    #[test]
    fn nbfm_bandwidth_maps_to_half_deviation() {
        let mut params = ModeParameters::new(Mode::Nbfm { max_f: 5_000 });
        assert_eq!(params.bandwidth(), Some(10_000));
        params.set_bandwidth(12_500);
        assert_eq!(params.mode(), &Mode::Nbfm { max_f: 6_250 });
    }

    #[test]
    fn absent_capabilities_are_noops() {
        let mut wbfm = ModeParameters::new(Mode::Wbfm { stereo: false });
        assert!(!wbfm.has_bandwidth());
        wbfm.set_bandwidth(99_999);
        assert_eq!(wbfm.mode(), &Mode::Wbfm { stereo: false });
        assert!(!wbfm.has_squelch());
        wbfm.set_squelch(5.0);
        assert_eq!(wbfm.squelch(), 0.0);
        wbfm.set_stereo(true);
        assert!(wbfm.stereo());

        let mut cw = ModeParameters::new(Mode::Cw { bandwidth: 200 });
        assert!(!cw.has_stereo());
        cw.set_stereo(true);
        assert!(!cw.stereo());
        cw.set_bandwidth(5_000);
        assert_eq!(cw.bandwidth(), Some(1_000));
    }

    #[test]
    fn mode_serde_round_trip() {
        let mode = Mode::Ssb {
            bandwidth: 2_800,
            upper: true,
        };
        let json = serde_json::to_string(&mode).unwrap();
        let back: Mode = serde_json::from_str(&json).unwrap();
        assert_eq!(mode, back);
        assert_eq!(back.scheme(), Scheme::USB);
    }
}
