// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Demodulator family: per-scheme pipelines and the demodulator that
//! plugs into the radio as a sample receiver.

mod am;
mod fm;
mod nbfm;
pub mod params;
mod ssb;
mod stereo;
mod wbfm;

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;

pub use am::{AmPipeline, EnvelopeDetector};
pub use fm::FmDetector;
pub use nbfm::NbfmPipeline;
pub use params::{Mode, ModeParameters, ModeRegistry, PipelineConfig, PipelineFactory, Scheme};
pub use ssb::{CwPipeline, SsbDetector, SsbPipeline, CW_BEAT_HZ};
pub use stereo::StereoSeparator;
pub use wbfm::{WbfmPipeline, DEFAULT_DEEMPHASIS_US, WBFM_BANDWIDTH_HZ};

use crate::player::Player;
use crate::radio::receiver::SampleReceiver;

/// One block of demodulated audio.
#[derive(Debug, Clone)]
pub struct AudioBlock {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    /// True only when a pilot lock was detected this block.
    pub stereo: bool,
    /// In-band to residual power ratio; ordinal, not calibrated.
    pub snr: f32,
}

/// A scheme-specific demodulation pipeline.
pub trait SchemePipeline: Send {
    /// Demodulate one block of baseband I/Q.  The signal of interest
    /// sits `frequency_offset` Hz from the capture center.
    fn demodulate(&mut self, i: &[f32], q: &[f32], frequency_offset: f64) -> AudioBlock;
}

pub(crate) fn mean_power(i: &[f32], q: &[f32]) -> f32 {
    if i.is_empty() {
        return 0.0;
    }
    let sum: f64 = i
        .iter()
        .zip(q)
        .map(|(&a, &b)| (a as f64) * (a as f64) + (b as f64) * (b as f64))
        .sum();
    (sum / i.len() as f64) as f32
}

pub(crate) fn mean_power_real(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64) as f32
}

/// In-band to residual power ratio, clamped positive.
pub(crate) fn snr_indicator(in_band: f32, total: f32) -> f32 {
    let residual = (total - in_band).max(total * 1e-6).max(1e-12);
    (in_band / residual).max(0.0)
}

struct DemodInner {
    registry: ModeRegistry,
    mode: Mode,
    squelch: f32,
    player: Box<dyn Player>,
    pipeline: Option<Box<dyn SchemePipeline>>,
    input_rate: u32,
    frequency_offset: f64,
    /// Deferred retune: the new offset applies on the first block whose
    /// center frequency matches the expected value.
    pending_retune: Option<(i64, f64)>,
    deemphasis_us: u32,
    stereo_active: bool,
    last_snr: f32,
    stereo_tx: broadcast::Sender<bool>,
}

impl DemodInner {
    fn rebuild_pipeline(&mut self) {
        self.pipeline = if self.input_rate == 0 {
            None
        } else {
            let config = PipelineConfig {
                input_rate: self.input_rate,
                audio_rate: self.player.sample_rate(),
                deemphasis_us: self.deemphasis_us,
            };
            self.registry.build(&self.mode, &config)
        };
    }
}

/// The demodulator: a sample receiver that runs the active scheme
/// pipeline and hands audio to the player sink.
///
/// Handles are cheap clones over shared state, so the radio can own
/// one as its receiver while the application keeps another for mode
/// and tuning control.
#[derive(Clone)]
pub struct Demodulator {
    inner: Arc<Mutex<DemodInner>>,
    stereo_tx: broadcast::Sender<bool>,
}

impl Demodulator {
    pub fn new(player: Box<dyn Player>) -> Self {
        Self::with_registry(player, ModeRegistry::new())
    }

    pub fn with_registry(player: Box<dyn Player>, registry: ModeRegistry) -> Self {
        let mode = registry
            .get_mode(Scheme::WBFM)
            .unwrap_or(Mode::Wbfm { stereo: true });
        let (stereo_tx, _) = broadcast::channel(16);
        let inner = DemodInner {
            registry,
            mode,
            squelch: 0.0,
            player,
            pipeline: None,
            input_rate: 0,
            frequency_offset: 0.0,
            pending_retune: None,
            deemphasis_us: DEFAULT_DEEMPHASIS_US,
            stereo_active: false,
            last_snr: 0.0,
            stereo_tx: stereo_tx.clone(),
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
            stereo_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, DemodInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_mode(&self, mode: Mode) {
        let mut inner = self.lock();
        tracing::debug!(scheme = %mode.scheme(), "demodulator mode change");
        inner.mode = mode;
        inner.rebuild_pipeline();
    }

    pub fn get_mode(&self) -> Mode {
        self.lock().mode.clone()
    }

    /// Apply a capability-uniform parameter set: mode plus squelch.
    pub fn set_mode_parameters(&self, parameters: ModeParameters) {
        let mut inner = self.lock();
        inner.squelch = parameters.squelch_level();
        inner.mode = parameters.into_mode();
        inner.rebuild_pipeline();
    }

    pub fn mode_parameters(&self) -> ModeParameters {
        let inner = self.lock();
        let mut parameters = ModeParameters::new(inner.mode.clone());
        parameters.set_squelch(inner.squelch);
        parameters
    }

    pub fn set_squelch(&self, level: f32) {
        self.lock().squelch = level.max(0.0);
    }

    pub fn set_volume(&self, volume: f32) {
        self.lock().player.set_volume(volume.clamp(0.0, 1.0));
    }

    pub fn get_volume(&self) -> f32 {
        self.lock().player.volume()
    }

    pub fn set_frequency_offset(&self, offset_hz: f64) {
        let mut inner = self.lock();
        inner.frequency_offset = offset_hz;
        inner.pending_retune = None;
    }

    pub fn get_frequency_offset(&self) -> f64 {
        self.lock().frequency_offset
    }

    /// Glitch-free retune: defer the offset change until the first
    /// block captured at the new center frequency arrives.
    pub fn expect_frequency_and_set_offset(&self, center_hz: i64, offset_hz: f64) {
        self.lock().pending_retune = Some((center_hz, offset_hz));
    }

    pub fn set_deemphasis_us(&self, deemphasis_us: u32) {
        let mut inner = self.lock();
        inner.deemphasis_us = deemphasis_us.max(1);
        inner.rebuild_pipeline();
    }

    /// Most recent per-block snr indicator.
    pub fn snr(&self) -> f32 {
        self.lock().last_snr
    }

    /// Whether the last block carried a pilot lock.
    pub fn stereo_active(&self) -> bool {
        self.lock().stereo_active
    }

    /// Fires whenever the stereo-lock flag changes.
    pub fn subscribe_stereo(&self) -> broadcast::Receiver<bool> {
        self.stereo_tx.subscribe()
    }
}

impl SampleReceiver for Demodulator {
    fn set_sample_rate(&mut self, sample_rate: u32) {
        let mut inner = self.lock();
        inner.input_rate = sample_rate;
        inner.rebuild_pipeline();
    }

    fn receive(&mut self, i: &[f32], q: &[f32], frequency: i64, _data: Option<&[u8]>) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if let Some((center, offset)) = inner.pending_retune {
            if frequency == center {
                inner.frequency_offset = offset;
                inner.pending_retune = None;
                tracing::debug!(center, offset, "deferred offset applied");
            }
        }
        let Some(pipeline) = inner.pipeline.as_mut() else {
            return;
        };
        let mut block = pipeline.demodulate(i, q, inner.frequency_offset);
        inner.last_snr = block.snr;

        if block.stereo != inner.stereo_active {
            inner.stereo_active = block.stereo;
            let _ = inner.stereo_tx.send(block.stereo);
        }

        let squelched = ModeParameters::new(inner.mode.clone()).has_squelch()
            && inner.squelch > 0.0
            && block.snr < inner.squelch;
        let volume = inner.player.volume();
        if squelched {
            block.left.fill(0.0);
            block.right.fill(0.0);
        } else if volume != 1.0 {
            for sample in block.left.iter_mut().chain(block.right.iter_mut()) {
                *sample *= volume;
            }
        }
        inner.player.play(&block.left, &block.right);
    }
}
