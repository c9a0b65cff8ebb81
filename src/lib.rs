// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Real-time software-defined-radio demodulation.
//!
//! Given a stream of complex baseband samples at an arbitrary rate,
//! this crate produces demodulated audio for WBFM (with pilot-locked
//! stereo), NBFM, AM, SSB and CW, along with a per-block signal
//! quality indicator and a spectrum view over the same stream.
//!
//! Three layers:
//!
//! - [`dsp`] — filters, FFT, frequency shifting, pilot detection,
//!   decimation.
//! - [`demod`] — per-scheme pipelines behind a mode registry, and the
//!   [`Demodulator`] that plugs into the radio as a receiver.
//! - [`radio`] — the control plane: a command-serialized state machine
//!   driving a [`SignalSource`] with pipelined reads, fanning blocks
//!   out to [`SampleReceiver`]s.
//!
//! Audio leaves through the [`Player`] sink; samples come in through a
//! [`SignalSource`] (real-time paced, push-driven, or an immediate
//! generator for offline work).

pub mod demod;
pub mod dsp;
mod error;
pub mod modulate;
pub mod player;
pub mod radio;

pub use demod::{
    AudioBlock, Demodulator, Mode, ModeParameters, ModeRegistry, SchemePipeline, Scheme,
};
pub use error::{RadioError, RadioResult, SourceError, SourceResult};
pub use player::{CapturePlayer, NullPlayer, Player};
pub use radio::pacing::{PacingSource, SampleGenerator};
pub use radio::push::{GeneratorSource, PushSource};
pub use radio::receiver::{CompositeReceiver, SampleCounter, SampleReceiver};
pub use radio::source::{
    IqBlock, ParamValue, PendingReads, ReadHandle, SignalSource, SignalSourceProvider,
};
pub use radio::spectrum::SpectrumReceiver;
pub use radio::{Radio, RadioConfig, RadioEvent, RadioSnapshot, PARALLEL_BUFFERS};
