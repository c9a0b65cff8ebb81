// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Push-driven and immediate generator sources.

use crate::dsp::buffer::SampleRing;
use crate::error::{SourceError, SourceResult};
use crate::radio::pacing::SampleGenerator;
use crate::radio::source::{
    ready, IqBlock, ParamValue, PendingReads, ReadHandle, SignalSource, SourceFuture,
    PENDING_READ_CAPACITY,
};

const PUSH_RING_CAPACITY: usize = 1 << 18;

/// Source fed by an external producer calling [`PushSource::push_samples`].
///
/// Pushed data resolves pending reads oldest-first, drawing from the
/// internal ring before the fresh samples; whatever is left over is
/// stored for the next read.
pub struct PushSource {
    ring_i: SampleRing,
    ring_q: SampleRing,
    pending: PendingReads,
    sample_rate: u32,
    frequency: i64,
    closed: bool,
}

impl PushSource {
    pub fn new(sample_rate: u32, frequency: i64) -> Self {
        Self {
            ring_i: SampleRing::new(PUSH_RING_CAPACITY),
            ring_q: SampleRing::new(PUSH_RING_CAPACITY),
            pending: PendingReads::new(PENDING_READ_CAPACITY),
            sample_rate: sample_rate.max(1),
            frequency,
            closed: false,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Feed samples in.  Resolves as many pending reads as the stored
    /// plus pushed data can satisfy; the remainder is buffered.
    pub fn push_samples(&mut self, i: &[f32], q: &[f32], frequency: Option<i64>) {
        debug_assert_eq!(i.len(), q.len());
        if self.closed {
            return;
        }
        if let Some(frequency) = frequency {
            self.frequency = frequency;
        }
        self.ring_i.store(i);
        self.ring_q.store(q);
        while let Some(len) = self.pending.front_len() {
            if self.ring_i.readable() < len {
                break;
            }
            let mut block = IqBlock {
                i: vec![0.0; len],
                q: vec![0.0; len],
                frequency: self.frequency,
                data: None,
            };
            self.ring_i.move_to(&mut block.i);
            self.ring_q.move_to(&mut block.q);
            self.pending.resolve(block);
        }
    }
}

impl SignalSource for PushSource {
    fn set_sample_rate(&mut self, sample_rate: u32) -> SourceFuture<'_, u32> {
        if self.closed {
            return ready(Err(SourceError::TransferCanceled));
        }
        self.sample_rate = sample_rate.max(1);
        ready(Ok(self.sample_rate))
    }

    fn set_center_frequency(&mut self, frequency_hz: i64) -> SourceFuture<'_, i64> {
        if self.closed {
            return ready(Err(SourceError::TransferCanceled));
        }
        self.frequency = frequency_hz;
        ready(Ok(frequency_hz))
    }

    fn set_parameter(
        &mut self,
        _key: &str,
        _value: ParamValue,
    ) -> SourceFuture<'_, Option<ParamValue>> {
        if self.closed {
            return ready(Err(SourceError::TransferCanceled));
        }
        ready(Ok(None))
    }

    fn start_receiving(&mut self) -> SourceFuture<'_, ()> {
        if self.closed {
            return ready(Err(SourceError::TransferCanceled));
        }
        ready(Ok(()))
    }

    fn read_samples(&mut self, len: usize) -> SourceResult<ReadHandle> {
        if self.closed {
            return Err(SourceError::TransferCanceled);
        }
        self.pending.add(len)
    }

    fn close(&mut self) -> SourceFuture<'_, ()> {
        self.closed = true;
        self.pending.cancel();
        ready(Ok(()))
    }
}

/// Source that fulfils every read immediately from an offline
/// generator, with no pacing.  Useful for tests and batch decoding.
pub struct GeneratorSource {
    generator: SampleGenerator,
    sample_rate: u32,
    frequency: i64,
    closed: bool,
    pending: PendingReads,
}

impl GeneratorSource {
    pub fn new(sample_rate: u32, frequency: i64, generator: SampleGenerator) -> Self {
        Self {
            generator,
            sample_rate: sample_rate.max(1),
            frequency,
            closed: false,
            pending: PendingReads::new(PENDING_READ_CAPACITY),
        }
    }
}

impl SignalSource for GeneratorSource {
    fn set_sample_rate(&mut self, sample_rate: u32) -> SourceFuture<'_, u32> {
        if self.closed {
            return ready(Err(SourceError::TransferCanceled));
        }
        self.sample_rate = sample_rate.max(1);
        ready(Ok(self.sample_rate))
    }

    fn set_center_frequency(&mut self, frequency_hz: i64) -> SourceFuture<'_, i64> {
        if self.closed {
            return ready(Err(SourceError::TransferCanceled));
        }
        self.frequency = frequency_hz;
        ready(Ok(frequency_hz))
    }

    fn set_parameter(
        &mut self,
        _key: &str,
        _value: ParamValue,
    ) -> SourceFuture<'_, Option<ParamValue>> {
        if self.closed {
            return ready(Err(SourceError::TransferCanceled));
        }
        ready(Ok(None))
    }

    fn start_receiving(&mut self) -> SourceFuture<'_, ()> {
        if self.closed {
            return ready(Err(SourceError::TransferCanceled));
        }
        ready(Ok(()))
    }

    fn read_samples(&mut self, len: usize) -> SourceResult<ReadHandle> {
        if self.closed {
            return Err(SourceError::TransferCanceled);
        }
        let handle = self.pending.add(len)?;
        let mut block = IqBlock {
            i: vec![0.0; len],
            q: vec![0.0; len],
            frequency: self.frequency,
            data: None,
        };
        (self.generator)(&mut block.i, &mut block.q);
        self.pending.resolve(block);
        Ok(handle)
    }

    fn close(&mut self) -> SourceFuture<'_, ()> {
        self.closed = true;
        self.pending.cancel();
        ready(Ok(()))
    }
}
