// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Real-time pacing source.
//!
//! Wraps an offline sample generator that can produce any number of
//! samples instantly, and meters them out against the wall clock so
//! the stream behaves like live capture.  A periodic tick advances a
//! virtual stream position `cur_sample = elapsed * sample_rate`; reads
//! resolve once the wall clock has "produced" enough samples, and the
//! internal rings top up whenever no reads are waiting.  Delivered
//! blocks are always a contiguous region of the infinite stream.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::dsp::buffer::SampleRing;
use crate::error::{SourceError, SourceResult};
use crate::radio::source::{
    ready, IqBlock, ParamValue, PendingReads, ReadHandle, SignalSource, SourceFuture,
    PENDING_READ_CAPACITY,
};

/// Fills the I and Q slices with the next samples of an endless
/// stream, carrying its own phase state across calls.
pub type SampleGenerator = Box<dyn FnMut(&mut [f32], &mut [f32]) + Send>;

const TICK_INTERVAL: Duration = Duration::from_millis(10);

fn ring_capacity(sample_rate: u32) -> usize {
    (sample_rate as usize / 10).max(65_536)
}

struct PacingShared {
    generator: SampleGenerator,
    ring_i: SampleRing,
    ring_q: SampleRing,
    pending: PendingReads,
    sample_rate: u32,
    frequency: i64,
    started_at: Option<Instant>,
    /// Samples handed to readers since start.
    delivered: u64,
    closed: bool,
    scratch_i: Vec<f32>,
    scratch_q: Vec<f32>,
}

impl PacingShared {
    fn generate(&mut self, count: usize) {
        self.scratch_i.resize(count, 0.0);
        self.scratch_q.resize(count, 0.0);
        (self.generator)(&mut self.scratch_i[..count], &mut self.scratch_q[..count]);
        self.ring_i.store(&self.scratch_i[..count]);
        self.ring_q.store(&self.scratch_q[..count]);
    }

    fn on_tick(&mut self) {
        let Some(started_at) = self.started_at else {
            return;
        };
        let elapsed = started_at.elapsed().as_secs_f64();
        let cur_sample = (elapsed * self.sample_rate as f64) as u64;

        if self.pending.is_empty() {
            let free = self.ring_i.capacity() - self.ring_i.readable();
            if free > 0 {
                self.generate(free);
            }
            return;
        }

        while let Some(len) = self.pending.front_len() {
            if self.delivered + len as u64 > cur_sample {
                break;
            }
            // Demand outran the buffered stream: refill mid-drain and
            // accept the jitter.
            let short = len.saturating_sub(self.ring_i.readable());
            if short > 0 {
                self.generate(short);
            }
            let mut block = IqBlock {
                i: vec![0.0; len],
                q: vec![0.0; len],
                frequency: self.frequency,
                data: None,
            };
            self.ring_i.move_to(&mut block.i);
            self.ring_q.move_to(&mut block.q);
            self.delivered += len as u64;
            self.pending.resolve(block);
        }
    }
}

/// A [`SignalSource`] clocked to wall time over an offline generator.
pub struct PacingSource {
    shared: Arc<Mutex<PacingShared>>,
    tick: Option<tokio::task::JoinHandle<()>>,
}

impl PacingSource {
    pub fn new(sample_rate: u32, frequency: i64, generator: SampleGenerator) -> Self {
        let capacity = ring_capacity(sample_rate);
        let shared = PacingShared {
            generator,
            ring_i: SampleRing::new(capacity),
            ring_q: SampleRing::new(capacity),
            pending: PendingReads::new(PENDING_READ_CAPACITY),
            sample_rate: sample_rate.max(1),
            frequency,
            started_at: None,
            delivered: 0,
            closed: false,
            scratch_i: Vec::new(),
            scratch_q: Vec::new(),
        };
        Self {
            shared: Arc::new(Mutex::new(shared)),
            tick: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PacingShared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SignalSource for PacingSource {
    fn set_sample_rate(&mut self, sample_rate: u32) -> SourceFuture<'_, u32> {
        let mut shared = self.lock();
        if shared.closed {
            return ready(Err(SourceError::TransferCanceled));
        }
        let rate = sample_rate.max(1);
        shared.sample_rate = rate;
        let capacity = ring_capacity(rate);
        shared.ring_i = SampleRing::new(capacity);
        shared.ring_q = SampleRing::new(capacity);
        ready(Ok(rate))
    }

    fn set_center_frequency(&mut self, frequency_hz: i64) -> SourceFuture<'_, i64> {
        let mut shared = self.lock();
        if shared.closed {
            return ready(Err(SourceError::TransferCanceled));
        }
        shared.frequency = frequency_hz;
        ready(Ok(frequency_hz))
    }

    fn set_parameter(
        &mut self,
        _key: &str,
        _value: ParamValue,
    ) -> SourceFuture<'_, Option<ParamValue>> {
        if self.lock().closed {
            return ready(Err(SourceError::TransferCanceled));
        }
        ready(Ok(None))
    }

    fn start_receiving(&mut self) -> SourceFuture<'_, ()> {
        {
            let mut shared = self.lock();
            if shared.closed {
                return ready(Err(SourceError::TransferCanceled));
            }
            shared.started_at = Some(Instant::now());
            shared.delivered = 0;
        }
        let shared = Arc::clone(&self.shared);
        self.tick = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;
                let mut guard = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                if guard.closed {
                    break;
                }
                guard.on_tick();
            }
        }));
        tracing::debug!("pacing source started");
        ready(Ok(()))
    }

    fn read_samples(&mut self, len: usize) -> SourceResult<ReadHandle> {
        let mut shared = self.lock();
        if shared.closed {
            return Err(SourceError::TransferCanceled);
        }
        shared.pending.add(len)
    }

    fn close(&mut self) -> SourceFuture<'_, ()> {
        {
            let mut shared = self.lock();
            shared.closed = true;
            shared.started_at = None;
            shared.pending.cancel();
        }
        if let Some(tick) = self.tick.take() {
            tick.abort();
        }
        tracing::debug!("pacing source closed");
        ready(Ok(()))
    }
}

impl Drop for PacingSource {
    fn drop(&mut self) {
        if let Some(tick) = self.tick.take() {
            tick.abort();
        }
    }
}
