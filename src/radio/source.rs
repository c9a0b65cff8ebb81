// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! The signal-source contract and the shared pending-read ring.
//!
//! Sources deliver I/Q blocks on demand.  Configuration calls return
//! boxed futures so implementations are free to await hardware; reads
//! enqueue synchronously into a bounded FIFO and hand back an
//! awaitable, which is how several reads stay in flight while still
//! resolving strictly in issue order.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{SourceError, SourceResult};

/// One block of captured samples.
///
/// `i` and `q` always have equal length.  `frequency` is the center
/// frequency that was tuned when these samples were produced.  `data`
/// carries opaque side-channel bytes from the capture device, if any.
#[derive(Debug, Clone)]
pub struct IqBlock {
    pub i: Vec<f32>,
    pub q: Vec<f32>,
    pub frequency: i64,
    pub data: Option<Vec<u8>>,
}

/// Untyped source parameter value.
pub type ParamValue = serde_json::Value;

/// Boxed future returned by source configuration calls.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = SourceResult<T>> + Send + 'a>>;

pub(crate) fn ready<T: Send + 'static>(value: SourceResult<T>) -> SourceFuture<'static, T> {
    Box::pin(std::future::ready(value))
}

/// An in-flight read.  Resolves when the source delivers the block;
/// if the source drops the pending ring, the read fails with
/// [`SourceError::TransferCanceled`].
#[derive(Debug)]
pub struct ReadHandle {
    rx: oneshot::Receiver<SourceResult<IqBlock>>,
}

impl Future for ReadHandle {
    type Output = SourceResult<IqBlock>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(SourceError::TransferCanceled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Contract every sample source implements.
///
/// All methods may fail with [`SourceError::TransferCanceled`] once the
/// source is closed.  Reads resolve in FIFO order of issuance no matter
/// how many are in flight.
pub trait SignalSource: Send {
    /// Request a sample rate; returns the rate actually adopted.
    fn set_sample_rate(&mut self, sample_rate: u32) -> SourceFuture<'_, u32>;

    /// Tune the center frequency; the source may snap and report the
    /// effective value.
    fn set_center_frequency(&mut self, frequency_hz: i64) -> SourceFuture<'_, i64>;

    /// Apply a source-specific parameter.  Returns the value actually
    /// adopted, or `None` for unknown keys.
    fn set_parameter(&mut self, key: &str, value: ParamValue)
        -> SourceFuture<'_, Option<ParamValue>>;

    /// Begin streaming.  Reads issued before this may stay pending.
    fn start_receiving(&mut self) -> SourceFuture<'_, ()>;

    /// Enqueue a read of `len` samples.  Fails synchronously with
    /// [`SourceError::TooManyReads`] when the pending ring is full.
    fn read_samples(&mut self, len: usize) -> SourceResult<ReadHandle>;

    /// Close the source; all pending reads reject with
    /// [`SourceError::TransferCanceled`].
    fn close(&mut self) -> SourceFuture<'_, ()>;
}

/// Hands the radio a freshly initialized source per start.
pub trait SignalSourceProvider: Send {
    fn get(&mut self) -> Box<dyn SignalSource>;
}

impl<F> SignalSourceProvider for F
where
    F: FnMut() -> Box<dyn SignalSource> + Send,
{
    fn get(&mut self) -> Box<dyn SignalSource> {
        (self)()
    }
}

/// Default pending-read ring capacity.
pub const PENDING_READ_CAPACITY: usize = 8;

struct PendingRead {
    len: usize,
    respond_to: oneshot::Sender<SourceResult<IqBlock>>,
}

/// Fixed-capacity FIFO of outstanding reads.
///
/// `add` enqueues and fails synchronously when full; `resolve`
/// dequeues in FIFO order; `cancel` rejects everything with
/// transfer-canceled.
pub struct PendingReads {
    queue: VecDeque<PendingRead>,
    capacity: usize,
}

impl PendingReads {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Requested length of the oldest outstanding read.
    pub fn front_len(&self) -> Option<usize> {
        self.queue.front().map(|read| read.len)
    }

    pub fn add(&mut self, len: usize) -> SourceResult<ReadHandle> {
        if self.queue.len() >= self.capacity {
            return Err(SourceError::TooManyReads);
        }
        let (tx, rx) = oneshot::channel();
        self.queue.push_back(PendingRead {
            len,
            respond_to: tx,
        });
        Ok(ReadHandle { rx })
    }

    /// Resolve the oldest read with `block`.  Returns false when no
    /// read was pending.
    pub fn resolve(&mut self, block: IqBlock) -> bool {
        match self.queue.pop_front() {
            Some(read) => {
                let _ = read.respond_to.send(Ok(block));
                true
            }
            None => false,
        }
    }

    /// Reject every outstanding read with transfer-canceled.
    pub fn cancel(&mut self) {
        for read in self.queue.drain(..) {
            let _ = read.respond_to.send(Err(SourceError::TransferCanceled));
        }
    }
}

impl Drop for PendingReads {
    fn drop(&mut self) {
        self.cancel();
    }
}
