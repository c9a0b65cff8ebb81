// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Radio control plane.
//!
//! The radio is OFF or PLAYING.  Commands arrive over a single-consumer
//! queue and each completes fully, including every awaited call into
//! the source, before the next begins.  While playing, two read
//! transfers stay in flight: while one waits on the source, the other's
//! block is handed to the receiver, and completions are drained
//! strictly in issue order.

pub mod pacing;
pub mod push;
pub mod receiver;
pub mod source;
pub mod spectrum;

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{error, info, warn};

use crate::error::{RadioError, RadioResult, SourceResult};
use crate::radio::receiver::SampleReceiver;
use crate::radio::source::{IqBlock, ParamValue, ReadHandle, SignalSource, SignalSourceProvider};

/// Number of read transfers kept in flight while playing.
pub const PARALLEL_BUFFERS: usize = 2;
/// Default receiver callback rate.
pub const DEFAULT_BUFFERS_PER_SECOND: u32 = 20;

/// State notifications emitted by the radio.
#[derive(Debug, Clone, PartialEq)]
pub enum RadioEvent {
    Started,
    Stopped,
    Error(String),
}

/// Read-only view of the radio state, returned by every command.
#[derive(Debug, Clone, Serialize)]
pub struct RadioSnapshot {
    pub playing: bool,
    pub frequency: i64,
    pub sample_rate: u32,
    pub parameters: BTreeMap<String, ParamValue>,
}

#[derive(Debug, Clone)]
enum RadioCommand {
    Start,
    Stop,
    SetFrequency(i64),
    SetParameter(String, ParamValue),
    SetSampleRate(u32),
    Snapshot,
}

struct RadioRequest {
    cmd: RadioCommand,
    respond_to: oneshot::Sender<RadioResult<RadioSnapshot>>,
}

#[derive(Debug, Clone)]
pub struct RadioConfig {
    /// Sample rate requested from the source on the next start.
    pub sample_rate: u32,
    pub frequency: i64,
    pub buffers_per_second: u32,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1_024_000,
            frequency: 93_900_000,
            buffers_per_second: DEFAULT_BUFFERS_PER_SECOND,
        }
    }
}

/// Handle to a running radio task.  Clones share the same task.
#[derive(Clone)]
pub struct Radio {
    cmd_tx: mpsc::Sender<RadioRequest>,
    event_tx: broadcast::Sender<RadioEvent>,
}

impl Radio {
    /// Spawn the radio task.  Must be called inside a tokio runtime.
    pub fn launch(
        provider: Box<dyn SignalSourceProvider>,
        receiver: Box<dyn SampleReceiver>,
        config: RadioConfig,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (event_tx, _) = broadcast::channel(32);
        let task = RadioTask {
            provider,
            receiver,
            event_tx: event_tx.clone(),
            playing: false,
            source: None,
            sample_rate: config.sample_rate.max(1),
            active_rate: config.sample_rate.max(1),
            frequency: config.frequency,
            buffers_per_second: config.buffers_per_second.max(1),
            parameters: BTreeMap::new(),
            inflight: VecDeque::new(),
            buffers_wanted: 0,
            samples_per_buffer: 0,
        };
        tokio::spawn(task.run(cmd_rx));
        Self { cmd_tx, event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RadioEvent> {
        self.event_tx.subscribe()
    }

    async fn send(&self, cmd: RadioCommand) -> RadioResult<RadioSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(RadioRequest {
                cmd,
                respond_to: tx,
            })
            .await
            .map_err(|_| RadioError::ChannelClosed)?;
        rx.await.map_err(|_| RadioError::ChannelClosed)?
    }

    pub async fn start(&self) -> RadioResult<RadioSnapshot> {
        self.send(RadioCommand::Start).await
    }

    pub async fn stop(&self) -> RadioResult<RadioSnapshot> {
        self.send(RadioCommand::Stop).await
    }

    pub async fn set_frequency(&self, frequency_hz: i64) -> RadioResult<RadioSnapshot> {
        self.send(RadioCommand::SetFrequency(frequency_hz)).await
    }

    pub async fn set_parameter(
        &self,
        key: impl Into<String>,
        value: ParamValue,
    ) -> RadioResult<RadioSnapshot> {
        self.send(RadioCommand::SetParameter(key.into(), value))
            .await
    }

    /// Takes effect on the next start.
    pub async fn set_sample_rate(&self, sample_rate: u32) -> RadioResult<RadioSnapshot> {
        self.send(RadioCommand::SetSampleRate(sample_rate)).await
    }

    pub async fn snapshot(&self) -> RadioResult<RadioSnapshot> {
        self.send(RadioCommand::Snapshot).await
    }

    pub async fn get_frequency(&self) -> RadioResult<i64> {
        Ok(self.snapshot().await?.frequency)
    }

    pub async fn get_parameter(&self, key: &str) -> RadioResult<Option<ParamValue>> {
        Ok(self.snapshot().await?.parameters.get(key).cloned())
    }
}

struct RadioTask {
    provider: Box<dyn SignalSourceProvider>,
    receiver: Box<dyn SampleReceiver>,
    event_tx: broadcast::Sender<RadioEvent>,
    playing: bool,
    source: Option<Box<dyn SignalSource>>,
    /// Rate requested on the next start.
    sample_rate: u32,
    /// Rate the current source adopted.
    active_rate: u32,
    frequency: i64,
    buffers_per_second: u32,
    parameters: BTreeMap<String, ParamValue>,
    inflight: VecDeque<ReadHandle>,
    buffers_wanted: usize,
    samples_per_buffer: usize,
}

async fn next_block(inflight: &mut VecDeque<ReadHandle>) -> SourceResult<IqBlock> {
    match inflight.front_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

impl RadioTask {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<RadioRequest>) {
        loop {
            tokio::select! {
                maybe_req = cmd_rx.recv() => {
                    match maybe_req {
                        Some(req) => {
                            let result = self.handle(req.cmd).await;
                            let _ = req.respond_to.send(result);
                        }
                        None => break,
                    }
                }
                outcome = next_block(&mut self.inflight),
                    if self.playing && !self.inflight.is_empty() =>
                {
                    self.on_block(outcome).await;
                }
            }
        }
        // Handle dropped: shut the stream down before the task exits.
        if self.playing {
            self.halt().await;
        }
    }

    fn emit(&self, event: RadioEvent) {
        let _ = self.event_tx.send(event);
    }

    fn snapshot(&self) -> RadioSnapshot {
        RadioSnapshot {
            playing: self.playing,
            frequency: self.frequency,
            sample_rate: self.sample_rate,
            parameters: self.parameters.clone(),
        }
    }

    async fn handle(&mut self, cmd: RadioCommand) -> RadioResult<RadioSnapshot> {
        match cmd {
            RadioCommand::Start => self.start().await,
            RadioCommand::Stop => {
                self.halt().await;
                Ok(self.snapshot())
            }
            RadioCommand::SetFrequency(frequency_hz) => {
                self.frequency = frequency_hz;
                if let Some(source) = self.source.as_mut() {
                    match source.set_center_frequency(frequency_hz).await {
                        Ok(actual) => self.frequency = actual,
                        Err(err) => {
                            warn!(%err, frequency_hz, "retune failed");
                            self.emit(RadioEvent::Error(err.to_string()));
                        }
                    }
                }
                Ok(self.snapshot())
            }
            RadioCommand::SetParameter(key, value) => {
                // Keep the requested value so it can be replayed after
                // a source change even if this source ignores it.
                self.parameters.insert(key.clone(), value.clone());
                if let Some(source) = self.source.as_mut() {
                    match source.set_parameter(&key, value).await {
                        Ok(Some(adopted)) => {
                            self.parameters.insert(key, adopted);
                        }
                        Ok(None) => {}
                        Err(err) => {
                            warn!(%err, key = %key, "parameter change failed");
                            self.emit(RadioEvent::Error(err.to_string()));
                        }
                    }
                }
                Ok(self.snapshot())
            }
            RadioCommand::SetSampleRate(sample_rate) => {
                self.sample_rate = sample_rate.max(1);
                Ok(self.snapshot())
            }
            RadioCommand::Snapshot => Ok(self.snapshot()),
        }
    }

    async fn start(&mut self) -> RadioResult<RadioSnapshot> {
        if self.playing {
            return Ok(self.snapshot());
        }
        let mut source = self.provider.get();

        let setup: SourceResult<()> = async {
            let rate = source.set_sample_rate(self.sample_rate).await?;
            self.active_rate = rate;
            let frequency = source.set_center_frequency(self.frequency).await?;
            self.frequency = frequency;
            let entries: Vec<(String, ParamValue)> = self
                .parameters
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            for (key, value) in entries {
                if let Some(adopted) = source.set_parameter(&key, value).await? {
                    self.parameters.insert(key, adopted);
                }
            }
            source.start_receiving().await?;
            Ok(())
        }
        .await;

        if let Err(err) = setup {
            error!(%err, "source setup failed");
            let _ = source.close().await;
            self.emit(RadioEvent::Error(err.to_string()));
            return Err(err.into());
        }

        self.receiver.set_sample_rate(self.active_rate);
        // Round up to 512-sample multiples for hardware friendliness.
        let granularity = self.buffers_per_second as usize * 512;
        self.samples_per_buffer =
            512 * ((self.active_rate as usize + granularity - 1) / granularity);
        self.buffers_wanted = PARALLEL_BUFFERS;
        self.inflight.clear();
        for _ in 0..PARALLEL_BUFFERS {
            match source.read_samples(self.samples_per_buffer) {
                Ok(handle) => self.inflight.push_back(handle),
                Err(err) => {
                    error!(%err, "initial read failed");
                    let _ = source.close().await;
                    self.inflight.clear();
                    self.emit(RadioEvent::Error(err.to_string()));
                    return Err(err.into());
                }
            }
        }
        self.source = Some(source);
        self.playing = true;
        info!(
            rate = self.active_rate,
            frequency = self.frequency,
            samples_per_buffer = self.samples_per_buffer,
            "radio started"
        );
        self.emit(RadioEvent::Started);
        Ok(self.snapshot())
    }

    async fn on_block(&mut self, outcome: SourceResult<IqBlock>) {
        self.inflight.pop_front();
        match outcome {
            Ok(block) => {
                self.receiver.receive(
                    &block.i,
                    &block.q,
                    block.frequency,
                    block.data.as_deref(),
                );
                if self.playing && self.inflight.len() < self.buffers_wanted {
                    let issued = match self.source.as_mut() {
                        Some(source) => source.read_samples(self.samples_per_buffer),
                        None => return,
                    };
                    match issued {
                        Ok(handle) => self.inflight.push_back(handle),
                        Err(err) => {
                            error!(%err, "failed to issue read");
                            self.emit(RadioEvent::Error(err.to_string()));
                            self.halt().await;
                        }
                    }
                }
            }
            Err(err) => {
                // Radio-initiated teardown drains in-flight reads inside
                // `halt`, so a failure here means the source gave up on
                // its own, cancellation included.
                error!(%err, "source read failed");
                self.emit(RadioEvent::Error(err.to_string()));
                self.halt().await;
            }
        }
    }

    /// Orderly shutdown: stop issuing reads, drain what is in flight,
    /// close the source.
    async fn halt(&mut self) {
        self.buffers_wanted = 0;
        while let Some(mut handle) = self.inflight.pop_front() {
            if let Ok(block) = (&mut handle).await {
                self.receiver.receive(
                    &block.i,
                    &block.q,
                    block.frequency,
                    block.data.as_deref(),
                );
            }
        }
        if let Some(mut source) = self.source.take() {
            let _ = source.close().await;
        }
        if self.playing {
            self.playing = false;
            info!("radio stopped");
            self.emit(RadioEvent::Stopped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::error::SourceError;
    use crate::radio::source::{ready, PendingReads, SourceFuture, PENDING_READ_CAPACITY};

    type CallLog = Arc<Mutex<Vec<String>>>;

    /// Source that records every call and answers configured values
    /// verbatim; reads resolve immediately with silence.
    struct MockSource {
        log: CallLog,
        pending: PendingReads,
        frequency: i64,
        closed: bool,
    }

    impl MockSource {
        fn new(log: CallLog) -> Self {
            Self {
                log,
                pending: PendingReads::new(PENDING_READ_CAPACITY),
                frequency: 0,
                closed: false,
            }
        }

        fn record(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }
    }

    impl SignalSource for MockSource {
        fn set_sample_rate(&mut self, sample_rate: u32) -> SourceFuture<'_, u32> {
            self.record(format!("set_sample_rate {sample_rate}"));
            ready(Ok(sample_rate))
        }

        fn set_center_frequency(&mut self, frequency_hz: i64) -> SourceFuture<'_, i64> {
            self.record(format!("set_center_frequency {frequency_hz}"));
            self.frequency = frequency_hz;
            ready(Ok(frequency_hz))
        }

        fn set_parameter(
            &mut self,
            key: &str,
            value: ParamValue,
        ) -> SourceFuture<'_, Option<ParamValue>> {
            self.record(format!("set_parameter {key}={value}"));
            ready(Ok(Some(value)))
        }

        fn start_receiving(&mut self) -> SourceFuture<'_, ()> {
            self.record("start_receiving".to_string());
            ready(Ok(()))
        }

        fn read_samples(&mut self, len: usize) -> crate::SourceResult<ReadHandle> {
            if self.closed {
                return Err(SourceError::TransferCanceled);
            }
            let handle = self.pending.add(len)?;
            self.pending.resolve(IqBlock {
                i: vec![0.0; len],
                q: vec![0.0; len],
                frequency: self.frequency,
                data: None,
            });
            Ok(handle)
        }

        fn close(&mut self) -> SourceFuture<'_, ()> {
            self.record("close".to_string());
            self.closed = true;
            self.pending.cancel();
            ready(Ok(()))
        }
    }

    struct CountingReceiver {
        blocks: Arc<Mutex<usize>>,
    }

    impl SampleReceiver for CountingReceiver {
        fn set_sample_rate(&mut self, _sample_rate: u32) {}

        fn receive(&mut self, i: &[f32], q: &[f32], _frequency: i64, _data: Option<&[u8]>) {
            assert_eq!(i.len(), q.len());
            *self.blocks.lock().unwrap() += 1;
        }
    }

    fn launch_mock(log: CallLog, blocks: Arc<Mutex<usize>>) -> Radio {
        let provider = move || -> Box<dyn SignalSource> { Box::new(MockSource::new(log.clone())) };
        Radio::launch(
            Box::new(provider),
            Box::new(CountingReceiver { blocks }),
            RadioConfig {
                sample_rate: 48_000,
                frequency: 0,
                buffers_per_second: 20,
            },
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn commands_apply_in_submission_order() {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let radio = launch_mock(log.clone(), Arc::new(Mutex::new(0)));

        radio.set_frequency(1_000_000).await.unwrap();
        radio
            .set_parameter("gain", serde_json::json!(3))
            .await
            .unwrap();
        radio.start().await.unwrap();

        assert_eq!(radio.get_frequency().await.unwrap(), 1_000_000);
        assert_eq!(
            radio.get_parameter("gain").await.unwrap(),
            Some(serde_json::json!(3))
        );

        radio.stop().await.unwrap();
        let entries = log.lock().unwrap().clone();
        let freq_pos = entries
            .iter()
            .position(|e| e.starts_with("set_center_frequency"))
            .expect("frequency call missing");
        let param_pos = entries
            .iter()
            .position(|e| e.starts_with("set_parameter"))
            .expect("parameter call missing");
        let start_pos = entries
            .iter()
            .position(|e| e == "start_receiving")
            .expect("start call missing");
        assert!(freq_pos < param_pos, "frequency must apply before parameter");
        assert!(param_pos < start_pos, "parameters replay before streaming");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_set_frequency_start_leaves_radio_playing_at_f() {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let radio = launch_mock(log.clone(), Arc::new(Mutex::new(0)));

        radio.start().await.unwrap();
        radio.stop().await.unwrap();
        radio.set_frequency(7_100_000).await.unwrap();
        let snapshot = radio.start().await.unwrap();
        assert!(snapshot.playing);
        assert_eq!(snapshot.frequency, 7_100_000);
        radio.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocks_flow_to_the_receiver_until_stop() {
        let blocks = Arc::new(Mutex::new(0));
        let radio = launch_mock(Arc::new(Mutex::new(Vec::new())), blocks.clone());
        let mut events = radio.subscribe();

        radio.start().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), RadioEvent::Started);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        radio.stop().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), RadioEvent::Stopped);

        let delivered = *blocks.lock().unwrap();
        assert!(delivered > 2, "expected a stream of blocks, got {delivered}");
        let after_stop = delivered;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(*blocks.lock().unwrap(), after_stop, "stop must end delivery");
    }

    /// Source whose reads are canceled by the source itself: every
    /// handle rejects with transfer-canceled without the radio asking.
    struct SelfCancelingSource {
        pending: PendingReads,
    }

    impl SignalSource for SelfCancelingSource {
        fn set_sample_rate(&mut self, sample_rate: u32) -> SourceFuture<'_, u32> {
            ready(Ok(sample_rate))
        }

        fn set_center_frequency(&mut self, frequency_hz: i64) -> SourceFuture<'_, i64> {
            ready(Ok(frequency_hz))
        }

        fn set_parameter(
            &mut self,
            _key: &str,
            value: ParamValue,
        ) -> SourceFuture<'_, Option<ParamValue>> {
            ready(Ok(Some(value)))
        }

        fn start_receiving(&mut self) -> SourceFuture<'_, ()> {
            ready(Ok(()))
        }

        fn read_samples(&mut self, len: usize) -> crate::SourceResult<ReadHandle> {
            let handle = self.pending.add(len)?;
            self.pending.cancel();
            Ok(handle)
        }

        fn close(&mut self) -> SourceFuture<'_, ()> {
            ready(Ok(()))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unprompted_cancellation_surfaces_an_error_and_stops() {
        let provider = || -> Box<dyn SignalSource> {
            Box::new(SelfCancelingSource {
                pending: PendingReads::new(PENDING_READ_CAPACITY),
            })
        };
        let radio = Radio::launch(
            Box::new(provider),
            Box::new(CountingReceiver {
                blocks: Arc::new(Mutex::new(0)),
            }),
            RadioConfig {
                sample_rate: 48_000,
                frequency: 0,
                buffers_per_second: 20,
            },
        );
        let mut events = radio.subscribe();

        radio.start().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), RadioEvent::Started);
        assert!(
            matches!(events.recv().await.unwrap(), RadioEvent::Error(_)),
            "cancellation must surface as an error event"
        );
        assert_eq!(events.recv().await.unwrap(), RadioEvent::Stopped);

        let snapshot = radio.snapshot().await.unwrap();
        assert!(!snapshot.playing, "radio must transition toward OFF");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sample_rate_change_applies_on_next_start() {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let radio = launch_mock(log.clone(), Arc::new(Mutex::new(0)));

        radio.start().await.unwrap();
        radio.set_sample_rate(96_000).await.unwrap();
        radio.stop().await.unwrap();
        radio.start().await.unwrap();
        radio.stop().await.unwrap();

        let entries = log.lock().unwrap().clone();
        let rates: Vec<&String> = entries
            .iter()
            .filter(|e| e.starts_with("set_sample_rate"))
            .collect();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0], "set_sample_rate 48000");
        assert_eq!(rates[1], "set_sample_rate 96000");
    }
}
