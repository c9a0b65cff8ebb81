// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sample receivers: the sink contract, ordered fan-out and the
//! periodic tick counter.

use tokio::sync::broadcast;

/// Consumes I/Q blocks from the radio.
///
/// `set_sample_rate` is called at stream start and on rate changes;
/// `receive` once per block.  Buffer slices are borrowed for the span
/// of the call; receivers copy what they need to retain.
pub trait SampleReceiver: Send {
    fn set_sample_rate(&mut self, sample_rate: u32);

    fn receive(&mut self, i: &[f32], q: &[f32], frequency: i64, data: Option<&[u8]>);
}

/// Broadcasts both receiver methods to an ordered list of children.
/// No error isolation: a panic in one child propagates.
#[derive(Default)]
pub struct CompositeReceiver {
    children: Vec<Box<dyn SampleReceiver>>,
}

impl CompositeReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, child: Box<dyn SampleReceiver>) {
        self.children.push(child);
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl SampleReceiver for CompositeReceiver {
    fn set_sample_rate(&mut self, sample_rate: u32) {
        for child in &mut self.children {
            child.set_sample_rate(sample_rate);
        }
    }

    fn receive(&mut self, i: &[f32], q: &[f32], frequency: i64, data: Option<&[u8]>) {
        for child in &mut self.children {
            child.receive(i, q, frequency, data);
        }
    }
}

/// Emits a tick every `sample_rate / ticks_per_second` received
/// samples.  Counter and threshold reset together on sample-rate
/// changes.
pub struct SampleCounter {
    ticks_per_second: u32,
    threshold: u64,
    count: u64,
    ticks: u64,
    tick_tx: broadcast::Sender<u64>,
}

impl SampleCounter {
    pub fn new(ticks_per_second: u32) -> Self {
        let (tick_tx, _) = broadcast::channel(64);
        Self {
            ticks_per_second: ticks_per_second.max(1),
            threshold: 0,
            count: 0,
            ticks: 0,
            tick_tx,
        }
    }

    /// Subscribe to tick numbers.
    pub fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.tick_tx.subscribe()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl SampleReceiver for SampleCounter {
    fn set_sample_rate(&mut self, sample_rate: u32) {
        self.threshold = (sample_rate / self.ticks_per_second).max(1) as u64;
        self.count = 0;
        self.ticks = 0;
    }

    fn receive(&mut self, i: &[f32], _q: &[f32], _frequency: i64, _data: Option<&[u8]>) {
        if self.threshold == 0 {
            return;
        }
        self.count += i.len() as u64;
        let due = self.count / self.threshold;
        while self.ticks < due {
            self.ticks += 1;
            let _ = self.tick_tx.send(self.ticks);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        rates: Vec<u32>,
        blocks: usize,
    }

    impl SampleReceiver for Recorder {
        fn set_sample_rate(&mut self, sample_rate: u32) {
            self.rates.push(sample_rate);
        }

        fn receive(&mut self, _i: &[f32], _q: &[f32], _f: i64, _d: Option<&[u8]>) {
            self.blocks += 1;
        }
    }

    #[test]
    fn composite_broadcasts_in_order() {
        use std::sync::{Arc, Mutex};

        let log: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        struct Tagged(u32, Arc<Mutex<Vec<u32>>>);
        impl SampleReceiver for Tagged {
            fn set_sample_rate(&mut self, _r: u32) {}
            fn receive(&mut self, _i: &[f32], _q: &[f32], _f: i64, _d: Option<&[u8]>) {
                self.1.lock().unwrap().push(self.0);
            }
        }

        let mut composite = CompositeReceiver::new();
        composite.push(Box::new(Tagged(1, log.clone())));
        composite.push(Box::new(Tagged(2, log.clone())));
        composite.push(Box::new(Tagged(3, log.clone())));
        composite.receive(&[0.0], &[0.0], 0, None);
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn composite_forwards_sample_rate() {
        let mut composite = CompositeReceiver::new();
        composite.push(Box::new(Recorder {
            rates: Vec::new(),
            blocks: 0,
        }));
        composite.set_sample_rate(96_000);
        composite.receive(&[0.0; 4], &[0.0; 4], 0, None);
        assert_eq!(composite.len(), 1);
    }

    #[test]
    fn counter_ticks_at_the_configured_rate() {
        let mut counter = SampleCounter::new(10);
        let mut rx = counter.subscribe();
        counter.set_sample_rate(48_000);
        // 4_800 samples per tick; 12_000 samples = 2 ticks.
        counter.receive(&vec![0.0; 7_000], &vec![0.0; 7_000], 0, None);
        counter.receive(&vec![0.0; 5_000], &vec![0.0; 5_000], 0, None);
        assert_eq!(counter.ticks(), 2);
        assert_eq!(rx.try_recv().unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap(), 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn counter_resets_on_rate_change() {
        let mut counter = SampleCounter::new(10);
        counter.set_sample_rate(48_000);
        counter.receive(&vec![0.0; 4_000], &vec![0.0; 4_000], 0, None);
        counter.set_sample_rate(10_000);
        assert_eq!(counter.ticks(), 0);
        counter.receive(&vec![0.0; 1_000], &vec![0.0; 1_000], 0, None);
        assert_eq!(counter.ticks(), 1);
    }
}
