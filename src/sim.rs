//! A simulated streaming oscilloscope.
//!
//! Once started, a producer thread completes one block every
//! `record_length / sample_frequency` seconds into a bounded FIFO and raises
//! DataReady. When the consumer falls behind far enough to fill the FIFO the
//! scope raises DataOverflow and stops producing, like hardware losing samples.
//! Fetching synthesises a sine per channel for the popped block.

use std::{
    collections::VecDeque,
    f64::consts::TAU,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use thread_priority::{ThreadPriority, set_current_thread_priority};

use crate::{
    device::{self, DeviceSession},
    events::{EventSignal, EventSource},
};

pub const RESOLUTIONS: [u8; 4] = [8, 12, 14, 16];
const DEFAULT_RESOLUTION: u8 = 12;
const MAX_SAMPLE_FREQUENCY: f64 = 50e6;
const MAX_RECORD_LENGTH: u64 = 16 * 1024 * 1024;

/// Full scale input range in volts, symmetric around zero.
const RANGE: f64 = 1.0;
const AMPLITUDE: f64 = 0.8;
/// Samples per period of the channel 1 sine; channel n runs n times faster.
const WAVE_PERIOD: u64 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub serial_number: u32,
    pub channel_count: u16,
    /// Completed blocks the scope holds before overflowing.
    pub fifo_blocks: usize,
    /// Raise Removed instead of producing block `n`.
    pub remove_after: Option<u64>,
    /// Fail every fetch after `n` successful ones.
    pub fail_fetch_after: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            serial_number: 29513,
            channel_count: 4,
            fifo_blocks: 16,
            remove_after: None,
            fail_fetch_after: None,
        }
    }
}

#[derive(Debug, Default)]
struct Fifo {
    blocks: VecDeque<u64>,
    produced: u64,
}

#[derive(Debug, Clone, Default)]
struct Events {
    removed: Option<EventSource>,
    data_ready: Option<EventSource>,
    data_overflow: Option<EventSource>,
}

impl Events {
    fn slot(&mut self, signal: EventSignal) -> &mut Option<EventSource> {
        match signal {
            EventSignal::Removed => &mut self.removed,
            EventSignal::DataReady => &mut self.data_ready,
            EventSignal::DataOverflow => &mut self.data_overflow,
        }
    }

    fn notify(&self, signal: EventSignal) {
        let source = match signal {
            EventSignal::Removed => &self.removed,
            EventSignal::DataReady => &self.data_ready,
            EventSignal::DataOverflow => &self.data_overflow,
        };
        if let Some(source) = source {
            source.notify();
        }
    }
}

struct Producer {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct SimulatedScope {
    config: SimConfig,
    name: String,
    enabled: Vec<bool>,
    resolution: u8,
    sample_frequency: f64,
    record_length: u64,
    events: Events,
    fifo: Arc<Mutex<Fifo>>,
    producer: Option<Producer>,
    fetched: u64,
}

impl SimulatedScope {
    /// Opens the simulated scope; `serial_number` 0 opens it unconditionally.
    pub fn open(serial_number: u32, config: SimConfig) -> Result<Self, device::Error> {
        if serial_number != 0 && serial_number != config.serial_number {
            return Err(device::Error::NotFound(serial_number));
        }
        log::info!(
            "opened simulated scope {} with {} channels",
            config.serial_number,
            config.channel_count
        );

        Ok(Self {
            name: format!("SIM{}", config.channel_count),
            enabled: vec![true; usize::from(config.channel_count)],
            resolution: DEFAULT_RESOLUTION,
            sample_frequency: 1e6,
            record_length: 5000,
            events: Events::default(),
            fifo: Arc::new(Mutex::new(Fifo::default())),
            producer: None,
            fetched: 0,
            config,
        })
    }

    pub fn is_running(&self) -> bool {
        self.producer.is_some()
    }

    pub fn blocks_fetched(&self) -> u64 {
        self.fetched
    }

    fn spawn_producer(&self) -> Result<Producer, device::Error> {
        let stop = Arc::new(AtomicBool::new(false));
        let period = Duration::from_secs_f64(self.record_length as f64 / self.sample_frequency);
        let worker = Worker {
            fifo: self.fifo.clone(),
            events: self.events.clone(),
            stop: stop.clone(),
            period,
            depth: self.config.fifo_blocks,
            remove_after: self.config.remove_after,
        };
        log::debug!("producing a block every {:?}", period);

        let handle = thread::Builder::new()
            .name("sim-scope".to_string())
            .spawn(move || worker.run())
            .map_err(|err| device::Error::Status(format!("failed to spawn producer: {err}")))?;
        Ok(Producer { stop, handle })
    }

    /// Pops the oldest completed block, re-raising DataReady if more are queued.
    fn next_block(&mut self, offset: u64, length: u64) -> Result<u64, device::Error> {
        if self.producer.is_none() {
            return Err(device::Error::NotRunning);
        }
        let end = offset.saturating_add(length);
        if end > self.record_length {
            return Err(device::Error::InvalidRange {
                offset,
                end,
                record_length: self.record_length,
            });
        }
        if let Some(limit) = self.config.fail_fetch_after {
            if self.fetched >= limit {
                return Err(device::Error::Status(format!(
                    "simulated transfer error on block {}",
                    self.fetched + 1
                )));
            }
        }

        let (index, pending) = {
            let mut fifo = self
                .fifo
                .lock()
                .map_err(|_| device::Error::Status("producer thread panicked".to_string()))?;
            let index = fifo.blocks.pop_front().ok_or(device::Error::NoData)?;
            (index, !fifo.blocks.is_empty())
        };
        self.fetched += 1;
        if pending {
            self.events.notify(EventSignal::DataReady);
        }
        Ok(index)
    }

    fn is_enabled(&self, channel: usize) -> bool {
        self.enabled.get(channel).copied().unwrap_or(false)
    }
}

fn voltage(channel: usize, t: u64) -> f64 {
    let phase = (t * (channel as u64 + 1)) % WAVE_PERIOD;
    AMPLITUDE * (TAU * phase as f64 / WAVE_PERIOD as f64).sin()
}

struct Worker {
    fifo: Arc<Mutex<Fifo>>,
    events: Events,
    stop: Arc<AtomicBool>,
    period: Duration,
    depth: usize,
    remove_after: Option<u64>,
}

impl Worker {
    fn run(self) {
        if let Err(err) = set_current_thread_priority(ThreadPriority::Max) {
            log::debug!("could not raise producer priority: {:?}", err);
        }

        let mut deadline = Instant::now();
        loop {
            deadline += self.period;
            if !self.sleep_until(deadline) {
                break;
            }

            let Ok(mut fifo) = self.fifo.lock() else {
                break;
            };
            if self.remove_after == Some(fifo.produced) {
                drop(fifo);
                log::debug!("simulating device removal");
                self.events.notify(EventSignal::Removed);
                break;
            }
            if fifo.blocks.len() >= self.depth {
                drop(fifo);
                log::debug!("fifo full, dropping samples");
                self.events.notify(EventSignal::DataOverflow);
                break;
            }
            let index = fifo.produced;
            fifo.blocks.push_back(index);
            fifo.produced += 1;
            // Raised under the lock: a set DataReady flag always has a block
            // behind it by the time the consumer can pop.
            self.events.notify(EventSignal::DataReady);
        }
    }

    /// Returns false if asked to stop before `deadline`.
    fn sleep_until(&self, deadline: Instant) -> bool {
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::park_timeout(deadline - now);
        }
    }
}

impl DeviceSession for SimulatedScope {
    fn name(&self) -> &str {
        &self.name
    }

    fn serial_number(&self) -> u32 {
        self.config.serial_number
    }

    fn channel_count(&self) -> u16 {
        self.config.channel_count
    }

    fn set_channel_enabled(&mut self, channel: u16, enabled: bool) -> bool {
        match self.enabled.get_mut(usize::from(channel)) {
            Some(state) => {
                *state = enabled;
                enabled
            }
            None => false,
        }
    }

    fn resolution(&self) -> u8 {
        self.resolution
    }

    fn set_resolution(&mut self, bits: u8) -> u8 {
        if RESOLUTIONS.contains(&bits) {
            self.resolution = bits;
        }
        self.resolution
    }

    fn set_sample_frequency(&mut self, frequency: f64) -> f64 {
        if frequency.is_finite() && frequency > 0.0 {
            self.sample_frequency = frequency.min(MAX_SAMPLE_FREQUENCY);
        }
        self.sample_frequency
    }

    fn set_record_length(&mut self, record_length: u64) -> u64 {
        self.record_length = record_length.clamp(1, MAX_RECORD_LENGTH);
        self.record_length
    }

    fn attach_event(&mut self, signal: EventSignal, source: EventSource) {
        *self.events.slot(signal) = Some(source);
    }

    fn detach_events(&mut self) {
        self.events = Events::default();
    }

    fn start(&mut self) -> Result<(), device::Error> {
        if self.producer.is_some() {
            return Err(device::Error::Status("already streaming".to_string()));
        }
        if !self.enabled.iter().any(|enabled| *enabled) {
            return Err(device::Error::Status("no channels enabled".to_string()));
        }

        *self
            .fifo
            .lock()
            .map_err(|_| device::Error::Status("producer thread panicked".to_string()))? =
            Fifo::default();
        self.fetched = 0;
        self.producer = Some(self.spawn_producer()?);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), device::Error> {
        let Some(producer) = self.producer.take() else {
            return Ok(());
        };
        producer.stop.store(true, Ordering::Relaxed);
        producer.handle.thread().unpark();
        producer
            .handle
            .join()
            .map_err(|_| device::Error::Status("producer thread panicked".to_string()))
    }

    fn fetch_raw(
        &mut self,
        buffers: &mut [Option<Vec<u8>>],
        offset: u64,
        length: u64,
    ) -> Result<(), device::Error> {
        let index = self.next_block(offset, length)?;
        let size = usize::from(self.resolution).div_ceil(8);
        let max_code = ((1u64 << self.resolution) - 1) as f64;
        let first = index * self.record_length + offset;

        for (channel, slot) in buffers.iter_mut().enumerate() {
            let Some(buffer) = slot else { continue };
            if !self.is_enabled(channel) {
                continue;
            }
            for (i, sample) in buffer.chunks_exact_mut(size).take(length as usize).enumerate() {
                let normalized = (voltage(channel, first + i as u64) / RANGE + 1.0) / 2.0;
                let code = (normalized * max_code).round() as u64;
                sample.copy_from_slice(&code.to_le_bytes()[..size]);
            }
        }
        Ok(())
    }

    fn fetch_scaled(
        &mut self,
        buffers: &mut [Option<Vec<f32>>],
        offset: u64,
        length: u64,
    ) -> Result<(), device::Error> {
        let index = self.next_block(offset, length)?;
        let first = index * self.record_length + offset;

        for (channel, slot) in buffers.iter_mut().enumerate() {
            let Some(buffer) = slot else { continue };
            if !self.is_enabled(channel) {
                continue;
            }
            for (i, sample) in buffer.iter_mut().take(length as usize).enumerate() {
                *sample = voltage(channel, first + i as u64) as f32;
            }
        }
        Ok(())
    }
}

impl Drop for SimulatedScope {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::warn!("{}", err);
        }
    }
}
