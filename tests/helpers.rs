//! A scripted device for driving the acquisition loop deterministically.
//!
//! Each start or successful fetch fires the next batch of signals from the
//! script, so the whole run happens on the test thread.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use scope_stream_speed::{
    DeviceSession, EventSignal, EventSource,
    buffers::SampleEncoding,
    device,
};

pub struct ScriptedDevice {
    pub channel_count: u16,
    pub enabled: Vec<bool>,
    pub resolution: u8,
    pub resolution_requests: Vec<u8>,
    pub sample_frequency: f64,
    pub record_length: u64,
    pub fail_start: bool,
    /// 1-based fetch call that reports an error.
    pub fail_fetch_at: Option<usize>,
    pub start_calls: usize,
    pub stop_calls: usize,
    pub fetch_calls: usize,
    pub detach_calls: usize,
    pub fetched_encoding: Option<SampleEncoding>,
    /// Buffer length per channel slot seen by the last fetch.
    pub fetched_slots: Vec<Option<usize>>,
    batches: VecDeque<Vec<EventSignal>>,
    events: HashMap<EventSignal, EventSource>,
}

impl ScriptedDevice {
    pub fn new(channel_count: u16) -> Self {
        Self {
            channel_count,
            enabled: vec![true; usize::from(channel_count)],
            resolution: 8,
            resolution_requests: Vec::new(),
            sample_frequency: 0.0,
            record_length: 0,
            fail_start: false,
            fail_fetch_at: None,
            start_calls: 0,
            stop_calls: 0,
            fetch_calls: 0,
            detach_calls: 0,
            fetched_encoding: None,
            fetched_slots: Vec::new(),
            batches: VecDeque::new(),
            events: HashMap::new(),
        }
    }

    pub fn with_script<I>(mut self, batches: I) -> Self
    where
        I: IntoIterator<Item = Vec<EventSignal>>,
    {
        self.batches.extend(batches);
        self
    }

    pub fn attached_events(&self) -> usize {
        self.events.len()
    }

    fn fire_next(&mut self) {
        if let Some(batch) = self.batches.pop_front() {
            for signal in batch {
                if let Some(source) = self.events.get(&signal) {
                    source.notify();
                }
            }
        }
    }

    fn fetch<T>(
        &mut self,
        encoding: SampleEncoding,
        buffers: &mut [Option<Vec<T>>],
    ) -> Result<(), device::Error> {
        self.fetch_calls += 1;
        if self.fail_fetch_at == Some(self.fetch_calls) {
            return Err(device::Error::Status("scripted fetch failure".to_string()));
        }
        self.fetched_encoding = Some(encoding);
        self.fetched_slots = buffers.iter().map(|s| s.as_ref().map(Vec::len)).collect();
        self.fire_next();
        Ok(())
    }
}

/// `n` wake-ups that each report a single ready block.
pub fn ready(n: usize) -> Vec<Vec<EventSignal>> {
    vec![vec![EventSignal::DataReady]; n]
}

impl DeviceSession for ScriptedDevice {
    fn name(&self) -> &str {
        "scripted"
    }

    fn serial_number(&self) -> u32 {
        1
    }

    fn channel_count(&self) -> u16 {
        self.channel_count
    }

    fn set_channel_enabled(&mut self, channel: u16, enabled: bool) -> bool {
        self.enabled[usize::from(channel)] = enabled;
        enabled
    }

    fn resolution(&self) -> u8 {
        self.resolution
    }

    fn set_resolution(&mut self, bits: u8) -> u8 {
        self.resolution_requests.push(bits);
        self.resolution = bits;
        bits
    }

    fn set_sample_frequency(&mut self, frequency: f64) -> f64 {
        self.sample_frequency = frequency;
        frequency
    }

    fn set_record_length(&mut self, record_length: u64) -> u64 {
        self.record_length = record_length;
        record_length
    }

    fn attach_event(&mut self, signal: EventSignal, source: EventSource) {
        self.events.insert(signal, source);
    }

    fn detach_events(&mut self) {
        self.detach_calls += 1;
        self.events.clear();
    }

    fn start(&mut self) -> Result<(), device::Error> {
        self.start_calls += 1;
        if self.fail_start {
            return Err(device::Error::Status("scripted start failure".to_string()));
        }
        self.fire_next();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), device::Error> {
        self.stop_calls += 1;
        Ok(())
    }

    fn fetch_raw(
        &mut self,
        buffers: &mut [Option<Vec<u8>>],
        _offset: u64,
        _length: u64,
    ) -> Result<(), device::Error> {
        self.fetch(SampleEncoding::Raw, buffers)
    }

    fn fetch_scaled(
        &mut self,
        buffers: &mut [Option<Vec<f32>>],
        _offset: u64,
        _length: u64,
    ) -> Result<(), device::Error> {
        self.fetch(SampleEncoding::Scaled, buffers)
    }
}
