//! The capabilities the speed test needs from a streaming oscilloscope.

use crate::events::{EventSignal, EventSource};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no device with serial number {0} found")]
    NotFound(u32),

    #[error("device is not streaming")]
    NotRunning,

    #[error("no data available")]
    NoData,

    #[error("requested samples {offset}..{end} exceed record length {record_length}")]
    InvalidRange {
        offset: u64,
        end: u64,
        record_length: u64,
    },

    #[error("{0}")]
    Status(String),
}

/// An opened device session.
///
/// The setters return the value the device actually applied, which may be
/// rounded or clamped from the requested one.
pub trait DeviceSession {
    fn name(&self) -> &str;

    fn serial_number(&self) -> u32;

    fn channel_count(&self) -> u16;

    fn set_channel_enabled(&mut self, channel: u16, enabled: bool) -> bool;

    fn resolution(&self) -> u8;

    fn set_resolution(&mut self, bits: u8) -> u8;

    fn set_sample_frequency(&mut self, frequency: f64) -> f64;

    fn set_record_length(&mut self, record_length: u64) -> u64;

    /// Hands the device the source it notifies when `signal` occurs.
    fn attach_event(&mut self, signal: EventSignal, source: EventSource);

    /// Drops every attached source. Called once the stream is stopped.
    fn detach_events(&mut self);

    fn start(&mut self) -> Result<(), Error>;

    /// Stops streaming. Stopping a device that is not streaming is a no-op.
    fn stop(&mut self) -> Result<(), Error>;

    /// Copies the oldest completed block into `buffers`, one slot per channel.
    fn fetch_raw(
        &mut self,
        buffers: &mut [Option<Vec<u8>>],
        offset: u64,
        length: u64,
    ) -> Result<(), Error>;

    fn fetch_scaled(
        &mut self,
        buffers: &mut [Option<Vec<f32>>],
        offset: u64,
        length: u64,
    ) -> Result<(), Error>;
}
