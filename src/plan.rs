//! Device configuration and the fixed block budget derived from it.

use std::fmt::{self, Display};

use crate::{buffers::SampleEncoding, config::StreamConfig, device::DeviceSession};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("device reports no channels")]
    NoChannels,

    #[error("device rejected sample frequency, got {0} Hz")]
    InvalidSampleFrequency(f64),

    #[error("device rejected record length, got {0} samples")]
    EmptyRecord(u64),

    #[error("duration must be positive, got {0} s")]
    InvalidDuration(f64),
}

/// Number of blocks needed to cover at least `duration` seconds.
pub fn block_count(duration: f64, sample_frequency: f64, record_length: u64) -> Result<u64, Error> {
    if !(duration.is_finite() && duration > 0.0) {
        return Err(Error::InvalidDuration(duration));
    }
    if !(sample_frequency.is_finite() && sample_frequency > 0.0) {
        return Err(Error::InvalidSampleFrequency(sample_frequency));
    }
    if record_length == 0 {
        return Err(Error::EmptyRecord(record_length));
    }

    let blocks = (duration * sample_frequency / record_length as f64).ceil();
    Ok((blocks as u64).max(1))
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionPlan {
    /// Enabled state as applied by the device, one entry per channel.
    pub enabled: Vec<bool>,
    pub active_channel_count: u16,
    pub resolution: u8,
    pub sample_frequency: f64,
    pub record_length: u64,
    pub block_count: u64,
    pub encoding: SampleEncoding,
}

impl AcquisitionPlan {
    pub fn channel_count(&self) -> u16 {
        self.enabled.len() as u16
    }

    /// Covered time, rounded up to whole blocks.
    pub fn duration(&self) -> f64 {
        self.record_length as f64 * self.block_count as f64 / self.sample_frequency
    }

    pub fn sample_size(&self) -> usize {
        self.encoding.sample_size(self.resolution)
    }

    /// Bytes fetched per block across all active channels.
    pub fn bytes_per_block(&self) -> u64 {
        u64::from(self.active_channel_count)
            .saturating_mul(self.record_length)
            .saturating_mul(self.sample_size() as u64)
    }

    /// Native data rate of the device in bytes per second.
    pub fn data_rate(&self) -> f64 {
        f64::from(self.active_channel_count)
            * usize::from(self.resolution).div_ceil(8) as f64
            * self.sample_frequency
    }
}

impl Display for AcquisitionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Active channel count: {}", self.active_channel_count)?;
        for (i, enabled) in self.enabled.iter().enumerate() {
            writeln!(
                f,
                "  Ch{}: {}",
                i + 1,
                if *enabled { "enabled" } else { "disabled" }
            )?;
        }
        writeln!(f, "Sample frequency: {:.6} MHz", self.sample_frequency / 1e6)?;
        writeln!(f, "Resolution: {} bit", self.resolution)?;
        writeln!(f, "Record length: {} Samples", self.record_length)?;
        writeln!(f, "Data rate: {:.6} MB/s", self.data_rate() / 1e6)?;
        writeln!(f, "Duration: {:.6} s", self.duration())?;
        writeln!(f, "Data type: {}", self.encoding.name())
    }
}

/// Applies `config` to the device and derives the run's block budget from the
/// values the device accepted.
pub fn configure<D: DeviceSession + ?Sized>(
    device: &mut D,
    config: &StreamConfig,
) -> Result<AcquisitionPlan, Error> {
    let channel_count = device.channel_count();
    if channel_count == 0 {
        return Err(Error::NoChannels);
    }

    let active_channel_count =
        if config.active_channel_count == 0 || config.active_channel_count > channel_count {
            channel_count
        } else {
            config.active_channel_count
        };

    let enabled = (0..channel_count)
        .map(|ch| device.set_channel_enabled(ch, ch < active_channel_count))
        .collect();

    if let Some(bits) = config.resolution {
        let applied = device.set_resolution(bits);
        if applied != bits {
            log::warn!("resolution {} bit not supported, using {} bit", bits, applied);
        }
    }

    let sample_frequency = device.set_sample_frequency(config.sample_frequency);
    let record_length = device.set_record_length(config.record_length);
    let block_count = block_count(config.duration, sample_frequency, record_length)?;
    log::debug!(
        "requested {} s, {} blocks of {} samples at {} Hz",
        config.duration,
        block_count,
        record_length,
        sample_frequency
    );

    Ok(AcquisitionPlan {
        enabled,
        active_channel_count,
        resolution: device.resolution(),
        sample_frequency,
        record_length,
        block_count,
        encoding: config.encoding,
    })
}
