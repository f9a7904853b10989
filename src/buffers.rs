//! Per-channel sample storage for one acquisition run.

use std::collections::TryReserveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    /// Device-native integer codes, `ceil(resolution / 8)` bytes each.
    Raw,
    /// Samples converted to volts as `f32`.
    Scaled,
}

impl SampleEncoding {
    pub fn sample_size(self, resolution_bits: u8) -> usize {
        match self {
            SampleEncoding::Raw => usize::from(resolution_bits).div_ceil(8),
            SampleEncoding::Scaled => std::mem::size_of::<f32>(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SampleEncoding::Raw => "raw",
            SampleEncoding::Scaled => "float",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to allocate {bytes} bytes for channel {}: {source}", .channel + 1)]
pub struct AllocationError {
    pub channel: u16,
    pub bytes: u64,
    pub source: TryReserveError,
}

/// Buffer slots indexed by channel; `None` for disabled channels.
#[derive(Debug)]
pub enum Storage {
    Raw(Vec<Option<Vec<u8>>>),
    Scaled(Vec<Option<Vec<f32>>>),
}

#[derive(Debug)]
pub struct BufferPool {
    storage: Storage,
    record_length: u64,
    sample_size: usize,
}

impl BufferPool {
    /// Allocates a buffer for every channel below `active_channel_count`.
    ///
    /// On failure the buffers allocated so far are dropped before returning.
    pub fn allocate(
        channel_count: u16,
        active_channel_count: u16,
        record_length: u64,
        encoding: SampleEncoding,
        resolution_bits: u8,
    ) -> Result<Self, AllocationError> {
        let sample_size = encoding.sample_size(resolution_bits);
        let storage = match encoding {
            SampleEncoding::Raw => Storage::Raw(allocate_slots(
                channel_count,
                active_channel_count,
                record_length.saturating_mul(sample_size as u64),
            )?),
            SampleEncoding::Scaled => Storage::Scaled(allocate_slots(
                channel_count,
                active_channel_count,
                record_length,
            )?),
        };
        log::debug!(
            "allocated {} {} buffers of {} samples",
            active_channel_count.min(channel_count),
            encoding.name(),
            record_length
        );

        Ok(Self {
            storage,
            record_length,
            sample_size,
        })
    }

    pub fn encoding(&self) -> SampleEncoding {
        match self.storage {
            Storage::Raw(_) => SampleEncoding::Raw,
            Storage::Scaled(_) => SampleEncoding::Scaled,
        }
    }

    pub fn record_length(&self) -> u64 {
        self.record_length
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    #[cfg(test)]
    fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    /// Number of channel slots currently holding a buffer.
    pub fn allocated(&self) -> usize {
        match &self.storage {
            Storage::Raw(slots) => slots.iter().flatten().count(),
            Storage::Scaled(slots) => slots.iter().flatten().count(),
        }
    }

    /// Frees every held buffer and returns how many were freed.
    ///
    /// Empty slots are skipped, so calling this again returns 0.
    pub fn release(&mut self) -> usize {
        let released = match &mut self.storage {
            Storage::Raw(slots) => release_slots(slots),
            Storage::Scaled(slots) => release_slots(slots),
        };
        if released > 0 {
            log::debug!("released {} channel buffers", released);
        }
        released
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        self.release();
    }
}

fn allocate_slots<T: Default + Clone>(
    channel_count: u16,
    active_channel_count: u16,
    len: u64,
) -> Result<Vec<Option<Vec<T>>>, AllocationError> {
    let mut slots = Vec::with_capacity(usize::from(channel_count));
    for channel in 0..channel_count {
        if channel >= active_channel_count {
            slots.push(None);
            continue;
        }

        let bytes = len.saturating_mul(std::mem::size_of::<T>() as u64);
        let mut buffer = Vec::new();
        let capacity = usize::try_from(len).unwrap_or(usize::MAX);
        buffer
            .try_reserve_exact(capacity)
            .map_err(|source| AllocationError {
                channel,
                bytes,
                source,
            })?;
        buffer.resize(capacity, T::default());
        slots.push(Some(buffer));
    }
    Ok(slots)
}

fn release_slots<T>(slots: &mut [Option<Vec<T>>]) -> usize {
    slots.iter_mut().filter_map(Option::take).count()
}
