use crate::{
    buffers::{BufferPool, SampleEncoding, Storage},
    device::{self, DeviceSession},
};

#[derive(Debug, thiserror::Error)]
#[error("{} failed: {source}", fetch_call(.encoding))]
pub struct FetchError {
    pub encoding: SampleEncoding,
    pub source: device::Error,
}

fn fetch_call(encoding: &SampleEncoding) -> &'static str {
    match encoding {
        SampleEncoding::Raw => "fetch_raw",
        SampleEncoding::Scaled => "fetch_scaled",
    }
}

/// Copies one completed block for every active channel into `pool`.
pub fn fetch_block<D: DeviceSession + ?Sized>(
    device: &mut D,
    pool: &mut BufferPool,
) -> Result<(), FetchError> {
    let length = pool.record_length();
    let encoding = pool.encoding();
    let result = match pool.storage_mut() {
        Storage::Raw(slots) => device.fetch_raw(slots, 0, length),
        Storage::Scaled(slots) => device.fetch_scaled(slots, 0, length),
    };
    result.map_err(|source| FetchError { encoding, source })
}
