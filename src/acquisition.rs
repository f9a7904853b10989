//! The streaming loop: wait for device events, fetch ready blocks and count
//! them until the plan's block budget is used up or something goes wrong.
//!
//! Every exit path stops the device (if it was started), detaches the event
//! sources and releases the channel buffers exactly once before [`run`]
//! returns.

use std::time::{Duration, Instant};

use crate::{
    buffers::{AllocationError, BufferPool},
    device::{self, DeviceSession},
    events::{EventMux, EventSignal, WaitError},
    fetch::{FetchError, fetch_block},
    plan::AcquisitionPlan,
    progress::{Progress, ProgressSink},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    AllocationFailure(AllocationError),

    #[error("start failed: {0}")]
    StartFailure(device::Error),

    #[error("device gone")]
    DeviceRemoved,

    #[error("data overflow")]
    DataOverflow,

    #[error("{0}")]
    FetchFailure(FetchError),

    #[error("event wait failed: {0}")]
    WaitFailure(WaitError),
}

#[derive(Debug)]
pub enum Termination {
    Completed,
    Failed(Error),
}

#[derive(Debug)]
pub struct RunReport {
    pub termination: Termination,
    pub blocks_completed: u64,
    pub block_count: u64,
    pub bytes_fetched: u64,
    /// Whether the device stream was ever started.
    pub started: bool,
    pub buffers_released: usize,
    /// Time spent streaming, from start until the loop ended.
    pub elapsed: Duration,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.termination, Termination::Completed)
    }

    /// Fetched bytes per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_fetched as f64 / secs
        } else {
            0.0
        }
    }
}

/// Owns the device for the length of a run: it attaches the event sources on
/// creation and, when dropped, stops the stream if it is running and detaches
/// the sources again.
struct Stream<'a, D: DeviceSession + ?Sized> {
    device: &'a mut D,
    running: bool,
}

impl<'a, D: DeviceSession + ?Sized> Stream<'a, D> {
    fn attach(device: &'a mut D, mux: &mut EventMux) -> Self {
        for signal in EventSignal::ALL {
            device.attach_event(signal, mux.register(signal));
        }
        Self {
            device,
            running: false,
        }
    }

    fn start(&mut self) -> Result<(), device::Error> {
        self.device.start()?;
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Err(err) = self.device.stop() {
            log::warn!("stopping stream failed: {}", err);
        }
    }
}

impl<D: DeviceSession + ?Sized> Drop for Stream<'_, D> {
    fn drop(&mut self) {
        self.stop();
        self.device.detach_events();
    }
}

/// Runs one streaming acquisition as described by `plan`.
pub fn run<D, P>(device: &mut D, plan: &AcquisitionPlan, progress: &mut P) -> RunReport
where
    D: DeviceSession + ?Sized,
    P: ProgressSink + ?Sized,
{
    let mut report = RunReport {
        termination: Termination::Completed,
        blocks_completed: 0,
        block_count: plan.block_count,
        bytes_fetched: 0,
        started: false,
        buffers_released: 0,
        elapsed: Duration::ZERO,
    };

    let mut pool = match BufferPool::allocate(
        plan.channel_count(),
        plan.active_channel_count,
        plan.record_length,
        plan.encoding,
        plan.resolution,
    ) {
        Ok(pool) => pool,
        Err(err) => {
            report.termination = Termination::Failed(Error::AllocationFailure(err));
            return report;
        }
    };

    let mut mux = EventMux::new();
    let mut stream = Stream::attach(device, &mut mux);
    log::debug!(
        "configured: {} buffers of {} byte samples, events attached",
        pool.allocated(),
        pool.sample_size()
    );

    let result = match stream.start() {
        Ok(()) => {
            report.started = true;
            log::debug!("streaming {} blocks", plan.block_count);
            let start_time = Instant::now();
            let result = stream_blocks(
                &mut stream,
                &mux,
                &mut pool,
                plan,
                progress,
                &mut report.blocks_completed,
            );
            report.elapsed = start_time.elapsed();
            result
        }
        Err(err) => Err(Error::StartFailure(err)),
    };

    // stops the device, then detaches the event sources
    drop(stream);
    // the pool's own Drop only matters when unwinding
    report.buffers_released = pool.release();
    report.bytes_fetched = report.blocks_completed.saturating_mul(plan.bytes_per_block());

    report.termination = match result {
        Ok(()) => Termination::Completed,
        Err(err) => {
            log::debug!("failed after {} blocks: {}", report.blocks_completed, err);
            Termination::Failed(err)
        }
    };
    report
}

fn stream_blocks<D, P>(
    stream: &mut Stream<'_, D>,
    mux: &EventMux,
    pool: &mut BufferPool,
    plan: &AcquisitionPlan,
    progress: &mut P,
    completed: &mut u64,
) -> Result<(), Error>
where
    D: DeviceSession + ?Sized,
    P: ProgressSink + ?Sized,
{
    while *completed < plan.block_count {
        let fired = mux.wait().map_err(Error::WaitFailure)?;
        debug_assert!(!fired.is_empty());
        log::trace!("woke with {} signals", fired.len());

        // Fatal signals come first, so a ready block fired together with one
        // of them is never fetched.
        for signal in fired {
            match signal {
                EventSignal::Removed => return Err(Error::DeviceRemoved),
                EventSignal::DataOverflow => return Err(Error::DataOverflow),
                EventSignal::DataReady => {
                    let timer = Instant::now();
                    fetch_block(&mut *stream.device, pool).map_err(Error::FetchFailure)?;
                    *completed += 1;
                    log::debug!(
                        "fetched block {} in {:?}us",
                        completed,
                        timer.elapsed().as_micros()
                    );
                    progress.update(Progress {
                        completed: *completed,
                        total: plan.block_count,
                    });
                }
            }
        }
    }
    Ok(())
}
