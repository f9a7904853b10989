use std::{
    fmt::{self, Display},
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

use status_line::StatusLine;

use crate::plan::AcquisitionPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: u64,
    pub total: u64,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        100.0 * self.completed as f64 / self.total as f64
    }
}

impl Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} %", self.percent())
    }
}

/// Receives one update per completed block.
pub trait ProgressSink {
    fn update(&mut self, progress: Progress);
}

impl<F: FnMut(Progress)> ProgressSink for F {
    fn update(&mut self, progress: Progress) {
        self(progress)
    }
}

struct BlockCounter {
    completed: AtomicU64,
    total: u64,
    bytes_per_block: u64,
    started: Instant,
}

impl Display for BlockCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let completed = self.completed.load(Ordering::Relaxed);
        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            completed.saturating_mul(self.bytes_per_block) as f64 / elapsed / 1e6
        } else {
            0.0
        };
        write!(
            f,
            "{} \t Blocks: {}/{} \t {:.02} MB/s",
            Progress {
                completed,
                total: self.total
            },
            completed,
            self.total,
            rate
        )
    }
}

/// Progress shown as a single line redrawn in place on the terminal.
///
/// `status-line` draws on stderr, so only the final percentage from
/// [`StatusProgress::finish`] lands on stdout.
pub struct StatusProgress {
    status: Option<StatusLine<BlockCounter>>,
    last: Progress,
}

impl StatusProgress {
    pub fn new(plan: &AcquisitionPlan) -> Self {
        let counter = BlockCounter {
            completed: AtomicU64::new(0),
            total: plan.block_count,
            bytes_per_block: plan.bytes_per_block(),
            started: Instant::now(),
        };
        Self {
            status: Some(StatusLine::new(counter)),
            last: Progress {
                completed: 0,
                total: plan.block_count,
            },
        }
    }

    /// Clears the status line and prints the last reported percentage.
    pub fn finish(mut self) -> Progress {
        drop(self.status.take());
        println!("{}", self.last);
        self.last
    }
}

impl ProgressSink for StatusProgress {
    fn update(&mut self, progress: Progress) {
        self.last = progress;
        if let Some(status) = &self.status {
            status.completed.store(progress.completed, Ordering::Relaxed);
        }
    }
}
