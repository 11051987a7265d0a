//! Cancellation, progress and status plumbing around a pass.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative cancellation, checked once per row boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Snapshot handed to a progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub records: u64,
    pub line: u64,
}

type ProgressCallback = Box<dyn FnMut(Progress) + Send>;

/// Progress notifications, rate limited by wall-clock time.
pub struct ProgressReporter {
    interval: Duration,
    last: Option<Instant>,
    callback: Option<ProgressCallback>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl ProgressReporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            callback: None,
        }
    }

    pub fn set_callback(&mut self, callback: impl FnMut(Progress) + Send + 'static) {
        self.callback = Some(Box::new(callback));
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Notify unless the previous notification is younger than the interval.
    pub fn report(&mut self, records: u64, line: u64) {
        let Some(callback) = self.callback.as_mut() else {
            return;
        };
        let now = Instant::now();
        if let Some(last) = self.last {
            if now.duration_since(last) < self.interval {
                return;
            }
        }
        self.last = Some(now);
        callback(Progress { records, line });
    }

    /// Final notification, always delivered.
    pub fn finish(&mut self, records: u64, line: u64) {
        if let Some(callback) = self.callback.as_mut() {
            callback(Progress { records, line });
        }
        self.last = None;
    }
}

/// Coarse engine status, readable from other threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineStatus {
    Idle = 0,
    Loading = 1,
    AwaitingResults = 2,
    Queued = 3,
}

impl EngineStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => EngineStatus::Loading,
            2 => EngineStatus::AwaitingResults,
            3 => EngineStatus::Queued,
            _ => EngineStatus::Idle,
        }
    }
}

/// Shared handle on an [`EngineStatus`].
#[derive(Debug, Clone, Default)]
pub struct StatusFlag(Arc<AtomicU8>);

impl StatusFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> EngineStatus {
        EngineStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, status: EngineStatus) {
        self.0.store(status as u8, Ordering::Release);
    }
}
