use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::shared::constants::FPS_WINDOW;

/// One processed frame as seen by the monitor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FpsSample {
    pub at: Instant,
    /// Frames processed since the monitor was created, including this one.
    pub processed: u64,
}

/// Rolling frames-per-second estimate over processed-frame timestamps.
///
/// The pipeline thread records one sample per processed frame while any
/// thread may read the rate. Samples older than the window are discarded on
/// every access, so after an idle period longer than the window the rate
/// falls back to zero.
pub struct PerformanceMonitor {
    window: Duration,
    state: Mutex<MonitorState>,
}

#[derive(Default)]
struct MonitorState {
    timestamps: VecDeque<Instant>,
    processed: u64,
}

impl PerformanceMonitor {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(MonitorState::default()),
        }
    }

    pub fn record(&self) -> FpsSample {
        self.record_at(Instant::now())
    }

    pub fn record_at(&self, at: Instant) -> FpsSample {
        let mut state = self.lock();
        state.processed += 1;
        state.timestamps.push_back(at);
        self.prune(&mut state, at);
        FpsSample {
            at,
            processed: state.processed,
        }
    }

    pub fn current_fps(&self) -> f64 {
        self.current_fps_at(Instant::now())
    }

    pub fn current_fps_at(&self, now: Instant) -> f64 {
        let mut state = self.lock();
        self.prune(&mut state, now);
        state.timestamps.len() as f64 / self.window.as_secs_f64()
    }

    pub fn total_processed(&self) -> u64 {
        self.lock().processed
    }

    fn prune(&self, state: &mut MonitorState, now: Instant) {
        while let Some(&oldest) = state.timestamps.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                state.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(FPS_WINDOW)
    }
}
