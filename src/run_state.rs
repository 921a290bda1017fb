//! Shared run state: the overlap guard plus counters read by the run loop.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

#[derive(Default)]
pub struct RunState {
    /// True while a run holds the guard.
    in_progress: AtomicBool,
    /// Unix millis at which the last finished run started (0 = none).
    last_run_started_ms: AtomicI64,
    runs_succeeded: AtomicU64,
    runs_failed: AtomicU64,
}

/// Held for the duration of one run. Dropping it releases the guard, including on
/// early returns.
pub struct RunGuard<'a> {
    state: &'a RunState,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the guard, or `None` if another run holds it.
    pub fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard { state: self })
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn record_finished(&self, started_ms: i64, success: bool) {
        self.last_run_started_ms.store(started_ms, Ordering::Relaxed);
        if success {
            self.runs_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.runs_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn last_run_started_ms(&self) -> i64 {
        self.last_run_started_ms.load(Ordering::Relaxed)
    }

    pub fn runs_succeeded(&self) -> u64 {
        self.runs_succeeded.load(Ordering::Relaxed)
    }

    pub fn runs_failed(&self) -> u64 {
        self.runs_failed.load(Ordering::Relaxed)
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.state.in_progress.store(false, Ordering::Release);
    }
}
