//! Load progress across asynchronously completing system assets

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::{info, warn};

/// Result of a single system load
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded { parts: usize },
    Failed { reason: String },
}

/// Snapshot returned after each completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadUpdate {
    /// Rounded percentage, capped at 100
    pub percent: u8,
    /// True for exactly one update: the one that resolved the last load
    pub finished: bool,
}

/// Counts completions against a total announced up front.
///
/// The total is set before any load request is issued, so completions that
/// race each other at startup all see the right denominator.
#[derive(Debug, Default)]
pub struct LoadProgress {
    total: AtomicUsize,
    resolved: AtomicUsize,
    finished: AtomicBool,
    failures: Mutex<Vec<(String, String)>>,
}

impl LoadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce how many loads are about to be issued
    pub fn expect(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.resolved.store(0, Ordering::SeqCst);
        self.finished.store(false, Ordering::SeqCst);
        if let Ok(mut failures) = self.failures.lock() {
            failures.clear();
        }
    }

    pub fn complete(&self, system: &str) -> LoadUpdate {
        let update = self.resolve_one();
        info!(system = %system, percent = update.percent, "System loaded");
        update
    }

    /// A failed load still resolves its slot so progress can finish
    pub fn fail(&self, system: &str, reason: impl Into<String>) -> LoadUpdate {
        let reason = reason.into();
        warn!(system = %system, reason = %reason, "System failed to load");
        if let Ok(mut failures) = self.failures.lock() {
            failures.push((system.to_string(), reason));
        }
        self.resolve_one()
    }

    /// Record an outcome reported by the asset loader
    pub fn record(&self, system: &str, outcome: &LoadOutcome) -> LoadUpdate {
        match outcome {
            LoadOutcome::Loaded { .. } => self.complete(system),
            LoadOutcome::Failed { reason } => self.fail(system, reason.clone()),
        }
    }

    fn resolve_one(&self) -> LoadUpdate {
        let total = self.total.load(Ordering::SeqCst);
        let resolved = self.resolved.fetch_add(1, Ordering::SeqCst) + 1;
        let percent = percent_of(resolved, total);

        let finished = resolved >= total
            && self
                .finished
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();

        LoadUpdate { percent, finished }
    }

    pub fn percent(&self) -> u8 {
        percent_of(
            self.resolved.load(Ordering::SeqCst),
            self.total.load(Ordering::SeqCst),
        )
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// (system, reason) pairs for every failed load
    pub fn failures(&self) -> Vec<(String, String)> {
        self.failures.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

fn percent_of(resolved: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = ((resolved as f64 / total as f64) * 100.0).round();
    pct.min(100.0) as u8
}
