//! Read-only progress counters for an external reporter.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Pipeline counters, updated by workers and the writer.
#[derive(Debug, Default)]
pub struct Progress {
    total: AtomicUsize,
    completed: AtomicUsize,
    recolored: AtomicUsize,
    copied: AtomicUsize,
}

/// Point-in-time view of [`Progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    /// Tiles written back into the container
    pub completed: usize,
    /// Tiles scheduled for this run
    pub total: usize,
    /// Tiles decoded, corrected and re-encoded
    pub recolored: usize,
    /// Tiles staged verbatim
    pub copied: usize,
}

impl ProgressSnapshot {
    /// Completed fraction in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

impl Progress {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of tiles the run will write.
    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub(crate) fn add_completed(&self, n: usize) {
        self.completed.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_recolored(&self) {
        self.recolored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_copied(&self) {
        self.copied.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads all counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
            recolored: self.recolored.load(Ordering::Relaxed),
            copied: self.copied.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let p = Progress::new();
        assert_eq!(p.snapshot().fraction(), 1.0);
        p.set_total(4);
        p.add_recolored();
        p.add_copied();
        p.add_completed(2);
        let s = p.snapshot();
        assert_eq!((s.completed, s.total, s.recolored, s.copied), (2, 4, 1, 1));
        assert_eq!(s.fraction(), 0.5);
    }
}
