//! Fractional progress for long batch computations.
//!
//! The callback sees a monotonic sequence of values in `[0, 1]`, at most one
//! per whole percent, and exactly one final `1.0` from [`ProgressReporter::finish`].

pub struct ProgressReporter<F: FnMut(f64)> {
    report: F,
    total: usize,
    last_percent: usize,
    finished: bool,
}

impl<F: FnMut(f64)> ProgressReporter<F> {
    pub fn new(total: usize, report: F) -> Self {
        Self {
            report,
            total,
            last_percent: 0,
            finished: false,
        }
    }

    /// Record that `done` of `total` units are complete.
    pub fn update(&mut self, done: usize) {
        if self.total == 0 || self.finished {
            return;
        }
        let percent = (done.min(self.total) * 100) / self.total;
        if percent > self.last_percent && percent < 100 {
            self.last_percent = percent;
            (self.report)(percent as f64 / 100.0);
        }
    }

    pub fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.last_percent = 100;
            (self.report)(1.0);
        }
    }
}

/// Callback for callers that do not care about progress.
pub fn ignore_progress(_: f64) {}
