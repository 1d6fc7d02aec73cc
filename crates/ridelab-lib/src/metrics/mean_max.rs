//! Mean-maximal power curve: the best average sustained for every duration
//! of a finished recording.

use crate::progress::{ignore_progress, ProgressReporter};
use serde::{Deserialize, Serialize};

/// Durations (s) reported by default.
pub const STANDARD_DURATIONS: &[usize] = &[1, 5, 10, 30, 60, 300, 600, 1200, 3600];

/// Share of best 20-minute power taken as the FTP estimate.
const FTP_FROM_TWENTY_MINUTES: f64 = 0.95;

/// `means[d]` is the best mean over any `d + 1` consecutive samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanMaxCurve {
    pub means: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub duration_s: usize,
    pub watts: f64,
}

impl MeanMaxCurve {
    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    /// Best mean over `duration_s` samples, if the recording is that long.
    pub fn at(&self, duration_s: usize) -> Option<f64> {
        duration_s
            .checked_sub(1)
            .and_then(|idx| self.means.get(idx))
            .copied()
    }

    /// Curve sampled at `durations`, skipping those longer than the recording.
    pub fn points(&self, durations: &[usize]) -> Vec<CurvePoint> {
        durations
            .iter()
            .filter_map(|&duration_s| {
                self.at(duration_s).map(|watts| CurvePoint { duration_s, watts })
            })
            .collect()
    }

    pub fn ftp_estimate(&self) -> Option<f64> {
        self.at(1200).map(|best| best * FTP_FROM_TWENTY_MINUTES)
    }
}

pub fn mean_max_curve(series: &[f64]) -> MeanMaxCurve {
    mean_max_curve_with_progress(series, ignore_progress)
}

/// Compute the curve, reporting progress by completed work.
///
/// `trailing[k]` holds the mean of the `k + 1` samples ending at the current
/// position; each new sample extends every trailing window by one. O(n²)
/// time, O(n) memory.
pub fn mean_max_curve_with_progress<F: FnMut(f64)>(series: &[f64], progress: F) -> MeanMaxCurve {
    let n = series.len();
    let total_work = n * (n + 1) / 2;
    let mut reporter = ProgressReporter::new(total_work, progress);
    let mut trailing: Vec<f64> = Vec::with_capacity(n);
    let mut means = vec![f64::NEG_INFINITY; n];

    for (i, &sample) in series.iter().enumerate() {
        // Dropouts count as 0 W.
        let sample = if sample.is_finite() { sample } else { 0.0 };
        trailing.push(0.0);
        for len in (1..=i).rev() {
            trailing[len] = (trailing[len - 1] * len as f64 + sample) / (len + 1) as f64;
        }
        trailing[0] = sample;
        for (best, &current) in means.iter_mut().zip(&trailing) {
            if current > *best {
                *best = current;
            }
        }
        reporter.update((i + 1) * (i + 2) / 2);
    }
    reporter.finish();
    MeanMaxCurve { means }
}
