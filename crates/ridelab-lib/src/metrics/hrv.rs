use crate::signal::RRSeries;
use serde::{Deserialize, Serialize};

/// Successive differences above this count towards pNN50 (ms).
const NN50_MS: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HRVTime {
    pub n: usize,
    pub mean_rr_ms: f64,
    pub mean_hr_bpm: f64,
    pub sdnn_ms: f64,
    pub rmssd_ms: f64,
    pub pnn50: f64,
}

/// Time-domain summary of RR intervals given in milliseconds.
pub fn hrv_time(rr: &RRSeries) -> HRVTime {
    let n = rr.rr.len();
    let mean_rr_ms = if n > 0 {
        rr.rr.iter().sum::<f64>() / n as f64
    } else {
        0.0
    };
    let mean_hr_bpm = if mean_rr_ms > 0.0 {
        60_000.0 / mean_rr_ms
    } else {
        0.0
    };
    let sdnn_ms = if n > 1 {
        (rr.rr
            .iter()
            .map(|x| (x - mean_rr_ms).powi(2))
            .sum::<f64>()
            / (n as f64 - 1.0))
            .sqrt()
    } else {
        0.0
    };
    let (rmssd_ms, pnn50) = if n > 1 {
        let pairs = (n - 1) as f64;
        let squared: f64 = rr.rr.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
        let nn50 = rr
            .rr
            .windows(2)
            .filter(|w| (w[1] - w[0]).abs() > NN50_MS)
            .count();
        ((squared / pairs).sqrt(), nn50 as f64 / pairs)
    } else {
        (0.0, 0.0)
    };

    HRVTime {
        n,
        mean_rr_ms,
        mean_hr_bpm,
        sdnn_ms,
        rmssd_ms,
        pnn50,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, rel_tol: f64) {
        let tol = expected.abs().max(1.0) * rel_tol;
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "expected {expected}, got {actual} (diff {diff} > tol {tol})"
        );
    }

    #[test]
    fn summary_of_alternating_beats() {
        let rr = RRSeries {
            rr: vec![800.0, 900.0, 800.0, 900.0, 800.0],
        };
        let m = hrv_time(&rr);
        assert_eq!(m.n, 5);
        assert_close(m.mean_rr_ms, 840.0, 1e-12);
        assert_close(m.mean_hr_bpm, 60_000.0 / 840.0, 1e-12);
        assert_close(m.sdnn_ms, 3000.0_f64.sqrt(), 1e-12);
        assert_close(m.rmssd_ms, 100.0, 1e-12);
        assert_close(m.pnn50, 1.0, 1e-12);
    }

    #[test]
    fn empty_and_single_beat_are_zero() {
        let empty = hrv_time(&RRSeries::default());
        assert_eq!(empty.n, 0);
        assert_eq!(empty.mean_hr_bpm, 0.0);
        let single = hrv_time(&RRSeries { rr: vec![1000.0] });
        assert_close(single.mean_hr_bpm, 60.0, 1e-12);
        assert_eq!(single.rmssd_ms, 0.0);
    }
}
