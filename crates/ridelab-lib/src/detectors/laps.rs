use crate::{
    error::{AnalysisError, Result},
    signal::Lap,
    stats::rolling::RollingAverage,
};
use log::debug;
use serde::{Deserialize, Serialize};

/// Configurable parameters for automatic lap detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LapConfig {
    /// Rolling average length (samples).
    pub rolling_window: usize,
    /// Distance between the two averages compared for the delta (samples).
    pub delta_offset: usize,
    /// Delta magnitude, as a fraction of FTP, that counts as a transition.
    pub threshold_fraction: f64,
    /// Shortest lap that may be committed (samples).
    pub min_lap_duration: usize,
}

impl Default for LapConfig {
    fn default() -> Self {
        Self {
            rolling_window: 10,
            delta_offset: 10,
            threshold_fraction: 0.1,
            min_lap_duration: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LapSummary {
    #[serde(flatten)]
    pub lap: Lap,
    pub average: f64,
    pub maximum: f64,
}

/// Rolling average of `power`, NaN until the window has filled. Dropped
/// (non-finite) samples hold the previous average.
fn rolling_averages(power: &[f64], window: usize) -> Vec<f64> {
    let mut rolling = RollingAverage::new(window);
    power
        .iter()
        .map(|&watts| {
            if watts.is_finite() {
                rolling.add(watts);
            }
            if rolling.is_full() {
                rolling.average()
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Split a power recording into laps at sustained step changes.
///
/// A sample is in transition while the rolling-average delta exceeds
/// `threshold_fraction * ftp`. When a transition ends, a boundary is placed
/// at its start provided the previous boundary is more than
/// `min_lap_duration` samples earlier. The returned laps cover the whole
/// recording.
pub fn detect_laps(power: &[f64], ftp: Option<f64>, config: &LapConfig) -> Result<Vec<Lap>> {
    let ftp = ftp
        .filter(|f| f.is_finite() && *f > 0.0)
        .ok_or(AnalysisError::MissingConfiguration("ftp"))?;
    let window = config.rolling_window.max(1);
    let offset = config.delta_offset.max(1);
    let required = window + offset;
    if power.len() < required {
        return Err(AnalysisError::too_few(required, power.len()));
    }

    let threshold = config.threshold_fraction * ftp;
    let averages = rolling_averages(power, window);
    let mut boundaries = vec![0usize];
    let mut transition_start: Option<usize> = None;

    for i in offset..averages.len() {
        let delta = averages[i] - averages[i - offset];
        if !delta.is_finite() {
            continue;
        }
        if delta.abs() > threshold {
            transition_start.get_or_insert(i);
            continue;
        }
        if let Some(start) = transition_start.take() {
            let last = boundaries.last().copied().unwrap_or(0);
            if start - last > config.min_lap_duration {
                debug!("lap boundary at {start} (transition ended at {i})");
                boundaries.push(start);
            } else {
                debug!("ignoring transition at {start}: only {} since last lap", start - last);
            }
        }
    }

    if boundaries.len() < 2 {
        return Err(AnalysisError::NoSegmentsDetected);
    }
    boundaries.push(power.len());
    Ok(boundaries
        .windows(2)
        .map(|w| Lap {
            started_at: w[0],
            duration: w[1] - w[0],
        })
        .collect())
}

/// Average and peak of each lap, ignoring dropouts. Laps outside the
/// recording are clipped.
pub fn summarize_laps(power: &[f64], laps: &[Lap]) -> Vec<LapSummary> {
    laps.iter()
        .map(|lap| {
            let start = lap.started_at.min(power.len());
            let end = lap.end().min(power.len());
            let samples: Vec<f64> = power[start..end]
                .iter()
                .copied()
                .filter(|w| w.is_finite())
                .collect();
            let average = if samples.is_empty() {
                0.0
            } else {
                samples.iter().sum::<f64>() / samples.len() as f64
            };
            let maximum = samples.iter().copied().fold(0.0, f64::max);
            LapSummary {
                lap: *lap,
                average,
                maximum,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(levels: &[(usize, f64)]) -> Vec<f64> {
        levels
            .iter()
            .flat_map(|&(len, watts)| std::iter::repeat(watts).take(len))
            .collect()
    }

    fn assert_covers(laps: &[Lap], total: usize) {
        assert_eq!(laps.first().map(|l| l.started_at), Some(0));
        for w in laps.windows(2) {
            assert_eq!(w[0].end(), w[1].started_at);
        }
        assert_eq!(laps.iter().map(|l| l.duration).sum::<usize>(), total);
    }

    #[test]
    fn splits_at_step_changes() {
        let power = steps(&[(120, 100.0), (120, 200.0), (120, 150.0)]);
        let laps = detect_laps(&power, Some(200.0), &LapConfig::default()).unwrap();
        assert_eq!(laps.len(), 3);
        assert_covers(&laps, power.len());
        assert!((laps[1].started_at as i64 - 120).abs() <= 5, "{laps:?}");
        assert!((laps[2].started_at as i64 - 240).abs() <= 5, "{laps:?}");

        let summaries = summarize_laps(&power, &laps);
        assert_eq!(summaries.len(), 3);
        assert!(summaries[1].maximum == 200.0);
        assert!(summaries[0].average < summaries[1].average);
    }

    #[test]
    fn efforts_shorter_than_minimum_are_merged() {
        let power = steps(&[(120, 100.0), (30, 250.0), (150, 100.0)]);
        let laps = detect_laps(&power, Some(200.0), &LapConfig::default()).unwrap();
        assert_eq!(laps.len(), 2);
        assert_covers(&laps, power.len());
    }

    #[test]
    fn requires_ftp() {
        let power = steps(&[(120, 100.0), (120, 200.0)]);
        assert_eq!(
            detect_laps(&power, None, &LapConfig::default()),
            Err(AnalysisError::MissingConfiguration("ftp"))
        );
        assert_eq!(
            detect_laps(&power, Some(0.0), &LapConfig::default()),
            Err(AnalysisError::MissingConfiguration("ftp"))
        );
    }

    #[test]
    fn steady_ride_has_no_laps() {
        let mut power = vec![180.0; 600];
        power[300] = f64::NAN;
        assert_eq!(
            detect_laps(&power, Some(250.0), &LapConfig::default()),
            Err(AnalysisError::NoSegmentsDetected)
        );
    }

    #[test]
    fn short_recording_is_rejected() {
        let err = detect_laps(&[100.0; 12], Some(250.0), &LapConfig::default()).unwrap_err();
        assert!(err.needs_more_data());
    }
}
