//! Locating a staged test protocol (e.g. a step test) inside a power stream.
//!
//! Each sample scores `(|sample / target - 1| + 1)²` against the stage it
//! falls in; a profile's error is the mean score minus one, so an exact match
//! scores zero. Rest stages (target 0) are scored against the smallest
//! non-zero target of the profile.

use crate::error::{AnalysisError, Result};
use crate::progress::{ignore_progress, ProgressReporter};
use log::debug;
use serde::{Deserialize, Serialize};

/// One step of a protocol: `duration` samples at `target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub duration: usize,
    pub target: f64,
}

/// A stage expressed relative to FTP, as written in athlete configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub duration_s: usize,
    pub ftp_fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageProfile {
    stages: Vec<Stage>,
    total_duration: usize,
    rest_target: f64,
}

impl StageProfile {
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        if stages.is_empty() {
            return Err(AnalysisError::DegenerateInput("stage profile is empty".into()));
        }
        for (i, stage) in stages.iter().enumerate() {
            if stage.duration == 0 {
                return Err(AnalysisError::DegenerateInput(format!(
                    "stage {i} has zero duration"
                )));
            }
            if !stage.target.is_finite() || stage.target < 0.0 {
                return Err(AnalysisError::DegenerateInput(format!(
                    "stage {i} has invalid target {}",
                    stage.target
                )));
            }
        }
        let rest_target = stages
            .iter()
            .map(|s| s.target)
            .filter(|&t| t > 0.0)
            .fold(f64::INFINITY, f64::min);
        if !rest_target.is_finite() {
            return Err(AnalysisError::DegenerateInput(
                "stage profile has no non-zero target".into(),
            ));
        }
        let total_duration = stages.iter().map(|s| s.duration).sum();
        Ok(Self {
            stages,
            total_duration,
            rest_target,
        })
    }

    /// Build absolute targets from FTP fractions.
    pub fn from_ftp_fractions(specs: &[StageSpec], ftp: Option<f64>) -> Result<Self> {
        let ftp = ftp
            .filter(|f| f.is_finite() && *f > 0.0)
            .ok_or(AnalysisError::MissingConfiguration("ftp"))?;
        Self::new(
            specs
                .iter()
                .map(|spec| Stage {
                    duration: spec.duration_s,
                    target: spec.ftp_fraction * ftp,
                })
                .collect(),
        )
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn total_duration(&self) -> usize {
        self.total_duration
    }

    /// Smallest non-zero target; stands in for rest stages.
    pub fn rest_target(&self) -> f64 {
        self.rest_target
    }

    fn scoring_target(&self, stage: &Stage) -> f64 {
        if stage.target == 0.0 {
            self.rest_target
        } else {
            stage.target
        }
    }
}

/// Where the profile fits best and how well.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub offset: usize,
    pub error_metric: f64,
}

fn clean(sample: f64) -> f64 {
    if sample.is_finite() {
        sample
    } else {
        0.0
    }
}

/// Score of one sample, shifted down by one so sums stay centred on zero.
fn sample_error(sample: f64, target: f64) -> f64 {
    let e = (clean(sample) / target - 1.0).abs() + 1.0;
    e * e - 1.0
}

/// Error of the profile anchored at `offset`, or `None` if it does not fit.
pub fn profile_error_at(signal: &[f64], profile: &StageProfile, offset: usize) -> Option<f64> {
    if offset + profile.total_duration > signal.len() {
        return None;
    }
    let mut pos = offset;
    let mut total = 0.0;
    for stage in &profile.stages {
        let target = profile.scoring_target(stage);
        total += signal[pos..pos + stage.duration]
            .iter()
            .map(|&s| sample_error(s, target))
            .sum::<f64>();
        pos += stage.duration;
    }
    Some(total / profile.total_duration as f64)
}

pub fn detect_stage_profile(signal: &[f64], profile: &StageProfile) -> Result<DetectionResult> {
    detect_stage_profile_with_progress(signal, profile, ignore_progress)
}

/// Score every candidate offset of a finished recording and keep the lowest
/// error (earliest on ties). O(n × profile duration).
pub fn detect_stage_profile_with_progress<F: FnMut(f64)>(
    signal: &[f64],
    profile: &StageProfile,
    progress: F,
) -> Result<DetectionResult> {
    let total = profile.total_duration;
    if signal.len() < total {
        return Err(AnalysisError::too_few(total, signal.len()));
    }
    let candidates = signal.len() - total + 1;
    let mut reporter = ProgressReporter::new(candidates, progress);
    let mut best: Option<DetectionResult> = None;
    for offset in 0..candidates {
        if let Some(error_metric) = profile_error_at(signal, profile, offset) {
            if best.map_or(true, |b| error_metric < b.error_metric) {
                best = Some(DetectionResult {
                    offset,
                    error_metric,
                });
            }
        }
        reporter.update(offset + 1);
    }
    reporter.finish();
    best.ok_or(AnalysisError::too_few(total, signal.len()))
}

/// Fixed-capacity ring; pushing into a full ring returns the evicted value.
#[derive(Debug, Clone)]
struct StageRing {
    values: Vec<f64>,
    head: usize,
    len: usize,
}

impl StageRing {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            values: vec![0.0; capacity],
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, value: f64) -> Option<f64> {
        let capacity = self.values.len();
        if self.len < capacity {
            self.values[(self.head + self.len) % capacity] = value;
            self.len += 1;
            return None;
        }
        let evicted = std::mem::replace(&mut self.values[self.head], value);
        self.head = (self.head + 1) % capacity;
        Some(evicted)
    }
}

/// Sample-by-sample detector: keeps the error of the profile anchored at
/// the trailing edge of the stream in O(stages) per sample.
///
/// One ring per stage; once every ring is full a new sample enters the last
/// stage and each evicted sample moves one stage earlier, falling off the
/// front of the first stage.
#[derive(Debug, Clone)]
pub struct StreamingStageDetector {
    profile: StageProfile,
    rings: Vec<StageRing>,
    stage_ends: Vec<usize>,
    targets: Vec<f64>,
    total_error: f64,
    seen: usize,
    threshold: f64,
    best: Option<DetectionResult>,
}

impl StreamingStageDetector {
    pub fn new(profile: StageProfile, threshold: f64) -> Self {
        let rings = profile
            .stages
            .iter()
            .map(|s| StageRing::with_capacity(s.duration))
            .collect();
        let stage_ends = profile
            .stages
            .iter()
            .scan(0, |end, s| {
                *end += s.duration;
                Some(*end)
            })
            .collect();
        let targets = profile
            .stages
            .iter()
            .map(|s| profile.scoring_target(s))
            .collect();
        Self {
            profile,
            rings,
            stage_ends,
            targets,
            total_error: 0.0,
            seen: 0,
            threshold,
            best: None,
        }
    }

    /// Feed one sample. Once a full profile's worth has been seen, returns
    /// the detection anchored at the current trailing edge.
    pub fn push(&mut self, sample: f64) -> Option<DetectionResult> {
        let total = self.profile.total_duration;
        if self.seen < total {
            let stage = self
                .stage_ends
                .iter()
                .position(|&end| self.seen < end)
                .unwrap_or(self.rings.len() - 1);
            self.rings[stage].push(sample);
            self.total_error += sample_error(sample, self.targets[stage]);
        } else {
            let mut carried = sample;
            for stage in (0..self.rings.len()).rev() {
                let target = self.targets[stage];
                self.total_error += sample_error(carried, target);
                match self.rings[stage].push(carried) {
                    Some(evicted) => {
                        self.total_error -= sample_error(evicted, target);
                        carried = evicted;
                    }
                    None => break,
                }
            }
        }
        self.seen += 1;
        if self.seen < total {
            return None;
        }

        let current = DetectionResult {
            offset: self.seen - total,
            error_metric: self.mean_square_error(),
        };
        if current.error_metric < self.threshold
            && self
                .best
                .map_or(true, |b| current.error_metric < b.error_metric)
        {
            debug!(
                "stage profile match at offset {} (error {:.4})",
                current.offset, current.error_metric
            );
            self.best = Some(current);
        }
        Some(current)
    }

    /// Error of the profile anchored at the trailing edge.
    pub fn mean_square_error(&self) -> f64 {
        self.total_error / self.profile.total_duration as f64
    }

    pub fn is_full(&self) -> bool {
        self.seen >= self.profile.total_duration
    }

    pub fn is_below_threshold(&self) -> bool {
        self.is_full() && self.mean_square_error() < self.threshold
    }

    /// Lowest-error detection below the threshold seen so far.
    pub fn best(&self) -> Option<DetectionResult> {
        self.best
    }

    pub fn samples_seen(&self) -> usize {
        self.seen
    }

    pub fn profile(&self) -> &StageProfile {
        &self.profile
    }
}
