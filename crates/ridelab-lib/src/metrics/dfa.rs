//! Online detrended fluctuation analysis (DFA alpha-1) over beat-to-beat
//! intervals.
//!
//! [`DfaAlpha1`] keeps a duration-bounded window of accepted RR intervals
//! together with the integrated, mean-removed profile of that window. The
//! profile is corrected in place whenever the window mean moves, so
//! [`DfaAlpha1::compute`] never has to rebuild it.

use crate::error::{AnalysisError, Result};
use crate::progress::ProgressReporter;
use crate::stats::regression::{
    mean_square_error_indexed, regress_indexed, Regression, RegressionSums,
};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Fewest retained beats [`DfaAlpha1::compute`] accepts.
pub const MIN_BEATS: usize = 3;

/// Maximum fractional change between consecutive accepted beats.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "ThresholdRepr")]
pub enum ArtifactThreshold {
    /// Accept every beat
    Auto,
    Fraction(f64),
}

impl ArtifactThreshold {
    fn accepts(&self, previous: f64, value: f64) -> bool {
        match *self {
            ArtifactThreshold::Auto => true,
            ArtifactThreshold::Fraction(t) => {
                value >= previous * (1.0 - t) && value <= previous * (1.0 + t)
            }
        }
    }
}

impl fmt::Display for ArtifactThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactThreshold::Auto => write!(f, "auto"),
            ArtifactThreshold::Fraction(t) => write!(f, "{t}"),
        }
    }
}

impl FromStr for ArtifactThreshold {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(ArtifactThreshold::Auto);
        }
        let value: f64 = trimmed
            .parse()
            .map_err(|_| format!("expected 'auto' or a fraction, got {trimmed:?}"))?;
        ArtifactThreshold::try_from(ThresholdRepr::Fraction(value))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ThresholdRepr {
    Fraction(f64),
    Word(String),
}

impl TryFrom<ThresholdRepr> for ArtifactThreshold {
    type Error = String;

    fn try_from(repr: ThresholdRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            ThresholdRepr::Fraction(t) if t.is_finite() && t >= 0.0 => {
                Ok(ArtifactThreshold::Fraction(t))
            }
            ThresholdRepr::Fraction(t) => Err(format!("artifact threshold must be >= 0, got {t}")),
            ThresholdRepr::Word(word) if word.eq_ignore_ascii_case("auto") => {
                Ok(ArtifactThreshold::Auto)
            }
            ThresholdRepr::Word(word) => Err(format!("unknown artifact threshold {word:?}")),
        }
    }
}

/// Estimator settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DfaConfig {
    pub artifact_threshold: ArtifactThreshold,
    /// Retained history, in the units of the input stream (ms).
    pub window_ms: f64,
    /// Smallest box size in beats.
    pub scale_lower: usize,
    /// Largest box size in beats.
    pub scale_upper: usize,
    /// Number of log-spaced points between the bounds.
    pub scale_density: usize,
}

impl Default for DfaConfig {
    fn default() -> Self {
        Self {
            artifact_threshold: ArtifactThreshold::Fraction(0.05),
            window_ms: 120_000.0,
            scale_lower: 4,
            scale_upper: 16,
            scale_density: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Scale {
    /// Box size in beats
    pub length: usize,
    /// How many log-spaced points floored to this length
    pub magnitude: usize,
}

/// Log-spaced box sizes, strictly increasing, duplicates merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaleSet {
    scales: Vec<Scale>,
}

impl ScaleSet {
    pub fn log_spaced(lower: usize, upper: usize, density: usize) -> Result<Self> {
        if lower < 2 {
            return Err(AnalysisError::DegenerateInput(format!(
                "smallest DFA scale must be at least 2 beats, got {lower}"
            )));
        }
        if upper < lower {
            return Err(AnalysisError::DegenerateInput(format!(
                "DFA scale bounds out of order: {lower} > {upper}"
            )));
        }
        let density = density.max(1);
        let ratio = upper as f64 / lower as f64;
        let mut scales: Vec<Scale> = Vec::new();
        for i in 0..density {
            let length = if i == 0 {
                lower
            } else if i == density - 1 {
                upper
            } else {
                let exponent = i as f64 / (density - 1) as f64;
                // nudge so exact powers are not floored one below
                ((lower as f64 * ratio.powf(exponent)) + 1e-9).floor() as usize
            };
            match scales.last_mut() {
                Some(last) if last.length == length => last.magnitude += 1,
                _ => scales.push(Scale {
                    length,
                    magnitude: 1,
                }),
            }
        }
        Ok(Self { scales })
    }

    pub fn from_config(config: &DfaConfig) -> Result<Self> {
        Self::log_spaced(config.scale_lower, config.scale_upper, config.scale_density)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scale> {
        self.scales.iter()
    }

    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    pub fn smallest(&self) -> usize {
        self.scales.first().map(|s| s.length).unwrap_or(0)
    }

    pub fn largest(&self) -> usize {
        self.scales.last().map(|s| s.length).unwrap_or(0)
    }
}

/// Retained beats plus their cumulative deviation from the window mean.
///
/// Invariant: `deviations[k] == sum(values[..=k]) - (k + 1) * mean`.
#[derive(Debug, Clone, Default)]
struct WindowBuffer {
    values: VecDeque<f64>,
    deviations: VecDeque<f64>,
    sum: f64,
    mean: f64,
}

impl WindowBuffer {
    fn len(&self) -> usize {
        self.values.len()
    }

    fn push(&mut self, value: f64) {
        let count = self.values.len() as f64 + 1.0;
        let sum = self.sum + value;
        let mean = sum / count;
        self.rebase(0, 0.0, mean - self.mean);
        let last = self.deviations.back().copied().unwrap_or(0.0);
        self.deviations.push_back(last + value - mean);
        self.values.push_back(value);
        self.sum = sum;
        self.mean = mean;
    }

    fn pop_oldest(&mut self) -> Option<f64> {
        let oldest = self.values.pop_front()?;
        if self.values.is_empty() {
            self.deviations.clear();
            self.sum = 0.0;
            self.mean = 0.0;
            return Some(oldest);
        }
        let sum = self.sum - oldest;
        let mean = sum / self.values.len() as f64;
        let anchor = self.deviations.front().copied().unwrap_or(0.0);
        self.rebase(1, anchor, mean - self.mean);
        self.deviations.pop_front();
        self.sum = sum;
        self.mean = mean;
        Some(oldest)
    }

    /// Shift entries from `skip` onward by `anchor` plus the mean change
    /// times their position relative to `skip`.
    fn rebase(&mut self, skip: usize, anchor: f64, mean_delta: f64) {
        if anchor == 0.0 && mean_delta == 0.0 {
            return;
        }
        for (k, y) in self.deviations.iter_mut().enumerate().skip(skip) {
            *y -= anchor + (k + 1 - skip) as f64 * mean_delta;
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Streaming alpha-1 estimator.
///
/// Not synchronised; callers feeding it from several threads must serialise
/// access per instance.
#[derive(Debug, Clone)]
pub struct DfaAlpha1 {
    config: DfaConfig,
    scales: ScaleSet,
    buffer: WindowBuffer,
    last_accepted: Option<f64>,
    artifacts_removed: usize,
}

impl DfaAlpha1 {
    pub fn new(config: DfaConfig) -> Result<Self> {
        let scales = ScaleSet::from_config(&config)?;
        if config.window_ms.is_nan() || config.window_ms <= 0.0 {
            return Err(AnalysisError::DegenerateInput(format!(
                "DFA window must be positive, got {}",
                config.window_ms
            )));
        }
        Ok(Self {
            config,
            scales,
            buffer: WindowBuffer::default(),
            last_accepted: None,
            artifacts_removed: 0,
        })
    }

    /// Feed one beat-to-beat interval. Returns `false` when it was rejected
    /// as an artifact.
    pub fn add(&mut self, value: f64) -> bool {
        let plausible = value.is_finite() && value > 0.0;
        let accepted = plausible
            && self
                .last_accepted
                .map_or(true, |prev| self.config.artifact_threshold.accepts(prev, value));
        if !accepted {
            self.artifacts_removed += 1;
            debug!(
                "rejected beat {value} (previous {:?}, threshold {})",
                self.last_accepted, self.config.artifact_threshold
            );
            return false;
        }
        self.last_accepted = Some(value);
        self.buffer.push(value);
        while self.buffer.len() > 1 && self.buffer.sum > self.config.window_ms {
            self.buffer.pop_oldest();
        }
        true
    }

    /// Fit the log-log fluctuation line over the retained window; `beta` is
    /// alpha-1.
    pub fn compute(&self) -> Result<Regression> {
        let available = self.buffer.len();
        if available < MIN_BEATS {
            return Err(AnalysisError::too_few(MIN_BEATS, available));
        }
        let profile: Vec<f64> = self.buffer.deviations.iter().copied().collect();
        fit_fluctuation_slope(&profile, &self.scales)
    }

    pub fn alpha1(&self) -> Result<f64> {
        self.compute().map(|fit| fit.beta)
    }

    pub fn artifacts_removed(&self) -> usize {
        self.artifacts_removed
    }

    /// Number of retained beats.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.len() == 0
    }

    /// Sum of retained intervals.
    pub fn retained_duration(&self) -> f64 {
        self.buffer.sum
    }

    pub fn mean(&self) -> f64 {
        self.buffer.mean
    }

    pub fn retained(&self) -> impl Iterator<Item = f64> + '_ {
        self.buffer.values.iter().copied()
    }

    pub fn scales(&self) -> &ScaleSet {
        &self.scales
    }

    pub fn config(&self) -> &DfaConfig {
        &self.config
    }

    /// Drop all retained beats and counters.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.last_accepted = None;
        self.artifacts_removed = 0;
    }
}

/// Alpha-1 over `rr` computed from scratch (no artifact filtering).
pub fn dfa_alpha1(rr: &[f64], scales: &ScaleSet) -> Result<Regression> {
    if rr.len() < MIN_BEATS {
        return Err(AnalysisError::too_few(MIN_BEATS, rr.len()));
    }
    let mean = rr.iter().sum::<f64>() / rr.len() as f64;
    let mut acc = 0.0;
    let profile: Vec<f64> = rr
        .iter()
        .map(|&x| {
            acc += x - mean;
            acc
        })
        .collect();
    fit_fluctuation_slope(&profile, scales)
}

fn fit_fluctuation_slope(profile: &[f64], scales: &ScaleSet) -> Result<Regression> {
    let n = profile.len();
    let mut sums = RegressionSums::new();
    let mut any_fluctuation = false;
    for scale in scales.iter().filter(|s| s.length <= n) {
        let f = fluctuation(profile, scale.length);
        trace!("scale {} (x{}): F = {f}", scale.length, scale.magnitude);
        let log_f = if f > 0.0 {
            any_fluctuation = true;
            f.log2()
        } else {
            0.0
        };
        sums.add_weighted((scale.length as f64).log2(), log_f, scale.magnitude as f64);
    }
    if sums.count() == 0.0 {
        return Err(AnalysisError::too_few(scales.smallest(), n));
    }
    if !any_fluctuation {
        return Err(AnalysisError::DegenerateInput(
            "every DFA scale produced zero fluctuation".into(),
        ));
    }
    Ok(sums.fit())
}

/// Root mean square of the detrended residuals for boxes of `scale` beats.
/// When `scale` does not divide the profile, a second partition anchored at
/// the tail covers the remainder.
fn fluctuation(profile: &[f64], scale: usize) -> f64 {
    let n = profile.len();
    let segments = n / scale;
    if segments == 0 {
        return 0.0;
    }
    let tail_start = n - segments * scale;
    let mut total = 0.0;
    let mut windows = 0usize;
    for offset in [0, tail_start] {
        for i in 0..segments {
            let start = offset + i * scale;
            let window = &profile[start..start + scale];
            let fit = regress_indexed(window);
            total += mean_square_error_indexed(&fit, window);
            windows += 1;
        }
    }
    (total / windows as f64).sqrt()
}

/// One alpha-1 reading from [`alpha1_series`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Alpha1Point {
    /// Elapsed beat time at the reading, artifacts included
    pub elapsed_ms: f64,
    pub alpha1: f64,
    pub artifacts_removed: usize,
}

/// Replay a stored recording through the online estimator, reading alpha-1
/// every `step_ms` once a full window has elapsed. Windows that cannot be
/// evaluated are skipped.
pub fn alpha1_series<F: FnMut(f64)>(
    rr: &[f64],
    config: DfaConfig,
    step_ms: f64,
    progress: F,
) -> Result<Vec<Alpha1Point>> {
    if step_ms.is_nan() || step_ms <= 0.0 {
        return Err(AnalysisError::DegenerateInput(format!(
            "alpha-1 step must be positive, got {step_ms}"
        )));
    }
    let mut estimator = DfaAlpha1::new(config)?;
    let mut reporter = ProgressReporter::new(rr.len(), progress);
    let mut points = Vec::new();
    let mut elapsed = 0.0;
    let mut next_reading = config.window_ms;
    for (i, &value) in rr.iter().enumerate() {
        estimator.add(value);
        if value.is_finite() && value > 0.0 {
            elapsed += value;
        }
        if elapsed >= next_reading {
            while next_reading <= elapsed {
                next_reading += step_ms;
            }
            match estimator.alpha1() {
                Ok(alpha1) => points.push(Alpha1Point {
                    elapsed_ms: elapsed,
                    alpha1,
                    artifacts_removed: estimator.artifacts_removed(),
                }),
                Err(err) => debug!("skipping alpha-1 at {elapsed} ms: {err}"),
            }
        }
        reporter.update(i + 1);
    }
    reporter.finish();
    Ok(points)
}
