//! Ordinary least squares over paired samples.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};

/// Line `y = alpha + beta * x`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Regression {
    pub alpha: f64,
    pub beta: f64,
}

impl Regression {
    pub fn predict(&self, x: f64) -> f64 {
        self.beta * x + self.alpha
    }
}

/// Running sums for an OLS fit. Points may carry a weight, which is the same
/// as adding the point that many times.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegressionSums {
    n: f64,
    sum_x: f64,
    sum_xx: f64,
    sum_y: f64,
    sum_xy: f64,
}

impl RegressionSums {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, x: f64, y: f64) {
        self.add_weighted(x, y, 1.0);
    }

    pub fn add_weighted(&mut self, x: f64, y: f64, weight: f64) {
        self.n += weight;
        self.sum_x += weight * x;
        self.sum_xx += weight * x * x;
        self.sum_y += weight * y;
        self.sum_xy += weight * x * y;
    }

    /// Total weight added so far.
    pub fn count(&self) -> f64 {
        self.n
    }

    /// Solve the normal equations. A denominator within rounding of zero (a
    /// single distinct x) yields `{0, 0}`.
    pub fn fit(&self) -> Regression {
        let scale = self.n * self.sum_xx;
        let denom = scale - self.sum_x * self.sum_x;
        // Rounding in the sums grows with the number of points and with x².
        if denom.abs() <= 4.0 * self.n.max(1.0) * f64::EPSILON * scale {
            return Regression::default();
        }
        Regression {
            alpha: (self.sum_y * self.sum_xx - self.sum_x * self.sum_xy) / denom,
            beta: (self.n * self.sum_xy - self.sum_x * self.sum_y) / denom,
        }
    }
}

/// Fit a line through `(x, y)` pairs.
pub fn regress(pairs: &[(f64, f64)]) -> Regression {
    let mut sums = RegressionSums::new();
    for &(x, y) in pairs {
        sums.add(x, y);
    }
    sums.fit()
}

/// Fit a line through two parallel slices.
pub fn regress_xy(xs: &[f64], ys: &[f64]) -> Result<Regression> {
    if xs.len() != ys.len() {
        return Err(AnalysisError::MismatchedLength {
            left: xs.len(),
            right: ys.len(),
        });
    }
    let mut sums = RegressionSums::new();
    for (&x, &y) in xs.iter().zip(ys) {
        sums.add(x, y);
    }
    Ok(sums.fit())
}

/// Fit against the implicit axis `0, 1, 2, ...`.
pub fn regress_indexed(ys: &[f64]) -> Regression {
    let mut sums = RegressionSums::new();
    for (i, &y) in ys.iter().enumerate() {
        sums.add(i as f64, y);
    }
    sums.fit()
}

/// Average squared residual of `result` over `pairs`; NaN when empty.
pub fn mean_square_error(result: &Regression, pairs: &[(f64, f64)]) -> f64 {
    let total: f64 = pairs
        .iter()
        .map(|&(x, y)| {
            let residual = result.predict(x) - y;
            residual * residual
        })
        .sum();
    total / pairs.len() as f64
}

/// [`mean_square_error`] against the implicit axis `0, 1, 2, ...`.
pub(crate) fn mean_square_error_indexed(result: &Regression, ys: &[f64]) -> f64 {
    let total: f64 = ys
        .iter()
        .enumerate()
        .map(|(i, &y)| {
            let residual = result.predict(i as f64) - y;
            residual * residual
        })
        .sum();
    total / ys.len() as f64
}
