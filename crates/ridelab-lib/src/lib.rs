//! Ridelab analysis engine: heart-rate variability and power-meter metrics
//! for training sessions, computed in batch or sample by sample.

pub mod detectors;
pub mod error;
pub mod io;
pub mod metrics;
pub mod plot;
pub mod progress;
pub mod signal;
pub mod stats;

pub use detectors::*;
pub use error::{AnalysisError, Result};
pub use metrics::*;
pub use signal::*;
pub use stats::*;
