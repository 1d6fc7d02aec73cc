use serde::{Deserialize, Serialize};

/// Beat-to-beat intervals in milliseconds, in arrival order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RRSeries {
    pub rr: Vec<f64>,
}

impl RRSeries {
    pub fn len(&self) -> usize {
        self.rr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rr.is_empty()
    }

    /// Sum of all intervals (ms).
    pub fn duration_ms(&self) -> f64 {
        self.rr.iter().sum()
    }
}

/// Power samples in watts, one per second.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PowerSeries {
    pub watts: Vec<f64>,
}

impl PowerSeries {
    pub fn len(&self) -> usize {
        self.watts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watts.is_empty()
    }

    pub fn average(&self) -> f64 {
        if self.watts.is_empty() {
            return 0.0;
        }
        self.watts.iter().sum::<f64>() / self.watts.len() as f64
    }
}

/// Contiguous sub-interval of a recording, in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lap {
    pub started_at: usize,
    pub duration: usize,
}

impl Lap {
    pub fn end(&self) -> usize {
        self.started_at + self.duration
    }
}
