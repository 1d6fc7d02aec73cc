use std::collections::VecDeque;

/// Bounded-memory moving mean over the last `capacity` values.
#[derive(Debug, Clone)]
pub struct RollingAverage {
    values: VecDeque<f64>,
    capacity: usize,
    sum: f64,
}

impl RollingAverage {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
        }
    }

    pub fn add(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            if let Some(oldest) = self.values.pop_front() {
                self.sum -= oldest;
            }
        }
        self.values.push_back(value);
        self.sum += value;
    }

    /// Mean of the retained values. NaN before the first `add`.
    pub fn average(&self) -> f64 {
        self.sum / self.values.len() as f64
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_average_is_nan() {
        let avg = RollingAverage::new(3);
        assert!(avg.average().is_nan());
        assert!(avg.is_empty());
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut avg = RollingAverage::new(3);
        avg.add(3.0);
        avg.add(6.0);
        assert!((avg.average() - 4.5).abs() < 1e-12);
        assert!(!avg.is_full());
        avg.add(9.0);
        avg.add(12.0);
        assert!(avg.is_full());
        assert_eq!(avg.len(), 3);
        assert!((avg.average() - 9.0).abs() < 1e-12);
    }

    #[test]
    fn zero_capacity_behaves_as_one() {
        let mut avg = RollingAverage::new(0);
        avg.add(5.0);
        avg.add(7.0);
        assert_eq!(avg.capacity(), 1);
        assert!((avg.average() - 7.0).abs() < 1e-12);
    }
}
