use super::{Aggregator, AggregatorFactory};

/// Running arithmetic mean.
///
/// Updated incrementally as `mean += (x - mean) / n`, which stays bounded
/// where a running sum over a very long stream would lose precision.
#[derive(Debug, Clone, Default)]
pub struct MeanAggregator {
    mean: f64,
    count: u64,
}

impl MeanAggregator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Aggregator for MeanAggregator {
    fn add_value(&mut self, value: f64) {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
    }

    fn result(&self) -> f64 {
        self.mean
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn reset(&mut self) {
        self.mean = 0.0;
        self.count = 0;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MeanAggregatorFactory;

impl AggregatorFactory for MeanAggregatorFactory {
    fn create(&self) -> Box<dyn Aggregator> {
        Box::new(MeanAggregator::new())
    }

    fn describe(&self) -> String {
        "mean".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        let mut mean = MeanAggregator::new();
        assert_eq!(mean.result(), 0.0);
        for v in [2.0, 4.0, 6.0, 8.0] {
            mean.add_value(v);
        }
        assert_eq!(mean.count(), 4);
        assert!((mean.result() - 5.0).abs() < 1e-12);

        mean.reset();
        assert!(mean.is_empty());
        assert_eq!(mean.result(), 0.0);
    }

    #[test]
    fn test_mean_of_large_values_does_not_overflow() {
        let mut mean = MeanAggregator::new();
        for _ in 0..1_000 {
            mean.add_value(f64::MAX / 2.0);
        }
        assert!(mean.result().is_finite());
    }
}
