use super::{Aggregator, AggregatorFactory};

/// Running total
#[derive(Debug, Clone, Default)]
pub struct SumAggregator {
    sum: f64,
    count: u64,
}

impl Aggregator for SumAggregator {
    fn add_value(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn result(&self) -> f64 {
        self.sum
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Smallest value seen
#[derive(Debug, Clone, Default)]
pub struct MinAggregator {
    min: Option<f64>,
    count: u64,
}

impl Aggregator for MinAggregator {
    fn add_value(&mut self, value: f64) {
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.count += 1;
    }

    fn result(&self) -> f64 {
        self.min.unwrap_or(0.0)
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Largest value seen
#[derive(Debug, Clone, Default)]
pub struct MaxAggregator {
    max: Option<f64>,
    count: u64,
}

impl Aggregator for MaxAggregator {
    fn add_value(&mut self, value: f64) {
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.count += 1;
    }

    fn result(&self) -> f64 {
        self.max.unwrap_or(0.0)
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SumAggregatorFactory;

impl AggregatorFactory for SumAggregatorFactory {
    fn create(&self) -> Box<dyn Aggregator> {
        Box::<SumAggregator>::default()
    }

    fn describe(&self) -> String {
        "sum".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MinAggregatorFactory;

impl AggregatorFactory for MinAggregatorFactory {
    fn create(&self) -> Box<dyn Aggregator> {
        Box::<MinAggregator>::default()
    }

    fn describe(&self) -> String {
        "min".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MaxAggregatorFactory;

impl AggregatorFactory for MaxAggregatorFactory {
    fn create(&self) -> Box<dyn Aggregator> {
        Box::<MaxAggregator>::default()
    }

    fn describe(&self) -> String {
        "max".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_min_max() {
        let mut aggregators: Vec<Box<dyn Aggregator>> = vec![
            SumAggregatorFactory.create(),
            MinAggregatorFactory.create(),
            MaxAggregatorFactory.create(),
        ];
        for v in [4.0, -2.0, 7.5] {
            for aggregator in &mut aggregators {
                aggregator.add_value(v);
            }
        }
        let results: Vec<f64> = aggregators.iter().map(|a| a.result()).collect();
        assert_eq!(results, vec![9.5, -2.0, 7.5]);

        for aggregator in &mut aggregators {
            aggregator.reset();
            assert_eq!(aggregator.count(), 0);
            assert_eq!(aggregator.result(), 0.0);
        }
    }
}
