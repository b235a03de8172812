//! # Streaming Aggregators
//!
//! An [`Aggregator`] folds a stream of real numbers into one derived scalar
//! without retaining the stream. Aggregators are stateful and must never be
//! shared between series: summaries ask an [`AggregatorFactory`] for a fresh
//! instance per aggregation key, so identical configuration yields
//! independent but comparable accumulators.

use std::fmt::Debug;

pub mod basic;
pub mod mean;
pub mod percentile;

pub use basic::{
    MaxAggregator, MaxAggregatorFactory, MinAggregator, MinAggregatorFactory, SumAggregator,
    SumAggregatorFactory,
};
pub use mean::{MeanAggregator, MeanAggregatorFactory};
pub use percentile::{PercentileAggregator, PercentileAggregatorFactory};

/// Mutable accumulator over a sequence of values
pub trait Aggregator: Send + Debug {
    /// Feed one value
    fn add_value(&mut self, value: f64);

    /// Current estimate; `0.0` until the first value has been added
    fn result(&self) -> f64;

    /// Number of values fed since creation or the last reset
    fn count(&self) -> u64;

    /// Return to the freshly-created state
    fn reset(&mut self);

    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Creates independently-stated aggregators sharing one configuration
pub trait AggregatorFactory: Send + Sync + Debug {
    fn create(&self) -> Box<dyn Aggregator>;

    /// Short human-readable description, e.g. `"mean"` or `"p95"`
    fn describe(&self) -> String;
}
