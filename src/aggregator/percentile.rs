//! Incremental percentile estimation with the P² algorithm
//!
//! Five markers track the minimum, `p/2`, `p`, `(1 + p)/2` and the maximum
//! quantiles of the stream seen so far. Every insertion shifts the marker
//! positions and, when a marker drifts at least one position away from its
//! desired position, moves its height with piecewise-parabolic interpolation,
//! falling back to linear interpolation when the parabola would leave the
//! neighbouring heights. Memory use is constant regardless of stream length.

use super::{Aggregator, AggregatorFactory};
use crate::error::{ProcessorError, Result};

const MARKERS: usize = 5;

fn validate(percentile: f64) -> Result<()> {
    if percentile.is_finite() && (0.0..=100.0).contains(&percentile) {
        Ok(())
    } else {
        Err(ProcessorError::configuration(format!(
            "percentile must be between 0 and 100, got {}",
            percentile
        )))
    }
}

/// P² estimator for one target percentile
#[derive(Debug, Clone)]
pub struct PercentileAggregator {
    percentile: f64,
    quantile: f64,
    count: u64,
    heights: [f64; MARKERS],
    positions: [f64; MARKERS],
    desired: [f64; MARKERS],
    increments: [f64; MARKERS],
}

impl PercentileAggregator {
    /// Create an estimator for `percentile` in `[0, 100]`
    pub fn new(percentile: f64) -> Result<Self> {
        validate(percentile)?;
        Ok(Self::unchecked(percentile))
    }

    fn unchecked(percentile: f64) -> Self {
        let quantile = percentile / 100.0;
        Self {
            percentile,
            quantile,
            count: 0,
            heights: [0.0; MARKERS],
            positions: [1.0, 2.0, 3.0, 4.0, 5.0],
            desired: [0.0; MARKERS],
            increments: [0.0, quantile / 2.0, quantile, (1.0 + quantile) / 2.0, 1.0],
        }
    }

    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    /// Exact value at the target rank while fewer than five values are held
    fn exact_estimate(&self) -> f64 {
        let n = self.count as usize;
        let mut seen = self.heights;
        let seen = &mut seen[..n];
        seen.sort_by(f64::total_cmp);
        let rank = (self.quantile * (n - 1) as f64).round() as usize;
        seen[rank.min(n - 1)]
    }

    fn initialize_markers(&mut self) {
        self.heights.sort_by(f64::total_cmp);
        let p = self.quantile;
        self.positions = [1.0, 2.0, 3.0, 4.0, 5.0];
        self.desired = [1.0, 1.0 + 2.0 * p, 1.0 + 4.0 * p, 3.0 + 2.0 * p, 5.0];
    }

    fn parabolic(&self, i: usize, d: f64) -> f64 {
        let (q, n) = (&self.heights, &self.positions);
        q[i] + d / (n[i + 1] - n[i - 1])
            * ((n[i] - n[i - 1] + d) * (q[i + 1] - q[i]) / (n[i + 1] - n[i])
                + (n[i + 1] - n[i] - d) * (q[i] - q[i - 1]) / (n[i] - n[i - 1]))
    }

    fn linear(&self, i: usize, d: f64) -> f64 {
        let j = if d > 0.0 { i + 1 } else { i - 1 };
        let (q, n) = (&self.heights, &self.positions);
        q[i] + d * (q[j] - q[i]) / (n[j] - n[i])
    }

    fn adjust_markers(&mut self) {
        for i in 1..MARKERS - 1 {
            let drift = self.desired[i] - self.positions[i];
            let room_right = self.positions[i + 1] - self.positions[i] > 1.0;
            let room_left = self.positions[i - 1] - self.positions[i] < -1.0;
            if (drift >= 1.0 && room_right) || (drift <= -1.0 && room_left) {
                let d = drift.signum();
                let candidate = self.parabolic(i, d);
                self.heights[i] = if self.heights[i - 1] < candidate && candidate < self.heights[i + 1] {
                    candidate
                } else {
                    self.linear(i, d)
                };
                self.positions[i] += d;
            }
        }
    }
}

impl Aggregator for PercentileAggregator {
    fn add_value(&mut self, value: f64) {
        if self.count < MARKERS as u64 {
            self.heights[self.count as usize] = value;
            self.count += 1;
            if self.count == MARKERS as u64 {
                self.initialize_markers();
            }
            return;
        }
        self.count += 1;

        let cell = if value < self.heights[0] {
            self.heights[0] = value;
            0
        } else if value >= self.heights[MARKERS - 1] {
            self.heights[MARKERS - 1] = value;
            MARKERS - 2
        } else {
            // heights[0] <= value < heights[4], so some marker is above it
            (1..MARKERS)
                .find(|&i| value < self.heights[i])
                .map_or(MARKERS - 2, |i| i - 1)
        };

        for position in &mut self.positions[cell + 1..] {
            *position += 1.0;
        }
        for (desired, increment) in self.desired.iter_mut().zip(self.increments.iter()) {
            *desired += increment;
        }
        self.adjust_markers();
    }

    fn result(&self) -> f64 {
        match self.count {
            0 => 0.0,
            n if n < MARKERS as u64 => self.exact_estimate(),
            // The extreme markers hold the exact minimum and maximum
            _ if self.quantile == 0.0 => self.heights[0],
            _ if self.quantile == 1.0 => self.heights[MARKERS - 1],
            _ => self.heights[2],
        }
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn reset(&mut self) {
        self.count = 0;
        self.heights = [0.0; MARKERS];
        self.positions = [1.0, 2.0, 3.0, 4.0, 5.0];
        self.desired = [0.0; MARKERS];
    }
}

/// Builds [`PercentileAggregator`]s for one percentile
#[derive(Debug, Clone, Copy)]
pub struct PercentileAggregatorFactory {
    percentile: f64,
}

impl PercentileAggregatorFactory {
    pub fn new(percentile: f64) -> Result<Self> {
        validate(percentile)?;
        Ok(Self { percentile })
    }

    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    /// Typed counterpart of [`AggregatorFactory::create`]
    pub fn create_percentile(&self) -> PercentileAggregator {
        PercentileAggregator::unchecked(self.percentile)
    }
}

impl AggregatorFactory for PercentileAggregatorFactory {
    fn create(&self) -> Box<dyn Aggregator> {
        Box::new(self.create_percentile())
    }

    fn describe(&self) -> String {
        format!("p{}", self.percentile)
    }
}
