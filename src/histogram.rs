//! Geometric-bucket histogram for hit-count distributions.
//!
//! Bucket `i` starts at `min_value` for `i == 0` and at
//! `min_value + round(base_bucket_size * (1 + growth_factor)^(i - 1))`
//! otherwise. Rounding can make neighbouring edges coincide; such buckets are
//! coalesced into the lower one, so a histogram may hold fewer buckets than
//! requested. The last bucket is open-ended.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::HistogramError;

pub const DEFAULT_NUM_BUCKETS: usize = 16;
pub const DEFAULT_GROWTH_FACTOR: f64 = 0.2;
pub const DEFAULT_BASE_BUCKET_SIZE: f64 = 1.0;
pub const DEFAULT_MIN_VALUE: i64 = 1;

/// Width of the `#` bar for a bucket holding every value.
const BAR_WIDTH: usize = 40;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistogramOptions {
    /// Requested bucket count (before coalescing). Zero is treated as one.
    pub num_buckets: usize,
    /// Each edge offset is `1 + growth_factor` times the previous one.
    pub growth_factor: f64,
    /// Offset of the second edge from `min_value`.
    pub base_bucket_size: f64,
    /// Smallest accepted value and lower edge of the first bucket.
    pub min_value: i64,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            num_buckets: DEFAULT_NUM_BUCKETS,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            base_bucket_size: DEFAULT_BASE_BUCKET_SIZE,
            min_value: DEFAULT_MIN_VALUE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Inclusive lower edge. The upper edge is the next bucket's lower edge.
    pub low_bound: i64,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    options: HistogramOptions,
    buckets: Vec<HistogramBucket>,
    count: u64,
    sum: i64,
    sum_of_squares: f64,
    min: i64,
    max: i64,
}

impl Histogram {
    pub fn new(options: HistogramOptions) -> Self {
        let requested = options.num_buckets.max(1);
        let mut buckets = Vec::with_capacity(requested);
        buckets.push(HistogramBucket { low_bound: options.min_value, count: 0 });

        let multiplier = 1.0 + options.growth_factor;
        let mut delta = options.base_bucket_size;
        for _ in 1..requested {
            let last = buckets[buckets.len() - 1].low_bound;
            let offset = if delta.is_finite() { delta.round().max(0.0) as i64 } else { i64::MAX };
            let edge = options.min_value.saturating_add(offset).max(last);
            if edge > last {
                buckets.push(HistogramBucket { low_bound: edge, count: 0 });
            }
            delta *= multiplier;
        }

        if buckets.len() < requested {
            trace!(requested, kept = buckets.len(), "coalesced coinciding bucket edges");
        }

        Self {
            options,
            buckets,
            count: 0,
            sum: 0,
            sum_of_squares: 0.0,
            min: i64::MAX,
            max: i64::MIN,
        }
    }

    /// Count `value` in its bucket.
    ///
    /// # Errors
    /// [`HistogramError::BelowMinimum`] if `value < min_value`; nothing is
    /// recorded in that case.
    pub fn add(&mut self, value: i64) -> Result<(), HistogramError> {
        if value < self.options.min_value {
            return Err(HistogramError::BelowMinimum { value, min: self.options.min_value });
        }
        let idx = self.buckets.partition_point(|b| b.low_bound <= value) - 1;
        self.buckets[idx].count += 1;

        self.count += 1;
        self.sum = self.sum.saturating_add(value);
        self.sum_of_squares += (value as f64) * (value as f64);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        Ok(())
    }

    pub fn options(&self) -> &HistogramOptions {
        &self.options
    }

    pub fn buckets(&self) -> &[HistogramBucket] {
        &self.buckets
    }

    /// Number of accepted values.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> i64 {
        self.sum
    }

    pub fn min(&self) -> Option<i64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<i64> {
        (self.count > 0).then_some(self.max)
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum as f64 / self.count as f64
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mean = self.mean();
        (self.sum_of_squares / self.count as f64 - mean * mean).max(0.0).sqrt()
    }
}

impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Count: {}  Min: {}  Max: {}  Avg: {:.2}  StdDev: {:.2}",
            self.count,
            self.min().unwrap_or(0),
            self.max().unwrap_or(0),
            self.mean(),
            self.std_dev()
        )?;
        writeln!(f, "{}", "-".repeat(72))?;
        if self.count == 0 {
            return Ok(());
        }

        let mut cumulative = 0u64;
        for (i, bucket) in self.buckets.iter().enumerate() {
            cumulative += bucket.count;
            let upper = match self.buckets.get(i + 1) {
                Some(next) => next.low_bound.to_string(),
                None => "inf".to_string(),
            };
            let percent = 100.0 * bucket.count as f64 / self.count as f64;
            let cumulative_percent = 100.0 * cumulative as f64 / self.count as f64;
            let bar = (bucket.count as usize * BAR_WIDTH).div_ceil(self.count as usize);
            writeln!(
                f,
                "[{:>8}, {:>8})  {:>7}  {:>5.1}%  {:>5.1}%  {}",
                bucket.low_bound,
                upper,
                bucket.count,
                percent,
                cumulative_percent,
                "#".repeat(bar)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_edges_coalesce_and_increase() {
        let hist = Histogram::new(HistogramOptions::default());
        let edges: Vec<i64> = hist.buckets().iter().map(|b| b.low_bound).collect();
        assert_eq!(edges, vec![1, 2, 3, 4, 5, 6, 7, 8, 10, 12, 14]);
        assert!(edges.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn values_land_in_their_bucket() {
        let mut hist = Histogram::new(HistogramOptions::default());
        for v in [1, 1, 2, 9, 10, 11, 500] {
            hist.add(v).unwrap();
        }
        let count_at = |low: i64| {
            hist.buckets().iter().find(|b| b.low_bound == low).map(|b| b.count).unwrap()
        };
        assert_eq!(count_at(1), 2);
        assert_eq!(count_at(2), 1);
        assert_eq!(count_at(8), 1);
        assert_eq!(count_at(10), 2);
        // Open-ended last bucket.
        assert_eq!(count_at(14), 1);
        assert_eq!(hist.min(), Some(1));
        assert_eq!(hist.max(), Some(500));
    }

    #[test]
    fn below_minimum_is_rejected_and_not_counted() {
        let mut hist = Histogram::new(HistogramOptions::default());
        assert_eq!(hist.add(0), Err(HistogramError::BelowMinimum { value: 0, min: 1 }));
        hist.add(3).unwrap();
        assert_eq!(hist.add(-5).unwrap_err(), HistogramError::BelowMinimum { value: -5, min: 1 });

        let total: u64 = hist.buckets().iter().map(|b| b.count).sum();
        assert_eq!(total, 1);
        assert_eq!(hist.count(), 1);
    }

    #[test]
    fn bucket_counts_sum_to_accepted_values() {
        let options = HistogramOptions { num_buckets: 8, growth_factor: 1.0, ..Default::default() };
        let mut hist = Histogram::new(options);
        let mut accepted = 0;
        for v in -3..200 {
            if hist.add(v).is_ok() {
                accepted += 1;
            }
        }
        let total: u64 = hist.buckets().iter().map(|b| b.count).sum();
        assert_eq!(total, accepted);
        assert_eq!(hist.count(), accepted);
    }

    #[test]
    fn degenerate_options_keep_one_bucket() {
        let options = HistogramOptions { num_buckets: 0, ..Default::default() };
        assert_eq!(Histogram::new(options).buckets().len(), 1);

        let options = HistogramOptions { base_bucket_size: 0.0, growth_factor: 0.0, ..Default::default() };
        assert_eq!(Histogram::new(options).buckets().len(), 1);
    }

    #[test]
    fn mean_and_std_dev() {
        let mut hist = Histogram::new(HistogramOptions::default());
        for v in [2, 4, 4, 4, 5, 5, 7, 9] {
            hist.add(v).unwrap();
        }
        assert!((hist.mean() - 5.0).abs() < 1e-9);
        assert!((hist.std_dev() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn display_lists_every_bucket() {
        let mut hist = Histogram::new(HistogramOptions::default());
        hist.add(1).unwrap();
        hist.add(3).unwrap();
        let text = hist.to_string();
        assert!(text.starts_with("Count: 2"));
        assert_eq!(text.lines().filter(|l| l.starts_with('[')).count(), hist.buckets().len());
        assert!(text.contains("inf)"));
        assert!(text.contains("100.0%"));
    }
}
