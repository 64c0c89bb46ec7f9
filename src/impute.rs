//! Layered missing-value imputation.
//!
//! A column is filled by applying an ordered list of strategies; each strategy
//! only touches cells still missing after the previous ones, and the list stops
//! early once nothing is missing.

use serde::{Deserialize, Serialize};

use crate::stats;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Carry the last present value forward.
    ForwardFill,
    /// Carry the next present value backward.
    BackwardFill,
    /// Median of the values present when the strategy runs.
    Median,
    Constant(f64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImputeReport {
    pub missing_before: u64,
    pub forward_filled: u64,
    pub backward_filled: u64,
    pub median_filled: u64,
    pub constant_filled: u64,
    pub still_missing: u64,
}

impl ImputeReport {
    pub fn merge(&mut self, other: &ImputeReport) {
        self.missing_before += other.missing_before;
        self.forward_filled += other.forward_filled;
        self.backward_filled += other.backward_filled;
        self.median_filled += other.median_filled;
        self.constant_filled += other.constant_filled;
        self.still_missing += other.still_missing;
    }
}

/// Forward fill, then per-column median for leading gaps.
pub const FORWARD_THEN_MEDIAN: [ImputeStrategy; 2] =
    [ImputeStrategy::ForwardFill, ImputeStrategy::Median];

/// Forward fill, backward fill, then median.
pub const FORWARD_BACKWARD_MEDIAN: [ImputeStrategy; 3] = [
    ImputeStrategy::ForwardFill,
    ImputeStrategy::BackwardFill,
    ImputeStrategy::Median,
];

pub fn impute(values: &mut [Option<f64>], strategies: &[ImputeStrategy]) -> ImputeReport {
    let mut report = ImputeReport {
        missing_before: count_missing(values),
        ..ImputeReport::default()
    };

    for strategy in strategies {
        if count_missing(values) == 0 {
            break;
        }
        let filled = match strategy {
            ImputeStrategy::ForwardFill => forward_fill(values),
            ImputeStrategy::BackwardFill => backward_fill(values),
            ImputeStrategy::Median => match stats::median(&stats::present(values)) {
                Some(median) => fill_constant(values, median),
                None => 0,
            },
            ImputeStrategy::Constant(value) => fill_constant(values, *value),
        };
        match strategy {
            ImputeStrategy::ForwardFill => report.forward_filled += filled,
            ImputeStrategy::BackwardFill => report.backward_filled += filled,
            ImputeStrategy::Median => report.median_filled += filled,
            ImputeStrategy::Constant(_) => report.constant_filled += filled,
        }
    }

    report.still_missing = count_missing(values);
    report
}

pub fn count_missing(values: &[Option<f64>]) -> u64 {
    values.iter().filter(|v| v.is_none()).count() as u64
}

fn forward_fill(values: &mut [Option<f64>]) -> u64 {
    let mut last = None;
    let mut filled = 0;
    for slot in values.iter_mut() {
        match slot {
            Some(v) => last = Some(*v),
            None => {
                if last.is_some() {
                    *slot = last;
                    filled += 1;
                }
            }
        }
    }
    filled
}

fn backward_fill(values: &mut [Option<f64>]) -> u64 {
    let mut next = None;
    let mut filled = 0;
    for slot in values.iter_mut().rev() {
        match slot {
            Some(v) => next = Some(*v),
            None => {
                if next.is_some() {
                    *slot = next;
                    filled += 1;
                }
            }
        }
    }
    filled
}

fn fill_constant(values: &mut [Option<f64>], value: f64) -> u64 {
    let mut filled = 0;
    for slot in values.iter_mut().filter(|slot| slot.is_none()) {
        *slot = Some(value);
        filled += 1;
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_fill_then_median_covers_leading_gap() {
        let mut values = vec![None, Some(20.0), None, Some(22.0), None];
        let report = impute(&mut values, &FORWARD_THEN_MEDIAN);

        // median of [20, 20, 22, 22] after forward fill
        assert_eq!(
            values,
            vec![Some(21.0), Some(20.0), Some(20.0), Some(22.0), Some(22.0)]
        );
        assert_eq!(report.missing_before, 3);
        assert_eq!(report.forward_filled, 2);
        assert_eq!(report.median_filled, 1);
        assert_eq!(report.still_missing, 0);
    }

    #[test]
    fn backward_fill_runs_before_median() {
        let mut values = vec![None, None, Some(5.0), Some(7.0)];
        let report = impute(&mut values, &FORWARD_BACKWARD_MEDIAN);
        assert_eq!(values, vec![Some(5.0), Some(5.0), Some(5.0), Some(7.0)]);
        assert_eq!(report.backward_filled, 2);
        assert_eq!(report.median_filled, 0);
    }

    #[test]
    fn all_missing_column_stays_missing() {
        let mut values = vec![None, None];
        let report = impute(&mut values, &FORWARD_BACKWARD_MEDIAN);
        assert_eq!(values, vec![None, None]);
        assert_eq!(report.still_missing, 2);
    }

    #[test]
    fn complete_column_is_untouched() {
        let mut values = vec![Some(1.0), Some(2.0)];
        let report = impute(&mut values, &[ImputeStrategy::Constant(0.0)]);
        assert_eq!(values, vec![Some(1.0), Some(2.0)]);
        assert_eq!(report, ImputeReport::default());
    }

    #[test]
    fn missing_rating_filled_with_median_then_scaled() {
        let mut ratings = vec![Some(8.0), None];
        impute(&mut ratings, &[ImputeStrategy::Median]);
        assert_eq!(ratings[1], Some(8.0));

        let normalized: Vec<f64> = ratings.iter().flatten().map(|r| r / 10.0).collect();
        assert!((0.0..=1.0).contains(&normalized[1]));
    }
}
