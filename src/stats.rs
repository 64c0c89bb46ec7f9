//! Column statistics shared by the pipelines.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation dividing by N.
pub fn population_std(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values
        .iter()
        .map(|v| {
            let d = *v - mean;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    Some(variance.sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile_linear(values, 0.5)
}

/// Quantile with linear interpolation between closest ranks (`pos = q * (n - 1)`).
pub fn quantile_linear(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q * (sorted.len() as f64 - 1.0);
    let lower = pos.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Present values only, in order.
pub fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

/// Trailing mean over the last `window` positions, including the current one.
///
/// Missing positions occupy a slot but do not contribute; a position yields a
/// mean as soon as one value in its window is present. A window whose present
/// values are all equal yields that value exactly.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    let mut slots: VecDeque<Option<f64>> = VecDeque::with_capacity(window);
    let mut out = Vec::with_capacity(values.len());

    for value in values {
        slots.push_back(*value);
        while slots.len() > window {
            slots.pop_front();
        }

        let Some(&first) = slots.iter().flatten().next() else {
            out.push(None);
            continue;
        };
        if slots.iter().flatten().all(|v| *v == first) {
            out.push(Some(first));
            continue;
        }
        let (sum, count) = slots
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
        out.push(Some(sum / count as f64));
    }

    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardized {
    pub scores: Vec<f64>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub degenerate: bool,
}

/// Largest absolute present value, `0.0` when nothing is present.
pub fn max_abs(values: &[Option<f64>]) -> f64 {
    values.iter().flatten().fold(0.0, |acc: f64, v| acc.max(v.abs()))
}

/// Round-off floor for a std computed over `n` values of magnitude `scale`.
pub fn degenerate_std_threshold(scale: f64, n: usize) -> f64 {
    f64::EPSILON * scale * n as f64
}

/// Z-scores against the population mean/std of the present values.
///
/// Same as [`standardize_with_scale`] using the values' own magnitude.
pub fn standardize(values: &[Option<f64>]) -> Standardized {
    standardize_with_scale(values, 0.0)
}

/// Z-scores with the degenerate cutoff measured against `scale` or the
/// values' own magnitude, whichever is larger.
///
/// When the std is undefined, non-finite or within
/// [`degenerate_std_threshold`], every score is 0.0. Missing inputs also
/// score 0.0.
pub fn standardize_with_scale(values: &[Option<f64>], scale: f64) -> Standardized {
    let observed = present(values);
    let mean = mean(&observed);
    let std = population_std(&observed);
    let threshold = degenerate_std_threshold(scale.abs().max(max_abs(values)), observed.len());

    match (mean, std) {
        (Some(m), Some(s)) if s.is_finite() && s > threshold => Standardized {
            scores: values
                .iter()
                .map(|v| v.map(|x| (x - m) / s).unwrap_or(0.0))
                .collect(),
            mean,
            std,
            degenerate: false,
        },
        _ => Standardized {
            scores: vec![0.0; values.len()],
            mean,
            std,
            degenerate: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "actual={actual} expected={expected}"
        );
    }

    #[test]
    fn quantiles_interpolate_between_ranks() {
        let values = [10.0, 12.0, 9.0, 100.0, 11.0];
        assert_close(quantile_linear(&values, 0.25).unwrap(), 10.0);
        assert_close(quantile_linear(&values, 0.75).unwrap(), 12.0);
        assert_close(quantile_linear(&[1.0, 2.0, 3.0, 4.0], 0.25).unwrap(), 1.75);
        assert_close(median(&[4.0, 1.0, 3.0, 2.0]).unwrap(), 2.5);
        assert_eq!(quantile_linear(&[], 0.5), None);
        assert_eq!(quantile_linear(&[1.0], 1.5), None);
    }

    #[test]
    fn population_std_divides_by_n() {
        assert_close(population_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap(), 2.0);
        assert_eq!(population_std(&[3.0]), Some(0.0));
        assert_eq!(population_std(&[]), None);
    }

    #[test]
    fn rolling_mean_uses_shrinking_window_at_start() {
        let values = [Some(20.0), Some(20.0), Some(22.0), Some(21.0), Some(21.0)];
        let rolled = rolling_mean(&values, 3);
        let expected = [20.0, 20.0, 62.0 / 3.0, 21.0, 64.0 / 3.0];
        for (got, want) in rolled.iter().zip(expected) {
            assert_close(got.unwrap(), want);
        }
    }

    #[test]
    fn rolling_mean_skips_missing_slots() {
        let values = [None, Some(4.0), None, None, Some(8.0)];
        let rolled = rolling_mean(&values, 2);
        assert_eq!(rolled, vec![None, Some(4.0), Some(4.0), None, Some(8.0)]);
    }

    #[test]
    fn standardize_falls_back_to_zero_for_constant_input() {
        let out = standardize(&[Some(0.1), Some(0.1), Some(0.1)]);
        assert!(out.degenerate);
        assert_eq!(out.scores, vec![0.0, 0.0, 0.0]);

        let single = standardize(&[Some(42.0)]);
        assert!(single.degenerate);
        assert_eq!(single.scores, vec![0.0]);

        let empty = standardize(&[None, None]);
        assert!(empty.degenerate);
        assert_eq!(empty.std, None);
    }

    #[test]
    fn constant_window_mean_is_exact_at_any_magnitude() {
        for value in [0.1, 101_325.013, 1e9 + 0.753] {
            let values = vec![Some(value); 9];
            let rolled = rolling_mean(&values, 3);
            assert!(rolled.iter().all(|r| *r == Some(value)), "value={value}");
        }

        let gappy = [Some(7.3), None, Some(7.3)];
        assert_eq!(rolling_mean(&gappy, 3), vec![Some(7.3); 3]);
    }

    #[test]
    fn round_off_noise_is_degenerate_relative_to_scale() {
        let noise = [Some(0.0), Some(1.5e-11), Some(-1.5e-11), Some(0.0)];
        assert!(!standardize(&noise).degenerate);

        let against_signal = standardize_with_scale(&noise, 101_325.0);
        assert!(against_signal.degenerate);
        assert_eq!(against_signal.scores, vec![0.0; 4]);
    }

    #[test]
    fn tiny_but_varying_values_are_not_degenerate() {
        let out = standardize(&[Some(1e-13), Some(3e-13), Some(2e-13)]);
        assert!(!out.degenerate);
        assert!(out.scores.iter().all(|z| z.is_finite()));
        assert!(out.scores.iter().any(|z| *z != 0.0));
    }

    #[test]
    fn standardize_centers_and_scales() {
        let out = standardize(&[Some(1.0), Some(3.0)]);
        assert!(!out.degenerate);
        assert_eq!(out.scores, vec![-1.0, 1.0]);
    }
}
