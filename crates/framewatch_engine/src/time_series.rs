//! Time Series Analysis
//!
//! Smoothing, decomposition and calendar seasonality on ordered series.
//! Like the statistics core, these are pure functions that never log.

use crate::statistics::{bucket_means, mean, std_dev, variance, MIN_SEASONAL_SAMPLES};
use crate::types::{
    metric_values, sorted_by_time, MetricType, PatternType, PeriodStat, Sample, SeasonalPattern,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.3;

/// Longest forecast a decomposition will extrapolate
pub const MAX_DECOMPOSITION_FORECAST: usize = 14;

/// Single exponential smoothing followed by a flat forecast
///
/// Returns `values.len() + forecast_periods` points: the smoothed series,
/// then the last smoothed value repeated. Alpha outside (0, 1] falls back to
/// [`DEFAULT_SMOOTHING_ALPHA`]. A non-finite value carries the previous
/// level forward; a series with no finite value yields nothing.
pub fn exponential_smoothing(values: &[f64], alpha: f64, forecast_periods: usize) -> Vec<f64> {
    let Some(first) = values.iter().copied().find(|v| v.is_finite()) else {
        return Vec::new();
    };

    let alpha = if alpha.is_finite() && alpha > 0.0 && alpha <= 1.0 {
        alpha
    } else {
        DEFAULT_SMOOTHING_ALPHA
    };

    let mut output = Vec::with_capacity(values.len() + forecast_periods);
    let mut level: Option<f64> = None;
    for &value in values {
        if value.is_finite() {
            level = Some(match level {
                Some(previous) => alpha * value + (1.0 - alpha) * previous,
                None => value,
            });
        }
        output.push(level.unwrap_or(first));
    }

    let level = level.unwrap_or(first);
    output.extend(std::iter::repeat(level).take(forecast_periods));
    output
}

/// Linearly weighted moving average, newest point weighted `window`
///
/// Non-finite values are dropped before windowing.
pub fn weighted_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let values = finite(values);
    if window == 0 || window > values.len() {
        return Vec::new();
    }

    let weight_sum = window as f64 * (window as f64 + 1.0) / 2.0;
    values
        .windows(window)
        .map(|w| {
            w.iter()
                .enumerate()
                .map(|(i, v)| v * (i + 1) as f64)
                .sum::<f64>()
                / weight_sum
        })
        .collect()
}

// ============================================================================
// Seasonal decomposition
// ============================================================================

/// Additive trend + seasonal + residual split of a series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonalDecomposition {
    pub period: usize,
    /// Centered moving average, one value per input point
    pub trend: Vec<f64>,
    /// Seasonal component per input point
    pub seasonal: Vec<f64>,
    /// One centred index per phase of the cycle
    pub seasonal_indices: Vec<f64>,
    pub residual: Vec<f64>,
    pub forecast: Vec<f64>,
    pub trend_strength: f64,
    pub seasonal_strength: f64,
}

impl SeasonalDecomposition {
    /// True when there was not enough data to decompose
    pub fn is_degenerate(&self) -> bool {
        self.trend.is_empty()
    }
}

/// Decompose `metric` of `samples` after ordering them by timestamp
pub fn seasonal_decomposition(
    samples: &[Sample],
    period: usize,
    metric: MetricType,
) -> SeasonalDecomposition {
    let values = metric_values(&sorted_by_time(samples), metric);
    decompose_values(&values, period)
}

/// Decompose an ordered series; needs `period >= 2` and two full cycles
///
/// Non-finite values are dropped first and do not count toward the cycles.
pub fn decompose_values(values: &[f64], period: usize) -> SeasonalDecomposition {
    let values = finite(values);
    let values = values.as_slice();
    let n = values.len();
    if period < 2 || n < period.saturating_mul(2) {
        return SeasonalDecomposition {
            period,
            ..Default::default()
        };
    }

    let trend = centered_moving_average(values, period);

    let cycles = n / period;
    let mut phase_sums = vec![0.0; period];
    for i in 0..cycles * period {
        phase_sums[i % period] += values[i] - trend[i];
    }
    let raw_indices: Vec<f64> = phase_sums.iter().map(|s| s / cycles as f64).collect();
    let offset = mean(&raw_indices);
    let seasonal_indices: Vec<f64> = raw_indices.iter().map(|s| s - offset).collect();

    let seasonal: Vec<f64> = (0..n).map(|i| seasonal_indices[i % period]).collect();
    let residual: Vec<f64> = (0..n).map(|i| values[i] - trend[i] - seasonal[i]).collect();

    let last_trend = trend[n - 1];
    let forecast = (0..period.min(MAX_DECOMPOSITION_FORECAST))
        .map(|h| last_trend + seasonal_indices[(n + h) % period])
        .collect();

    let total_variance = variance(values);
    let strength = |component: &[f64]| {
        if total_variance <= 0.0 {
            0.0
        } else {
            (variance(component) / total_variance).clamp(0.0, 1.0)
        }
    };

    SeasonalDecomposition {
        period,
        trend_strength: strength(&trend),
        seasonal_strength: strength(&seasonal),
        trend,
        seasonal,
        seasonal_indices,
        residual,
        forecast,
    }
}

/// Centered average over one period; edges copy the nearest full window
///
/// Odd periods average `[i - half, i + half]`. Even periods use the 2×m
/// average over `[i - half, i + half]` with both end points half weighted.
fn centered_moving_average(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let half = period / 2;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for v in values {
        prefix.push(prefix[prefix.len() - 1] + v);
    }

    let first = half;
    let last = n - 1 - half;
    let window_mean = |i: usize| {
        let mut sum = prefix[i + half + 1] - prefix[i - half];
        if period % 2 == 0 {
            sum -= 0.5 * (values[i - half] + values[i + half]);
        }
        sum / period as f64
    };

    (0..n).map(|i| window_mean(i.clamp(first, last))).collect()
}

fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

// ============================================================================
// Calendar seasonality
// ============================================================================

/// Find hourly/daily/weekly/monthly cycles in `metric`
///
/// A grain is reported only when its bucket means vary by at least 10% of
/// their mean. Peak and low buckets sit half an amplitude above/below it.
pub fn detect_seasonal_patterns(
    samples: &[Sample],
    pattern_types: &[PatternType],
    metric: MetricType,
) -> Vec<SeasonalPattern> {
    let all_values = metric_values(samples, metric);
    let total = all_values.len();
    if total < MIN_SEASONAL_SAMPLES {
        return Vec::new();
    }

    let Some(latest) = samples
        .iter()
        .filter(|s| s.value(metric).is_some())
        .map(|s| s.timestamp)
        .max()
    else {
        return Vec::new();
    };
    let value_variance = variance(&all_values);

    let mut patterns = Vec::new();
    for &pattern_type in pattern_types {
        let filled: Vec<(usize, f64, usize)> = bucket_means(samples, metric, pattern_type)
            .into_iter()
            .enumerate()
            .filter_map(|(i, b)| b.map(|(m, c)| (i, m, c)))
            .collect();
        if filled.len() < 2 {
            continue;
        }

        let means: Vec<f64> = filled.iter().map(|(_, m, _)| *m).collect();
        let overall = mean(&means);
        let amplitude = std_dev(&means);
        if overall <= 0.0 || amplitude / overall < 0.1 {
            continue;
        }

        let stat = |&(bucket, avg, count): &(usize, f64, usize)| PeriodStat {
            bucket,
            label: pattern_type.label(bucket),
            average_value: avg,
            frequency: count as f64 / total as f64,
        };

        let mut peak_periods: Vec<PeriodStat> = filled
            .iter()
            .filter(|(_, m, _)| *m > overall + 0.5 * amplitude)
            .map(stat)
            .collect();
        peak_periods.sort_by(|a, b| b.average_value.total_cmp(&a.average_value));

        let mut low_periods: Vec<PeriodStat> = filled
            .iter()
            .filter(|(_, m, _)| *m < overall - 0.5 * amplitude)
            .map(stat)
            .collect();
        low_periods.sort_by(|a, b| a.average_value.total_cmp(&b.average_value));

        let adequacy = (total as f64 / (pattern_type.bucket_count() * 5) as f64).min(1.0);
        let pattern_strength = ((amplitude / overall) / 0.5).min(1.0);
        let seasonal_strength = if value_variance > 0.0 {
            (variance(&means) / value_variance).min(1.0)
        } else {
            0.0
        };

        patterns.push(SeasonalPattern {
            pattern_type,
            metric,
            next_peak: peak_periods
                .first()
                .and_then(|p| pattern_type.next_occurrence(&latest, p.bucket)),
            next_low: low_periods
                .first()
                .and_then(|p| pattern_type.next_occurrence(&latest, p.bucket)),
            peak_periods,
            low_periods,
            amplitude,
            confidence: (adequacy + pattern_strength) / 2.0,
            seasonal_strength,
        });
    }

    patterns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothing_alpha_fallback() {
        let smoothed = exponential_smoothing(&[10.0, 20.0], f64::NAN, 1);
        assert_eq!(smoothed.len(), 3);
        assert!((smoothed[1] - 13.0).abs() < 1e-12);
        assert_eq!(smoothed[2], smoothed[1]);
    }

    #[test]
    fn test_weighted_moving_average() {
        let wma = weighted_moving_average(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(wma.len(), 2);
        // (1*1 + 2*2 + 3*3) / 6
        assert!((wma[0] - 14.0 / 6.0).abs() < 1e-12);
        assert!(weighted_moving_average(&[1.0], 3).is_empty());
        assert!(weighted_moving_average(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn test_decomposition_degenerate() {
        let result = decompose_values(&[1.0, 2.0, 3.0], 7);
        assert!(result.is_degenerate());
        assert_eq!(result.seasonal_strength, 0.0);
        assert!(result.forecast.is_empty());
    }

    #[test]
    fn test_even_period_average_is_centred() {
        let values: Vec<f64> = (0..12).map(|i| 2.0 * i as f64 + 1.0).collect();
        let trend = centered_moving_average(&values, 4);
        for i in 2..10 {
            assert!((trend[i] - values[i]).abs() < 1e-9);
        }
        assert!((trend[0] - values[2]).abs() < 1e-9);
        assert!((trend[11] - values[9]).abs() < 1e-9);
    }

    #[test]
    fn test_centered_moving_average_edges() {
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let trend = centered_moving_average(&values, 3);
        assert_eq!(trend.len(), 10);
        assert!((trend[0] - 1.0).abs() < 1e-12);
        assert!((trend[5] - 5.0).abs() < 1e-12);
        assert!((trend[9] - 8.0).abs() < 1e-12);
    }
}
