//! Statistics Core
//!
//! Leaf primitives every other component builds on:
//! - Linear regression with an approximate significance test
//! - Descriptive statistics (percentiles, IQR outliers)
//! - Z-score anomaly detection
//! - Pearson correlation
//! - Trend analysis and the Mann-Kendall test
//! - A basic hour/weekday seasonality scan
//!
//! Everything here is a pure function of its input. No logging, no clock.
//! Degenerate input (empty, short, constant) returns a neutral result.

use crate::error::{EngineError, Result};
use crate::types::{
    metric_values, sorted_by_time, MetricType, PatternType, PeriodStat, Sample, SeasonalPattern,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Regression needs at least this many points
pub const MIN_REGRESSION_POINTS: usize = 3;

/// Trend analysis needs at least this many points
pub const MIN_TREND_POINTS: usize = 5;

/// Anomaly detection needs at least this many valid values
pub const MIN_ANOMALY_POINTS: usize = 5;

pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 2.5;

/// Z-score reported when the baseline has zero spread but the value differs
pub const MAX_Z_SCORE: f64 = 10.0;

/// Seasonality scans need at least a day of hourly data
pub const MIN_SEASONAL_SAMPLES: usize = 24;

/// Fitted change across the window below this share of the mean is "stable"
const STABLE_CHANGE_RATIO: f64 = 0.05;

const EPSILON: f64 = 1e-9;

// ============================================================================
// Basic helpers
// ============================================================================

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Population variance
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Linear-interpolated percentile of an ascending slice
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

// ============================================================================
// Linear regression
// ============================================================================

/// Ordinary least squares fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionResult {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub correlation: f64,
    /// Table lookup, not a t-distribution CDF
    pub p_value: f64,
    pub is_significant: bool,
}

impl RegressionResult {
    /// Flat line through the mean; never significant
    pub fn neutral(level: f64) -> Self {
        Self {
            slope: 0.0,
            intercept: if level.is_finite() { level } else { 0.0 },
            r_squared: 0.0,
            correlation: 0.0,
            p_value: 1.0,
            is_significant: false,
        }
    }

    /// Value of the fitted line at `x`
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fit `values` against their index 0..n-1
///
/// Non-finite values are skipped; the rest keep their original index.
pub fn linear_regression(values: &[f64]) -> RegressionResult {
    let xs: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    fit_least_squares(&xs, values)
}

/// Fit `ys` against explicit `xs`
pub fn linear_regression_xy(xs: &[f64], ys: &[f64]) -> Result<RegressionResult> {
    if xs.len() != ys.len() {
        return Err(EngineError::LengthMismatch {
            left: xs.len(),
            right: ys.len(),
        });
    }
    Ok(fit_least_squares(xs, ys))
}

fn fit_least_squares(xs: &[f64], ys: &[f64]) -> RegressionResult {
    // Points with a non-finite coordinate are dropped, keeping their x.
    let (xs, ys): (Vec<f64>, Vec<f64>) = xs
        .iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .unzip();
    let n = ys.len();
    let mean_y = mean(&ys);
    if n < MIN_REGRESSION_POINTS {
        return RegressionResult::neutral(mean_y);
    }

    let mean_x = mean(&xs);
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(&ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    if sxx <= EPSILON {
        return RegressionResult::neutral(mean_y);
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let ss_res: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum();

    let (r_squared, correlation) = if syy > EPSILON {
        (
            (1.0 - ss_res / syy).clamp(0.0, 1.0),
            (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0),
        )
    } else {
        (0.0, 0.0)
    };

    let p_value = approximate_p_value(correlation, n);

    RegressionResult {
        slope,
        intercept,
        r_squared,
        correlation,
        p_value,
        is_significant: p_value < 0.05 && r_squared.abs() > 0.1,
    }
}

/// Coarse p-value for a correlation coefficient over `n` points
///
/// Keyed on t = |r|·sqrt((n-2)/(1-r²)) against fixed cutoffs. Downstream
/// significance decisions depend on these exact cutoffs.
pub fn approximate_p_value(r: f64, n: usize) -> f64 {
    if n < MIN_REGRESSION_POINTS || !r.is_finite() {
        return 1.0;
    }

    let denom = 1.0 - r * r;
    let t = if denom <= 1e-12 {
        f64::MAX
    } else {
        r.abs() * ((n - 2) as f64 / denom).sqrt()
    };

    match t {
        t if t >= 3.5 => 0.001,
        t if t >= 2.8 => 0.01,
        t if t >= 2.0 => 0.05,
        t if t >= 1.5 => 0.1,
        _ => 0.5,
    }
}

// ============================================================================
// Descriptive statistics
// ============================================================================

/// Summary of a numeric sample set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticalResult {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    /// Values outside Q1 - 1.5·IQR .. Q3 + 1.5·IQR
    pub outliers: Vec<f64>,
}

/// Describe `values`; non-finite entries are ignored, empty input is all zero
pub fn calculate_statistics(values: &[f64]) -> StatisticalResult {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return StatisticalResult::default();
    }

    let p25 = percentile(&sorted, 25.0);
    let p75 = percentile(&sorted, 75.0);
    let iqr = p75 - p25;
    let lower_fence = p25 - 1.5 * iqr;
    let upper_fence = p75 + 1.5 * iqr;

    StatisticalResult {
        count: sorted.len(),
        mean: mean(&sorted),
        median: percentile(&sorted, 50.0),
        std_dev: std_dev(&sorted),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        p25,
        p75,
        p90: percentile(&sorted, 90.0),
        p95: percentile(&sorted, 95.0),
        outliers: sorted
            .iter()
            .copied()
            .filter(|v| *v < lower_fence || *v > upper_fence)
            .collect(),
    }
}

// ============================================================================
// Anomaly detection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AnomalySeverity {
    pub fn from_z_score(z: f64) -> Self {
        match z {
            z if z > 4.0 => AnomalySeverity::Critical,
            z if z > 3.0 => AnomalySeverity::High,
            z if z > 2.5 => AnomalySeverity::Medium,
            _ => AnomalySeverity::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalySeverity::Low => "low",
            AnomalySeverity::Medium => "medium",
            AnomalySeverity::High => "high",
            AnomalySeverity::Critical => "critical",
        }
    }
}

/// One flagged sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetection {
    pub metric: MetricType,
    pub value: f64,
    /// Mean of the other valid samples in the window
    pub expected_value: f64,
    /// `value - expected_value`
    pub deviation: f64,
    pub z_score: f64,
    pub severity: AnomalySeverity,
    pub timestamp: DateTime<Utc>,
    /// Share of the window at or below this value (0-100)
    pub percentile: f64,
}

/// Flag samples whose `metric` sits more than `threshold` deviations away
///
/// Each value is scored against the mean and spread of the remaining
/// values, so a single spike cannot inflate its own baseline. Results come
/// back in ascending timestamp order.
pub fn detect_anomalies(
    samples: &[Sample],
    metric: MetricType,
    threshold: f64,
) -> Vec<AnomalyDetection> {
    let threshold = if threshold.is_finite() && threshold >= 0.0 {
        threshold
    } else {
        DEFAULT_ANOMALY_THRESHOLD
    };

    let ordered = sorted_by_time(samples);
    let points: Vec<(DateTime<Utc>, f64)> = ordered
        .iter()
        .filter_map(|s| s.value(metric).map(|v| (s.timestamp, v)))
        .collect();

    let n = points.len();
    if n < MIN_ANOMALY_POINTS {
        return Vec::new();
    }

    let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
    let global_mean = mean(&values);
    let deltas: Vec<f64> = values.iter().map(|v| v - global_mean).collect();
    let sum_delta: f64 = deltas.iter().sum();
    let sum_delta_sq: f64 = deltas.iter().map(|d| d * d).sum();
    let others = (n - 1) as f64;
    let sorted = sorted_finite(&values);

    let mut anomalies = Vec::new();
    for ((timestamp, value), delta) in points.iter().zip(&deltas) {
        // Leave-one-out moments expressed through deviations from the global
        // mean, which keeps constant series exactly at zero spread.
        let rest_delta = sum_delta - delta;
        let expected = global_mean + rest_delta / others;
        let rest_var = ((sum_delta_sq - delta * delta) - rest_delta * rest_delta / others) / others;
        let spread = rest_var.max(0.0).sqrt();

        let deviation = value - expected;
        let z_score = if spread <= EPSILON {
            if deviation.abs() <= EPSILON {
                0.0
            } else {
                MAX_Z_SCORE
            }
        } else {
            deviation.abs() / spread
        };

        if z_score > threshold {
            let at_or_below = sorted.iter().filter(|v| **v <= *value).count();
            anomalies.push(AnomalyDetection {
                metric,
                value: *value,
                expected_value: expected,
                deviation,
                z_score,
                severity: AnomalySeverity::from_z_score(z_score),
                timestamp: *timestamp,
                percentile: at_or_below as f64 / n as f64 * 100.0,
            });
        }
    }

    anomalies
}

// ============================================================================
// Correlation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationDirection {
    Positive,
    Negative,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationSignificance {
    Significant,
    NotSignificant,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationAnalysis {
    pub coefficient: f64,
    pub strength: CorrelationStrength,
    pub direction: CorrelationDirection,
    pub significance: CorrelationSignificance,
    pub p_value: f64,
    pub sample_count: usize,
}

impl CorrelationAnalysis {
    fn neutral(sample_count: usize) -> Self {
        Self {
            coefficient: 0.0,
            strength: CorrelationStrength::Weak,
            direction: CorrelationDirection::None,
            significance: CorrelationSignificance::NotSignificant,
            p_value: 1.0,
            sample_count,
        }
    }
}

/// Pearson correlation of two equally long series
///
/// Unequal lengths are a caller bug and return an error; short or
/// zero-variance series return the neutral result.
pub fn correlation(a: &[f64], b: &[f64]) -> Result<CorrelationAnalysis> {
    if a.len() != b.len() {
        return Err(EngineError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let n = a.len();
    if n < MIN_REGRESSION_POINTS || a.iter().chain(b).any(|v| !v.is_finite()) {
        return Ok(CorrelationAnalysis::neutral(n));
    }

    let mean_a = mean(a);
    let mean_b = mean(b);
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }

    if var_a <= EPSILON || var_b <= EPSILON {
        return Ok(CorrelationAnalysis::neutral(n));
    }

    let r = (cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0);
    let p_value = approximate_p_value(r, n);

    let strength = match r.abs() {
        v if v > 0.7 => CorrelationStrength::Strong,
        v if v > 0.3 => CorrelationStrength::Moderate,
        _ => CorrelationStrength::Weak,
    };
    let direction = if r >= 0.1 {
        CorrelationDirection::Positive
    } else if r <= -0.1 {
        CorrelationDirection::Negative
    } else {
        CorrelationDirection::None
    };
    let significance = if p_value < 0.05 {
        CorrelationSignificance::Significant
    } else {
        CorrelationSignificance::NotSignificant
    };

    Ok(CorrelationAnalysis {
        coefficient: r,
        strength,
        direction,
        significance,
        p_value,
        sample_count: n,
    })
}

// ============================================================================
// Trend analysis
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    #[default]
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Up => "up",
            TrendDirection::Down => "down",
            TrendDirection::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    #[default]
    Low,
    Medium,
    High,
}

impl Significance {
    /// How much a trend of this significance counts when aggregating
    pub fn multiplier(&self) -> f64 {
        match self {
            Significance::High => 1.0,
            Significance::Medium => 0.7,
            Significance::Low => 0.3,
        }
    }
}

/// Direction and strength of change in one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub metric: MetricType,
    pub direction: TrendDirection,
    /// Change per sample
    pub slope: f64,
    /// |correlation|, 0-1
    pub confidence: f64,
    pub significance: Significance,
    pub r_squared: f64,
    /// One-step linear extrapolation
    pub forecast: Option<f64>,
    pub sample_count: usize,
    pub time_period: String,
}

impl TrendAnalysis {
    fn insufficient(metric: MetricType, sample_count: usize, time_period: &str) -> Self {
        Self {
            metric,
            direction: TrendDirection::Stable,
            slope: 0.0,
            confidence: 0.0,
            significance: Significance::Low,
            r_squared: 0.0,
            forecast: None,
            sample_count,
            time_period: time_period.to_string(),
        }
    }
}

/// Regression trend of `metric` over samples ordered by timestamp
pub fn analyze_trend(samples: &[Sample], metric: MetricType, time_period: &str) -> TrendAnalysis {
    let values = metric_values(&sorted_by_time(samples), metric);
    analyze_value_trend(&values, metric, time_period)
}

/// Regression trend of an already ordered value series
pub fn analyze_value_trend(values: &[f64], metric: MetricType, time_period: &str) -> TrendAnalysis {
    let n = values.len();
    if n < MIN_TREND_POINTS {
        return TrendAnalysis::insufficient(metric, n, time_period);
    }

    let regression = linear_regression(values);
    let level = mean(values).abs();
    let window_change = regression.slope.abs() * n as f64;

    let direction = if regression.slope == 0.0 || window_change < STABLE_CHANGE_RATIO * level {
        TrendDirection::Stable
    } else if regression.slope > 0.0 {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    };

    let significance = if regression.p_value <= 0.01 && regression.r_squared > 0.5 {
        Significance::High
    } else if regression.is_significant {
        Significance::Medium
    } else {
        Significance::Low
    };

    TrendAnalysis {
        metric,
        direction,
        slope: regression.slope,
        confidence: regression.correlation.abs(),
        significance,
        r_squared: regression.r_squared,
        forecast: Some(regression.predict(n as f64)),
        sample_count: n,
        time_period: time_period.to_string(),
    }
}

// ============================================================================
// Mann-Kendall
// ============================================================================

/// Rank-based monotonic trend test, robust to outliers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MannKendallResult {
    pub s: i64,
    pub tau: f64,
    pub z: f64,
    pub is_significant: bool,
    pub trend: TrendDirection,
}

/// Mann-Kendall test at 95% (two-sided normal approximation)
///
/// O(n²): callers should cap the series length.
pub fn mann_kendall(values: &[f64]) -> MannKendallResult {
    let n = values.len();
    if n < MIN_REGRESSION_POINTS {
        return MannKendallResult {
            s: 0,
            tau: 0.0,
            z: 0.0,
            is_significant: false,
            trend: TrendDirection::Stable,
        };
    }

    let mut s: i64 = 0;
    for i in 0..n - 1 {
        for j in (i + 1)..n {
            if values[j] > values[i] {
                s += 1;
            } else if values[j] < values[i] {
                s -= 1;
            }
        }
    }

    let n_f = n as f64;
    let pairs = n_f * (n_f - 1.0) / 2.0;
    let var_s = n_f * (n_f - 1.0) * (2.0 * n_f + 5.0) / 18.0;
    let z = match s {
        s if s > 0 => (s as f64 - 1.0) / var_s.sqrt(),
        s if s < 0 => (s as f64 + 1.0) / var_s.sqrt(),
        _ => 0.0,
    };

    let is_significant = z.abs() > 1.96;
    let trend = match (is_significant, s.signum()) {
        (true, 1) => TrendDirection::Up,
        (true, -1) => TrendDirection::Down,
        _ => TrendDirection::Stable,
    };

    MannKendallResult {
        s,
        tau: s as f64 / pairs,
        z,
        is_significant,
        trend,
    }
}

// ============================================================================
// Basic seasonality scan
// ============================================================================

/// Per-bucket (mean, count) of `metric` at one grain; `None` for empty buckets
pub fn bucket_means(
    samples: &[Sample],
    metric: MetricType,
    pattern_type: PatternType,
) -> Vec<Option<(f64, usize)>> {
    let mut sums = vec![(0.0, 0usize); pattern_type.bucket_count()];
    for sample in samples {
        if let Some(value) = sample.value(metric) {
            let slot = &mut sums[pattern_type.bucket_of(&sample.timestamp)];
            slot.0 += value;
            slot.1 += 1;
        }
    }

    sums.into_iter()
        .map(|(sum, count)| (count > 0).then(|| (sum / count as f64, count)))
        .collect()
}

/// Quick hour-of-day / day-of-week scan: one peak and one low bucket each
///
/// Cheaper than [`crate::time_series::detect_seasonal_patterns`]; does not
/// predict the next occurrence.
pub fn scan_seasonality(samples: &[Sample], metric: MetricType) -> Vec<SeasonalPattern> {
    let total = metric_values(samples, metric).len();
    if total < MIN_SEASONAL_SAMPLES {
        return Vec::new();
    }

    let mut patterns = Vec::new();
    for pattern_type in [PatternType::Hourly, PatternType::Daily] {
        let buckets = bucket_means(samples, metric, pattern_type);
        let filled: Vec<(usize, f64, usize)> = buckets
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.map(|(m, c)| (i, m, c)))
            .collect();
        if filled.len() < 2 {
            continue;
        }

        let means: Vec<f64> = filled.iter().map(|(_, m, _)| *m).collect();
        let overall = mean(&means);
        let (Some(peak), Some(low)) = (
            filled.iter().max_by(|a, b| a.1.total_cmp(&b.1)),
            filled.iter().min_by(|a, b| a.1.total_cmp(&b.1)),
        ) else {
            continue;
        };

        let amplitude = peak.1 - low.1;
        if overall <= 0.0 || amplitude / overall < 0.1 {
            continue;
        }

        let stat = |(bucket, avg, count): &(usize, f64, usize)| PeriodStat {
            bucket: *bucket,
            label: pattern_type.label(*bucket),
            average_value: *avg,
            frequency: *count as f64 / total as f64,
        };

        patterns.push(SeasonalPattern {
            pattern_type,
            metric,
            peak_periods: vec![stat(peak)],
            low_periods: vec![stat(low)],
            amplitude,
            confidence: (total as f64 / (pattern_type.bucket_count() * 3) as f64).min(1.0),
            seasonal_strength: (amplitude / overall).min(1.0),
            next_peak: None,
            next_low: None,
        });
    }

    patterns
}
