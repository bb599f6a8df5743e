//! Tests for the statistics core.

use chrono::{Duration, TimeZone, Utc};
use framewatch_engine::error::EngineError;
use framewatch_engine::statistics::{
    analyze_trend, analyze_value_trend, calculate_statistics, correlation, detect_anomalies,
    linear_regression, linear_regression_xy, mann_kendall, scan_seasonality, AnomalySeverity,
    CorrelationDirection, CorrelationSignificance, CorrelationStrength, Significance,
    TrendDirection,
};
use framewatch_engine::types::{MetricType, PatternType, Sample};

fn fps_samples(values: &[f64]) -> Vec<Sample> {
    let start = Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, v)| Sample::new(start + Duration::minutes(i as i64), "home").with_fps(*v))
        .collect()
}

#[test]
fn test_trend_needs_five_points() {
    let trend = analyze_trend(&fps_samples(&[30.0, 40.0, 50.0, 60.0]), MetricType::Fps, "last hour");

    assert_eq!(trend.direction, TrendDirection::Stable);
    assert_eq!(trend.significance, Significance::Low);
    assert_eq!(trend.confidence, 0.0);
    assert_eq!(trend.slope, 0.0);
    assert!(trend.forecast.is_none());
    assert_eq!(trend.sample_count, 4);
    assert_eq!(trend.time_period, "last hour");
}

#[test]
fn test_trend_rising_frame_rate() {
    let values: Vec<f64> = (0..10).map(|i| 30.0 + 3.0 * i as f64).collect();
    let trend = analyze_trend(&fps_samples(&values), MetricType::Fps, "session");

    assert_eq!(trend.direction, TrendDirection::Up);
    assert_eq!(trend.significance, Significance::High);
    assert!((trend.slope - 3.0).abs() < 1e-9);
    assert!((trend.forecast.unwrap() - 60.0).abs() < 1e-9);
}

#[test]
fn test_trend_small_drift_is_stable() {
    // 0.1% drift per point on a level of 1000
    let values: Vec<f64> = (0..10).map(|i| 1000.0 + i as f64).collect();
    let trend = analyze_value_trend(&values, MetricType::MemoryUsage, "day");
    assert_eq!(trend.direction, TrendDirection::Stable);
}

#[test]
fn test_trend_orders_by_timestamp() {
    let mut samples = fps_samples(&[60.0, 55.0, 50.0, 45.0, 40.0]);
    samples.reverse();
    let trend = analyze_trend(&samples, MetricType::Fps, "session");
    assert_eq!(trend.direction, TrendDirection::Down);
}

#[test]
fn test_constant_statistics() {
    let stats = calculate_statistics(&[10.0; 8]);

    assert_eq!(stats.count, 8);
    assert_eq!(stats.mean, 10.0);
    assert_eq!(stats.median, 10.0);
    assert_eq!(stats.std_dev, 0.0);
    assert_eq!(stats.min, 10.0);
    assert_eq!(stats.max, 10.0);
    assert!(stats.outliers.is_empty());
}

#[test]
fn test_statistics_outliers_and_percentiles() {
    let stats = calculate_statistics(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 100.0]);

    assert_eq!(stats.count, 9);
    assert_eq!(stats.median, 5.0);
    assert_eq!(stats.p25, 3.0);
    assert_eq!(stats.p75, 7.0);
    assert_eq!(stats.outliers, vec![100.0]);
    assert!(stats.p25 <= stats.median && stats.median <= stats.p75);
    assert!(stats.p90 <= stats.p95 && stats.p95 <= stats.max);
}

#[test]
fn test_statistics_empty_and_non_finite() {
    let empty = calculate_statistics(&[]);
    assert_eq!(empty.count, 0);
    assert_eq!(empty.mean, 0.0);

    let stats = calculate_statistics(&[f64::NAN, 4.0, f64::INFINITY, 6.0]);
    assert_eq!(stats.count, 2);
    assert_eq!(stats.mean, 5.0);
}

#[test]
fn test_single_spike_is_anomalous() {
    let samples = fps_samples(&[10.0, 10.0, 10.0, 10.0, 100.0]);
    let anomalies = detect_anomalies(&samples, MetricType::Fps, 2.5);

    assert_eq!(anomalies.len(), 1);
    let spike = &anomalies[0];
    assert_eq!(spike.value, 100.0);
    assert!((spike.expected_value - 10.0).abs() < 1e-9);
    assert!((spike.deviation - 90.0).abs() < 1e-9);
    assert!(spike.severity >= AnomalySeverity::High);
    assert_eq!(spike.timestamp, samples[4].timestamp);
    assert_eq!(spike.percentile, 100.0);
}

#[test]
fn test_anomaly_z_score_is_not_capped() {
    let samples = fps_samples(&[10.0, 11.0, 10.0, 11.0, 10.0, 11.0, 1000.0]);

    let default_threshold = detect_anomalies(&samples, MetricType::Fps, 2.5);
    assert_eq!(default_threshold.len(), 1);
    // Others average 10.5 with spread 0.5
    assert!((default_threshold[0].z_score - 1979.0).abs() < 1.0);

    let strict = detect_anomalies(&samples, MetricType::Fps, 12.0);
    assert_eq!(strict.len(), 1);
    assert_eq!(strict[0].value, 1000.0);
    assert_eq!(strict[0].severity, AnomalySeverity::Critical);
}

#[test]
fn test_anomalies_need_five_values() {
    let samples = fps_samples(&[10.0, 10.0, 10.0, 100.0]);
    assert!(detect_anomalies(&samples, MetricType::Fps, 2.5).is_empty());
}

#[test]
fn test_constant_series_has_no_anomalies() {
    let samples = fps_samples(&[42.0; 12]);
    assert!(detect_anomalies(&samples, MetricType::Fps, 2.5).is_empty());
}

#[test]
fn test_anomalies_skip_missing_metric() {
    let samples = fps_samples(&[10.0, 10.0, 10.0, 10.0, 100.0]);
    assert!(detect_anomalies(&samples, MetricType::CpuUsage, 2.5).is_empty());
}

#[test]
fn test_regression_recovers_line() {
    let values: Vec<f64> = (0..10).map(|x| 3.0 * x as f64 + 2.0).collect();
    let result = linear_regression(&values);

    assert!((result.slope - 3.0).abs() < 1e-9);
    assert!((result.intercept - 2.0).abs() < 1e-9);
    assert!((result.r_squared - 1.0).abs() < 1e-9);
    assert!(result.is_significant);
    assert!(result.p_value <= 0.01);
}

#[test]
fn test_regression_skips_non_finite_values() {
    let result = linear_regression(&[1.0, f64::NAN, 3.0, 4.0, 5.0]);

    // Remaining points keep their index and lie on y = x + 1
    assert!((result.slope - 1.0).abs() < 1e-9);
    assert!((result.intercept - 1.0).abs() < 1e-9);
    assert!(result.r_squared.is_finite());

    let xy = linear_regression_xy(&[0.0, f64::INFINITY, 2.0, 3.0], &[5.0, 6.0, 9.0, 11.0]).unwrap();
    assert!((xy.slope - 2.0).abs() < 1e-9);
    assert!((xy.intercept - 5.0).abs() < 1e-9);

    let empty = linear_regression(&[f64::NAN, f64::NAN, f64::NAN]);
    assert_eq!(empty.slope, 0.0);
    assert_eq!(empty.intercept, 0.0);
}

#[test]
fn test_regression_xy_uneven_spacing() {
    let xs = [0.0, 0.5, 2.0, 7.0];
    let ys: Vec<f64> = xs.iter().map(|x| -2.0 * x + 10.0).collect();
    let result = linear_regression_xy(&xs, &ys).unwrap();

    assert!((result.slope + 2.0).abs() < 1e-9);
    assert!((result.predict(10.0) + 10.0).abs() < 1e-9);
}

#[test]
fn test_regression_length_mismatch() {
    let err = linear_regression_xy(&[1.0, 2.0, 3.0], &[1.0, 2.0]).unwrap_err();
    assert!(matches!(err, EngineError::LengthMismatch { left: 3, right: 2 }));
}

#[test]
fn test_correlation_perfect_positive() {
    let a: Vec<f64> = (0..10).map(|i| i as f64).collect();
    let b: Vec<f64> = a.iter().map(|v| 2.0 * v + 1.0).collect();
    let result = correlation(&a, &b).unwrap();

    assert!((result.coefficient - 1.0).abs() < 1e-9);
    assert_eq!(result.strength, CorrelationStrength::Strong);
    assert_eq!(result.direction, CorrelationDirection::Positive);
    assert_eq!(result.significance, CorrelationSignificance::Significant);
    assert_eq!(result.sample_count, 10);
}

#[test]
fn test_correlation_degenerate_inputs() {
    let flat = correlation(&[5.0; 6], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    assert_eq!(flat.coefficient, 0.0);
    assert_eq!(flat.direction, CorrelationDirection::None);

    assert!(matches!(
        correlation(&[1.0, 2.0], &[1.0]),
        Err(EngineError::LengthMismatch { .. })
    ));
}

#[test]
fn test_mann_kendall_decreasing() {
    let values: Vec<f64> = (0..15).map(|i| 100.0 - 2.0 * i as f64).collect();
    let result = mann_kendall(&values);

    assert_eq!(result.s, -105);
    assert_eq!(result.tau, -1.0);
    assert!(result.is_significant);
    assert_eq!(result.trend, TrendDirection::Down);
}

#[test]
fn test_scan_seasonality_finds_hourly_cycle() {
    // Two days, hourly: fast mornings, slow afternoons
    let start = Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap();
    let samples: Vec<Sample> = (0..48)
        .map(|h| {
            let fps = if h % 24 < 12 { 60.0 } else { 30.0 };
            Sample::new(start + Duration::hours(h), "feed").with_fps(fps)
        })
        .collect();

    let patterns = scan_seasonality(&samples, MetricType::Fps);

    // Both weekdays average the same, so only the hourly grain is reported
    assert_eq!(patterns.len(), 1);
    let hourly = &patterns[0];
    assert_eq!(hourly.pattern_type, PatternType::Hourly);
    assert_eq!(hourly.peak_periods[0].average_value, 60.0);
    assert_eq!(hourly.low_periods[0].average_value, 30.0);
    assert_eq!(hourly.amplitude, 30.0);
    assert!(hourly.next_peak.is_none());
}

#[test]
fn test_scan_seasonality_needs_a_day() {
    let samples = fps_samples(&[30.0; 23]);
    assert!(scan_seasonality(&samples, MetricType::Fps).is_empty());
}

#[test]
fn test_statistics_are_idempotent() {
    let values = [12.0, 15.5, 9.0, 30.0, 14.0, 13.5];
    assert_eq!(calculate_statistics(&values), calculate_statistics(&values));

    let samples = fps_samples(&[10.0, 10.0, 10.0, 10.0, 100.0]);
    assert_eq!(
        detect_anomalies(&samples, MetricType::Fps, 2.5),
        detect_anomalies(&samples, MetricType::Fps, 2.5)
    );
}
