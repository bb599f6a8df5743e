//! Tests for per-route insights.

use chrono::{Duration, TimeZone, Utc};
use framewatch_engine::insights::InsightsEngine;
use framewatch_engine::prediction::PredictionStage;
use framewatch_engine::scoring::Grade;
use framewatch_engine::statistics::AnomalySeverity;
use framewatch_engine::types::{MetricType, PerformanceSummary, Sample};

fn samples() -> Vec<Sample> {
    let start = Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0).unwrap();
    let mut all = Vec::new();
    for i in 0..12 {
        let ts = start + Duration::hours(i);
        all.push(
            Sample::new(ts, "home")
                .with_fps(58.0)
                .with_memory(120.0)
                .with_cpu(if i == 6 { 95.0 } else { 20.0 }),
        );
        all.push(
            Sample::new(ts + Duration::minutes(30), "checkout")
                .with_fps(30.0)
                .with_memory(400.0)
                .with_cpu(70.0)
                .with_load_time(2500.0),
        );
    }
    all
}

#[test]
fn test_analyze_all_sorted_by_route() {
    let engine = InsightsEngine::default();
    let reports = engine.analyze_all(&samples(), None);

    let routes: Vec<&str> = reports.iter().map(|r| r.route.as_str()).collect();
    assert_eq!(routes, vec!["checkout", "home"]);
    assert!(reports.iter().all(|r| r.sample_count == 12));
}

#[test]
fn test_route_statistics_only_cover_reported_metrics() {
    let engine = InsightsEngine::default();
    let home = engine.analyze_route("home", &samples(), None);

    let metrics: Vec<MetricType> = home.statistics.iter().map(|s| s.metric).collect();
    assert_eq!(
        metrics,
        vec![MetricType::Fps, MetricType::MemoryUsage, MetricType::CpuUsage]
    );
    assert_eq!(home.trends.len(), 4);
    assert_eq!(home.summary.avg_load_time, None);

    let checkout = engine.analyze_route("checkout", &samples(), None);
    assert_eq!(checkout.statistics.len(), 4);
}

#[test]
fn test_route_anomalies_sorted_by_severity() {
    let engine = InsightsEngine::default();
    let home = engine.analyze_route("home", &samples(), None);

    assert_eq!(home.anomalies.len(), 1);
    let spike = &home.anomalies[0];
    assert_eq!(spike.metric, MetricType::CpuUsage);
    assert_eq!(spike.value, 95.0);
    assert_eq!(spike.severity, AnomalySeverity::Critical);
    assert!(home
        .anomalies
        .windows(2)
        .all(|pair| pair[0].severity >= pair[1].severity));
}

#[test]
fn test_route_scores_and_tiers() {
    let engine = InsightsEngine::default();
    let reports = engine.analyze_all(&samples(), None);
    let (checkout, home) = (&reports[0], &reports[1]);

    assert!(home.score.overall > checkout.score.overall);
    assert_eq!(checkout.score.grade, Grade::F);
    assert!(home.tier.points > checkout.tier.points);
    assert_eq!(home.prediction.route, "home");
}

#[test]
fn test_route_baseline_comparison() {
    let engine = InsightsEngine::default();
    let baseline = PerformanceSummary::new(29.0, 120.0, 20.0);
    let home = engine.analyze_route("home", &samples(), Some(&baseline));

    let comparison = home.score.baseline_comparison.unwrap();
    assert!((comparison.fps_change_pct - 100.0).abs() < 1e-9);
    assert_eq!(comparison.memory_change_pct, 0.0);
}

#[test]
fn test_unknown_route_is_neutral() {
    let engine = InsightsEngine::default();
    let report = engine.analyze_route("profile", &samples(), None);

    assert_eq!(report.sample_count, 0);
    assert!(report.statistics.is_empty());
    assert!(report.anomalies.is_empty());
    assert_eq!(report.score.overall, 0);
    assert_eq!(report.prediction.stage, PredictionStage::InsufficientData);
    assert!(!report.prediction.predicted_value.is_nan());
}

#[test]
fn test_insights_serialize() {
    let engine = InsightsEngine::default();
    let report = engine.analyze_route("checkout", &samples(), None);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["route"], "checkout");
    assert_eq!(json["tier"]["tier"], "low_end");
    assert!(json["prediction"]["model_used"].is_array());
}

#[test]
fn test_route_counts() {
    let counts = InsightsEngine::route_counts(&samples());
    assert_eq!(counts.get("home"), Some(&12));
    assert_eq!(counts.get("checkout"), Some(&12));
}
