//! Route Insights - one report per screen/route
//!
//! Fans a route's samples out to statistics, trends, anomalies, calendar
//! seasonality, scoring and prediction, and collects the results.

use crate::config::EngineConfig;
use crate::prediction::{ForecastModel, PerformancePrediction, PredictionEngine};
use crate::scoring::{PerformanceScore, PerformanceTierResult, ScoringEngine};
use crate::statistics::{
    analyze_trend, calculate_statistics, detect_anomalies, AnomalyDetection, StatisticalResult,
    TrendAnalysis,
};
use crate::time_series::detect_seasonal_patterns;
use crate::types::{
    metric_values, MetricType, PatternType, PerformanceSummary, Sample, SeasonalPattern,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Descriptive statistics for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStatistics {
    pub metric: MetricType,
    pub statistics: StatisticalResult,
}

/// Everything the engine can say about one route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInsights {
    pub route: String,
    pub sample_count: usize,
    pub summary: PerformanceSummary,
    /// Only metrics with at least one valid value
    pub statistics: Vec<MetricStatistics>,
    pub trends: Vec<TrendAnalysis>,
    /// Most severe first
    pub anomalies: Vec<AnomalyDetection>,
    pub seasonal_patterns: Vec<SeasonalPattern>,
    pub score: PerformanceScore,
    pub tier: PerformanceTierResult,
    pub prediction: PerformancePrediction,
}

#[derive(Debug, Clone)]
pub struct InsightsEngine {
    scoring: ScoringEngine,
    prediction: PredictionEngine,
}

impl Default for InsightsEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl InsightsEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            scoring: ScoringEngine::new(config.clone()),
            prediction: PredictionEngine::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.scoring.config()
    }

    /// Analyze the samples whose `screen_name` is `route`
    ///
    /// Without a baseline, the route's own averages stand in for it.
    pub fn analyze_route(
        &self,
        route: &str,
        samples: &[Sample],
        baseline: Option<&PerformanceSummary>,
    ) -> RouteInsights {
        let config = self.config();
        let route_samples: Vec<Sample> = samples
            .iter()
            .filter(|s| s.screen_name == route)
            .cloned()
            .collect();
        let summary = PerformanceSummary::from_samples(&route_samples);
        let period = format!("{} samples", route_samples.len());

        let statistics = MetricType::ALL
            .iter()
            .filter_map(|&metric| {
                let values = metric_values(&route_samples, metric);
                (!values.is_empty()).then(|| MetricStatistics {
                    metric,
                    statistics: calculate_statistics(&values),
                })
            })
            .collect();

        let trends = MetricType::ALL
            .iter()
            .map(|&metric| analyze_trend(&route_samples, metric, &period))
            .collect();

        let mut anomalies: Vec<AnomalyDetection> = MetricType::ALL
            .iter()
            .flat_map(|&metric| detect_anomalies(&route_samples, metric, config.anomaly_threshold))
            .collect();
        anomalies.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.z_score.total_cmp(&a.z_score))
        });

        let seasonal_patterns: Vec<SeasonalPattern> = MetricType::ALL
            .iter()
            .flat_map(|&metric| detect_seasonal_patterns(&route_samples, &PatternType::ALL, metric))
            .collect();

        let score = self.scoring.calculate_performance_score(
            &summary,
            Some(route_samples.as_slice()),
            baseline,
        );
        let tier = self.scoring.calculate_performance_tier(&summary);

        let prediction = self.prediction.predict_with_ensemble(
            route,
            baseline.unwrap_or(&summary),
            Some(route_samples.as_slice()),
            &ForecastModel::ALL,
            config.prediction.default_horizon_days,
        );

        debug!(
            "Insights for {}: {} samples, score {}, {} anomalies, {} patterns",
            route,
            route_samples.len(),
            score.overall,
            anomalies.len(),
            seasonal_patterns.len()
        );

        RouteInsights {
            route: route.to_string(),
            sample_count: route_samples.len(),
            summary,
            statistics,
            trends,
            anomalies,
            seasonal_patterns,
            score,
            tier,
            prediction,
        }
    }

    /// One report per distinct route, sorted by route name
    pub fn analyze_all(
        &self,
        samples: &[Sample],
        baseline: Option<&PerformanceSummary>,
    ) -> Vec<RouteInsights> {
        let routes: BTreeSet<&str> = samples.iter().map(|s| s.screen_name.as_str()).collect();
        routes
            .into_iter()
            .map(|route| self.analyze_route(route, samples, baseline))
            .collect()
    }

    /// Route name to sample count
    pub fn route_counts(samples: &[Sample]) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for sample in samples {
            *counts.entry(sample.screen_name.clone()).or_insert(0) += 1;
        }
        counts
    }
}
