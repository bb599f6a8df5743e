//! Command handlers for framewatchctl.

use anyhow::{anyhow, bail, Context, Result};
use framewatch_engine::insights::InsightsEngine;
use framewatch_engine::prediction::{ForecastModel, PredictionEngine};
use framewatch_engine::scoring::ScoringEngine;
use framewatch_engine::statistics::{
    analyze_trend, calculate_statistics, detect_anomalies, mann_kendall, MannKendallResult,
    StatisticalResult, TrendAnalysis,
};
use framewatch_engine::time_series::{detect_seasonal_patterns, seasonal_decomposition};
use framewatch_engine::types::{metric_values, sorted_by_time, MetricType, PatternType};
use framewatch_engine::{EngineConfig, PerformanceSummary, Sample};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, info};

use crate::InputArgs;

#[derive(Serialize)]
struct StatsOutput {
    route: Option<String>,
    metric: MetricType,
    statistics: StatisticalResult,
}

#[derive(Serialize)]
struct TrendOutput {
    route: Option<String>,
    trend: TrendAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    mann_kendall: Option<MannKendallResult>,
}

pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Read samples and keep only the requested route
fn load_samples(input: &InputArgs) -> Result<Vec<Sample>> {
    let raw = if input.input.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read samples from stdin")?;
        buf
    } else {
        fs::read_to_string(&input.input)
            .with_context(|| format!("Failed to read {}", input.input.display()))?
    };

    let samples: Vec<Sample> =
        serde_json::from_str(&raw).context("Samples must be a JSON array of sample objects")?;
    let total = samples.len();

    let samples: Vec<Sample> = match &input.route {
        Some(route) => samples.into_iter().filter(|s| &s.screen_name == route).collect(),
        None => samples,
    };
    debug!("Loaded {} samples ({} after route filter)", total, samples.len());
    Ok(samples)
}

fn load_baseline(path: Option<&Path>) -> Result<Option<PerformanceSummary>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read baseline {}", path.display()))?;
    let baseline = serde_json::from_str(&raw).context("Baseline must be a PerformanceSummary object")?;
    Ok(Some(baseline))
}

fn parse_metric(name: &str) -> Result<MetricType> {
    MetricType::parse(name).ok_or_else(|| anyhow!("Unknown metric '{}'", name))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Handle stats command
pub fn stats(input: &InputArgs, metric: &str) -> Result<()> {
    let metric = parse_metric(metric)?;
    let samples = load_samples(input)?;
    print_json(&StatsOutput {
        route: input.route.clone(),
        metric,
        statistics: calculate_statistics(&metric_values(&samples, metric)),
    })
}

/// Handle trend command
pub fn trend(input: &InputArgs, metric: &str, period: &str, with_mann_kendall: bool) -> Result<()> {
    let metric = parse_metric(metric)?;
    let samples = load_samples(input)?;
    let rank_test = with_mann_kendall
        .then(|| mann_kendall(&metric_values(&sorted_by_time(&samples), metric)));

    print_json(&TrendOutput {
        route: input.route.clone(),
        trend: analyze_trend(&samples, metric, period),
        mann_kendall: rank_test,
    })
}

/// Handle anomalies command
pub fn anomalies(
    config: &EngineConfig,
    input: &InputArgs,
    metric: Option<&str>,
    threshold: Option<f64>,
) -> Result<()> {
    let metrics = match metric {
        Some(name) => vec![parse_metric(name)?],
        None => MetricType::ALL.to_vec(),
    };
    let threshold = threshold.unwrap_or(config.anomaly_threshold);
    let samples = load_samples(input)?;

    let found: Vec<_> = metrics
        .into_iter()
        .flat_map(|metric| detect_anomalies(&samples, metric, threshold))
        .collect();
    info!("{} anomalies above z={}", found.len(), threshold);
    print_json(&found)
}

/// Handle seasonal command
pub fn seasonal(input: &InputArgs, metric: &str, patterns: &str, period: Option<usize>) -> Result<()> {
    let metric = parse_metric(metric)?;
    let samples = load_samples(input)?;

    if let Some(period) = period {
        return print_json(&seasonal_decomposition(&samples, period, metric));
    }

    let pattern_types = patterns
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| PatternType::parse(p).ok_or_else(|| anyhow!("Unknown pattern type '{}'", p)))
        .collect::<Result<Vec<_>>>()?;

    print_json(&detect_seasonal_patterns(&samples, &pattern_types, metric))
}

/// Handle score command
pub fn score(config: EngineConfig, input: &InputArgs, baseline: Option<&Path>) -> Result<()> {
    let samples = load_samples(input)?;
    let baseline = load_baseline(baseline)?;
    let summary = PerformanceSummary::from_samples(&samples);

    let engine = ScoringEngine::new(config);
    print_json(&engine.calculate_performance_score(&summary, Some(samples.as_slice()), baseline.as_ref()))
}

/// Handle tier command
pub fn tier(config: EngineConfig, input: &InputArgs) -> Result<()> {
    let samples = load_samples(input)?;
    let engine = ScoringEngine::new(config);
    print_json(&engine.calculate_performance_tier(&PerformanceSummary::from_samples(&samples)))
}

/// Handle predict command
pub fn predict(
    config: EngineConfig,
    input: &InputArgs,
    baseline: Option<&Path>,
    horizon: Option<u32>,
    models: Option<&str>,
) -> Result<()> {
    let samples = load_samples(input)?;
    let route = match &input.route {
        Some(route) => route.clone(),
        None => single_route(&samples)?,
    };

    let models = match models {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(|m| ForecastModel::parse(m).ok_or_else(|| anyhow!("Unknown model '{}'", m)))
            .collect::<Result<Vec<_>>>()?,
        None => ForecastModel::ALL.to_vec(),
    };

    let horizon = horizon.unwrap_or(config.prediction.default_horizon_days);
    let baseline = load_baseline(baseline)?.unwrap_or_else(|| PerformanceSummary::from_samples(&samples));
    let history = (!samples.is_empty()).then_some(samples.as_slice());

    let engine = PredictionEngine::new(config);
    print_json(&engine.predict_with_ensemble(&route, &baseline, history, &models, horizon))
}

/// Handle report command
pub fn report(config: EngineConfig, input: &InputArgs, baseline: Option<&Path>) -> Result<()> {
    let samples = load_samples(input)?;
    let baseline = load_baseline(baseline)?;
    info!("Routes: {:?}", InsightsEngine::route_counts(&samples));

    let engine = InsightsEngine::new(config);
    match &input.route {
        Some(route) => print_json(&engine.analyze_route(route, &samples, baseline.as_ref())),
        None => print_json(&engine.analyze_all(&samples, baseline.as_ref())),
    }
}

/// Handle config command
pub fn print_config(config: &EngineConfig) -> Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn single_route(samples: &[Sample]) -> Result<String> {
    let mut routes = samples.iter().map(|s| s.screen_name.as_str());
    let Some(first) = routes.next() else {
        bail!("No samples to predict from; pass --route with a --baseline");
    };
    if routes.any(|r| r != first) {
        bail!("Samples cover several routes; choose one with --route");
    }
    Ok(first.to_string())
}
