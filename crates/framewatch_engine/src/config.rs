//! Engine configuration
//!
//! Passed at construction; the engine never reads the environment.
//! Every section has `#[serde(default)]`, so a TOML file only needs the
//! keys it overrides.

use crate::error::{EngineError, Result};
use crate::statistics::DEFAULT_ANOMALY_THRESHOLD;
use crate::types::MetricType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Trend adjustment can never move the score more than this
pub const MAX_TREND_ADJUSTMENT: f64 = 10.0;

/// Composite score weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub fps: f64,
    pub memory: f64,
    pub cpu: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            fps: 0.4,
            memory: 0.3,
            cpu: 0.3,
        }
    }
}

impl ScoringWeights {
    /// Weight for a scored metric; load time is not part of the composite
    pub fn weight(&self, metric: MetricType) -> f64 {
        match metric {
            MetricType::Fps => self.fps,
            MetricType::MemoryUsage => self.memory,
            MetricType::CpuUsage => self.cpu,
            MetricType::LoadTime => 0.0,
        }
    }

    pub fn total(&self) -> f64 {
        self.fps + self.memory + self.cpu
    }
}

/// Band edges for one metric, in the metric's own unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkThresholds {
    pub excellent: f64,
    pub good: f64,
    pub average: f64,
    pub poor: f64,
}

impl BenchmarkThresholds {
    pub const fn new(excellent: f64, good: f64, average: f64, poor: f64) -> Self {
        Self {
            excellent,
            good,
            average,
            poor,
        }
    }

    fn as_array(&self) -> [f64; 4] {
        [self.excellent, self.good, self.average, self.poor]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Benchmarks {
    pub fps: BenchmarkThresholds,
    pub memory: BenchmarkThresholds,
    pub cpu: BenchmarkThresholds,
    pub load_time: BenchmarkThresholds,
}

impl Default for Benchmarks {
    fn default() -> Self {
        Self {
            fps: BenchmarkThresholds::new(55.0, 45.0, 30.0, 20.0),
            memory: BenchmarkThresholds::new(100.0, 200.0, 300.0, 500.0),
            cpu: BenchmarkThresholds::new(20.0, 40.0, 60.0, 80.0),
            load_time: BenchmarkThresholds::new(1000.0, 2000.0, 3000.0, 5000.0),
        }
    }
}

impl Benchmarks {
    pub fn for_metric(&self, metric: MetricType) -> &BenchmarkThresholds {
        match metric {
            MetricType::Fps => &self.fps,
            MetricType::MemoryUsage => &self.memory,
            MetricType::CpuUsage => &self.cpu,
            MetricType::LoadTime => &self.load_time,
        }
    }
}

/// When predictions turn into factors and actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationThresholds {
    /// Predicted scores below this count as an issue
    pub issue_score_threshold: f64,
    /// Metrics scoring below this become contributing factors
    pub factor_score_threshold: f64,
    /// Confidence intervals wider than this flag high variability
    pub high_variability_width: f64,
    /// Regression slope (points/day) below which the trend counts as declining
    pub declining_slope: f64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            issue_score_threshold: 60.0,
            factor_score_threshold: 80.0,
            high_variability_width: 40.0,
            declining_slope: -0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleWeights {
    pub linear_regression: f64,
    pub exponential_smoothing: f64,
    pub seasonal_decomposition: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            linear_regression: 0.4,
            exponential_smoothing: 0.4,
            seasonal_decomposition: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub seasonal_period: usize,
    pub default_horizon_days: u32,
    /// Below this many sessions a prediction is labelled insufficient_data
    pub min_sessions: usize,
    pub ensemble_weights: EnsembleWeights,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            seasonal_period: 7,
            default_horizon_days: 7,
            min_sessions: 3,
            ensemble_weights: EnsembleWeights::default(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Z-score above which a sample is anomalous
    pub anomaly_threshold: f64,
    /// Maximum points the trend adjustment may add or remove
    pub trend_adjustment_weight: f64,
    pub weights: ScoringWeights,
    pub benchmarks: Benchmarks,
    pub recommendations: RecommendationThresholds,
    pub prediction: PredictionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            trend_adjustment_weight: MAX_TREND_ADJUSTMENT,
            weights: ScoringWeights::default(),
            benchmarks: Benchmarks::default(),
            recommendations: RecommendationThresholds::default(),
            prediction: PredictionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values that would make scoring meaningless
    pub fn validate(&self) -> Result<()> {
        if !self.anomaly_threshold.is_finite() || self.anomaly_threshold <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "anomaly_threshold must be positive, got {}",
                self.anomaly_threshold
            )));
        }

        if !self.trend_adjustment_weight.is_finite()
            || !(0.0..=MAX_TREND_ADJUSTMENT).contains(&self.trend_adjustment_weight)
        {
            return Err(EngineError::InvalidConfig(format!(
                "trend_adjustment_weight must be within 0..={}, got {}",
                MAX_TREND_ADJUSTMENT, self.trend_adjustment_weight
            )));
        }

        check_weights(
            "weights",
            &[self.weights.fps, self.weights.memory, self.weights.cpu],
        )?;

        let ensemble = &self.prediction.ensemble_weights;
        check_weights(
            "prediction.ensemble_weights",
            &[
                ensemble.linear_regression,
                ensemble.exponential_smoothing,
                ensemble.seasonal_decomposition,
            ],
        )?;

        for metric in MetricType::ALL {
            let edges = self.benchmarks.for_metric(metric).as_array();
            let ordered = edges.windows(2).all(|pair| {
                if metric.higher_is_better() {
                    pair[0] > pair[1]
                } else {
                    pair[0] < pair[1]
                }
            });
            if edges.iter().any(|e| !e.is_finite() || *e <= 0.0) || !ordered {
                return Err(EngineError::InvalidConfig(format!(
                    "benchmarks.{} must be positive and strictly ordered from excellent to poor",
                    metric
                )));
            }
        }

        if self.prediction.seasonal_period < 2 {
            return Err(EngineError::InvalidConfig(
                "prediction.seasonal_period must be at least 2".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_weights(section: &str, weights: &[f64]) -> Result<()> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(EngineError::InvalidConfig(format!(
            "{} must be finite and non-negative",
            section
        )));
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err(EngineError::InvalidConfig(format!(
            "{} must not all be zero",
            section
        )));
    }
    Ok(())
}
