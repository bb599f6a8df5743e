//! Prediction Engine
//!
//! Per-route score forecasts from three single models and a weighted
//! ensemble of whichever of them succeed.
//!
//! Lifecycle of a prediction (recomputed on every call):
//! `insufficient_data` -> `single_model` -> `ensemble`
//!
//! The engine treats the newest session as "now". It never reads the wall
//! clock, so identical input gives identical output.

use crate::config::EngineConfig;
use crate::error::ModelError;
use crate::scoring::ScoringEngine;
use crate::statistics::{linear_regression_xy, mean, std_dev, RegressionResult};
use crate::time_series::{exponential_smoothing, seasonal_decomposition};
use crate::types::{
    metric_values, sorted_by_time, MetricType, PerformanceSummary, Sample, SessionSummary,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

/// Score predicted when there is no history at all
const NEUTRAL_SCORE: f64 = 50.0;
const NEUTRAL_MARGIN: f64 = 20.0;

/// Standard errors used when residuals cannot be computed
const SINGLE_POINT_STANDARD_ERROR: f64 = 25.0;
const TWO_POINT_STANDARD_ERROR: f64 = 20.0;

const Z_95: f64 = 1.96;
const MAX_SMOOTHING_MARGIN: f64 = 30.0;
const SMOOTHING_WINDOW: usize = 10;
const MAX_SEASONAL_MARGIN: f64 = 30.0;

const MS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastModel {
    LinearRegression,
    ExponentialSmoothing,
    SeasonalDecomposition,
}

impl ForecastModel {
    pub const ALL: [ForecastModel; 3] = [
        ForecastModel::LinearRegression,
        ForecastModel::ExponentialSmoothing,
        ForecastModel::SeasonalDecomposition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastModel::LinearRegression => "linear_regression",
            ForecastModel::ExponentialSmoothing => "exponential_smoothing",
            ForecastModel::SeasonalDecomposition => "seasonal_decomposition",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear_regression" | "linear" => Some(ForecastModel::LinearRegression),
            "exponential_smoothing" | "smoothing" => Some(ForecastModel::ExponentialSmoothing),
            "seasonal_decomposition" | "seasonal" => Some(ForecastModel::SeasonalDecomposition),
            _ => None,
        }
    }
}

impl fmt::Display for ForecastModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStage {
    InsufficientData,
    SingleModel,
    Ensemble,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    /// `center ± margin`, clamped to the 0-100 score range
    pub fn around(center: f64, margin: f64) -> Self {
        Self {
            lower: (center - margin).clamp(0.0, 100.0),
            upper: (center + margin).clamp(0.0, 100.0),
        }
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Regression extrapolation of the composite score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonForecast {
    pub predicted_score: f64,
    pub confidence_interval: ConfidenceInterval,
    pub model: String,
    pub r_squared: f64,
    /// Score points per day
    pub slope: f64,
    pub sample_count: usize,
}

/// Output of one forecasting model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub route: String,
    pub model: ForecastModel,
    pub predicted_score: f64,
    pub confidence_interval: ConfidenceInterval,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub name: String,
    pub weight: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformancePrediction {
    pub route: String,
    pub metric: String,
    pub predicted_value: f64,
    pub confidence_interval: ConfidenceInterval,
    pub time_horizon: String,
    /// Chance the score lands below the issue threshold (0-1)
    pub probability_of_issue: f64,
    /// Heaviest first
    pub contributing_factors: Vec<ContributingFactor>,
    pub recommended_actions: Vec<String>,
    pub model_used: Vec<ForecastModel>,
    pub stage: PredictionStage,
}

/// Score forecasting over session history
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    scoring: ScoringEngine,
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl PredictionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            scoring: ScoringEngine::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.scoring.config()
    }

    /// Composite score per session, oldest first
    pub fn session_scores(&self, sessions: &[SessionSummary]) -> Vec<(DateTime<Utc>, f64)> {
        let mut scored: Vec<(DateTime<Utc>, f64)> = sessions
            .iter()
            .map(|s| (s.started_at, self.scoring.composite_score(&s.summary)))
            .collect();
        scored.sort_by_key(|(ts, _)| *ts);
        scored
    }

    /// Regress composite score on elapsed days and extrapolate
    ///
    /// The target is `horizon_days` after the newest session. One or two
    /// sessions get a fixed, wide standard error since residuals are
    /// undefined; a single session is a flat line with r² = 1, which is a
    /// perfect but meaningless fit.
    pub fn predict_for_horizon(&self, sessions: &[SessionSummary], horizon_days: u32) -> HorizonForecast {
        let scored = self.session_scores(sessions);

        let Some(&(first_ts, first_score)) = scored.first() else {
            return HorizonForecast {
                predicted_score: NEUTRAL_SCORE,
                confidence_interval: ConfidenceInterval::around(NEUTRAL_SCORE, NEUTRAL_MARGIN),
                model: "insufficient_data".to_string(),
                r_squared: 0.0,
                slope: 0.0,
                sample_count: 0,
            };
        };

        if scored.len() == 1 {
            let predicted = first_score.clamp(0.0, 100.0);
            return HorizonForecast {
                predicted_score: predicted,
                confidence_interval: ConfidenceInterval::around(
                    predicted,
                    Z_95 * SINGLE_POINT_STANDARD_ERROR,
                ),
                model: "linear_regression (insufficient_data)".to_string(),
                r_squared: 1.0,
                slope: 0.0,
                sample_count: 1,
            };
        }

        let xs: Vec<f64> = scored
            .iter()
            .map(|(ts, _)| (*ts - first_ts).num_milliseconds() as f64 / MS_PER_DAY)
            .collect();
        let ys: Vec<f64> = scored.iter().map(|(_, score)| *score).collect();
        let n = ys.len();

        let regression = if n == 2 {
            two_point_line(&xs, &ys)
        } else {
            linear_regression_xy(&xs, &ys).unwrap_or_else(|_| RegressionResult::neutral(mean(&ys)))
        };

        let standard_error = if n < 3 {
            TWO_POINT_STANDARD_ERROR
        } else {
            let ss_res: f64 = xs
                .iter()
                .zip(&ys)
                .map(|(x, y)| (y - regression.predict(*x)).powi(2))
                .sum();
            (ss_res / (n - 2) as f64).sqrt()
        };

        let target_x = xs[n - 1] + horizon_days as f64;
        let predicted = regression.predict(target_x).clamp(0.0, 100.0);
        trace!(
            "Horizon fit: n={} slope={:.3} r2={:.3} se={:.2}",
            n,
            regression.slope,
            regression.r_squared,
            standard_error
        );

        HorizonForecast {
            predicted_score: predicted,
            confidence_interval: ConfidenceInterval::around(predicted, Z_95 * standard_error),
            model: ForecastModel::LinearRegression.as_str().to_string(),
            r_squared: regression.r_squared,
            slope: regression.slope,
            sample_count: n,
        }
    }

    /// Horizon regression as an ensemble member; needs one session
    pub fn predict_with_linear_regression(
        &self,
        route: &str,
        sessions: &[SessionSummary],
        horizon_days: u32,
    ) -> Result<PredictionResult, ModelError> {
        if sessions.is_empty() {
            return Err(ModelError::InsufficientData {
                model: ForecastModel::LinearRegression.as_str(),
                required: 1,
                available: 0,
            });
        }
        let forecast = self.predict_for_horizon(sessions, horizon_days);
        Ok(PredictionResult {
            route: route.to_string(),
            model: ForecastModel::LinearRegression,
            predicted_score: forecast.predicted_score,
            confidence_interval: forecast.confidence_interval,
        })
    }

    /// Exponentially smoothed composite score
    ///
    /// Longer horizons smooth harder: alpha = max(0.1, 1 / horizon_days).
    pub fn predict_with_time_series(
        &self,
        route: &str,
        sessions: &[SessionSummary],
        horizon_days: u32,
    ) -> Result<PredictionResult, ModelError> {
        let scores: Vec<f64> = self
            .session_scores(sessions)
            .into_iter()
            .map(|(_, score)| score)
            .collect();
        if scores.is_empty() {
            return Err(ModelError::InsufficientData {
                model: ForecastModel::ExponentialSmoothing.as_str(),
                required: 1,
                available: 0,
            });
        }

        let alpha = if horizon_days == 0 {
            1.0
        } else {
            (1.0 / horizon_days as f64).max(0.1)
        };
        let smoothed = exponential_smoothing(&scores, alpha, 1);
        let predicted = smoothed
            .last()
            .copied()
            .unwrap_or(NEUTRAL_SCORE)
            .clamp(0.0, 100.0);

        let recent = &scores[scores.len().saturating_sub(SMOOTHING_WINDOW)..];
        let margin = (Z_95 * std_dev(recent)).min(MAX_SMOOTHING_MARGIN);

        Ok(PredictionResult {
            route: route.to_string(),
            model: ForecastModel::ExponentialSmoothing,
            predicted_score: predicted,
            confidence_interval: ConfidenceInterval::around(predicted, margin),
        })
    }

    /// First decomposition forecast of frame rate, mapped to score space
    ///
    /// The margin shrinks as trend and seasonal components explain more of
    /// the series.
    pub fn predict_with_seasonal_decomposition(
        &self,
        route: &str,
        samples: &[Sample],
        period: usize,
    ) -> Result<PredictionResult, ModelError> {
        let decomposition = seasonal_decomposition(samples, period, MetricType::Fps);
        let Some(&next_fps) = decomposition.forecast.first() else {
            return Err(ModelError::InsufficientData {
                model: ForecastModel::SeasonalDecomposition.as_str(),
                required: period.max(2).saturating_mul(2),
                available: metric_values(samples, MetricType::Fps).len(),
            });
        };

        let predicted = self.scoring.calculate_metric_score(next_fps, MetricType::Fps);
        let strength = (decomposition.seasonal_strength + decomposition.trend_strength) / 2.0;
        let margin = (10.0 / strength.max(0.1)).min(MAX_SEASONAL_MARGIN);

        Ok(PredictionResult {
            route: route.to_string(),
            model: ForecastModel::SeasonalDecomposition,
            predicted_score: predicted,
            confidence_interval: ConfidenceInterval::around(predicted, margin),
        })
    }

    /// Weighted ensemble of the requested models
    ///
    /// Models that fail or predict a non-positive score are dropped and the
    /// remaining weights renormalised. The interval is the union of member
    /// intervals. If nothing survives, a plain regression over whatever
    /// history exists (or the baseline alone) is returned.
    pub fn predict_with_ensemble(
        &self,
        route: &str,
        baseline: &PerformanceSummary,
        historical: Option<&[Sample]>,
        models: &[ForecastModel],
        horizon_days: u32,
    ) -> PerformancePrediction {
        let config = self.config();
        let history = historical.map(sorted_by_time).unwrap_or_default();
        let sessions: Vec<SessionSummary> = history
            .iter()
            .map(|s| fill_from_baseline(SessionSummary::from_sample(s), baseline))
            .collect();

        // Regression always has something to fit, even on a cold start
        let regression_sessions = if sessions.is_empty() {
            vec![SessionSummary::new(DateTime::<Utc>::default(), baseline.clone())]
        } else {
            sessions.clone()
        };
        let horizon = self.predict_for_horizon(&regression_sessions, horizon_days);

        let mut requested: Vec<ForecastModel> = Vec::new();
        for model in models {
            if !requested.contains(model) {
                requested.push(*model);
            }
        }

        let mut survivors: Vec<(PredictionResult, f64)> = Vec::new();
        for model in requested {
            let outcome = match model {
                ForecastModel::LinearRegression => {
                    self.predict_with_linear_regression(route, &regression_sessions, horizon_days)
                }
                ForecastModel::ExponentialSmoothing => {
                    self.predict_with_time_series(route, &sessions, horizon_days)
                }
                ForecastModel::SeasonalDecomposition => self.predict_with_seasonal_decomposition(
                    route,
                    &history,
                    config.prediction.seasonal_period,
                ),
            }
            .and_then(require_positive);

            match outcome {
                Ok(result) => {
                    let weight = ensemble_weight(config, model);
                    survivors.push((result, weight));
                }
                Err(err) => debug!("Discarding {} for {}: {}", model, route, err),
            }
        }

        let (predicted, interval, model_used) = if survivors.is_empty() {
            debug!("No model survived for {}, falling back to linear regression", route);
            (
                horizon.predicted_score,
                horizon.confidence_interval,
                vec![ForecastModel::LinearRegression],
            )
        } else {
            combine(&survivors)
        };

        let stage = if sessions.len() < config.prediction.min_sessions {
            PredictionStage::InsufficientData
        } else if model_used.len() == 1 {
            PredictionStage::SingleModel
        } else {
            PredictionStage::Ensemble
        };

        let current = if history.is_empty() {
            baseline.clone()
        } else {
            fill_summary(PerformanceSummary::from_samples(&history), baseline)
        };
        let factors = self.contributing_factors(&current, horizon.slope, &interval, horizon_days);
        let actions = recommended_actions(route, &factors);

        debug!(
            "Prediction for {}: {:.1} [{:.1}, {:.1}] via {:?} ({:?})",
            route, predicted, interval.lower, interval.upper, model_used, stage
        );

        PerformancePrediction {
            route: route.to_string(),
            metric: "performance_score".to_string(),
            predicted_value: predicted,
            confidence_interval: interval,
            time_horizon: format!("{}d", horizon_days),
            probability_of_issue: probability_below(
                predicted,
                &interval,
                config.recommendations.issue_score_threshold,
            ),
            contributing_factors: factors,
            recommended_actions: actions,
            model_used,
            stage,
        }
    }

    fn contributing_factors(
        &self,
        current: &PerformanceSummary,
        slope: f64,
        interval: &ConfidenceInterval,
        horizon_days: u32,
    ) -> Vec<ContributingFactor> {
        let config = self.config();
        let thresholds = &config.recommendations;
        let total_weight = config.weights.total();
        let mut factors = Vec::new();

        for metric in MetricType::SCORED {
            let Some(value) = current.get(metric) else {
                continue;
            };
            let score = self.scoring.calculate_metric_score(value, metric);
            if score >= thresholds.factor_score_threshold || total_weight <= 0.0 {
                continue;
            }

            let (name, description) = match metric {
                MetricType::Fps => (
                    "low_frame_rate",
                    format!("Average frame rate {:.1} fps scores {:.0}/100", value, score),
                ),
                MetricType::MemoryUsage => (
                    "high_memory_usage",
                    format!("Average memory {:.0} MB scores {:.0}/100", value, score),
                ),
                _ => (
                    "high_cpu_usage",
                    format!("Average CPU {:.1}% scores {:.0}/100", value, score),
                ),
            };
            factors.push(ContributingFactor {
                name: name.to_string(),
                weight: config.weights.weight(metric) / total_weight * (1.0 - score / 100.0),
                description,
            });
        }

        if slope < thresholds.declining_slope {
            let projected_drop = -slope * horizon_days.max(1) as f64;
            factors.push(ContributingFactor {
                name: "declining_trend".to_string(),
                weight: (projected_drop / 100.0).min(1.0),
                description: format!(
                    "Score falling {:.2} points/day, about {:.0} points over the horizon",
                    -slope, projected_drop
                ),
            });
        }

        let width = interval.width();
        if width > thresholds.high_variability_width {
            factors.push(ContributingFactor {
                name: "high_variability".to_string(),
                weight: (width / 200.0).min(0.5),
                description: format!("Forecast range spans {:.0} points", width),
            });
        }

        factors.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        factors
    }
}

fn two_point_line(xs: &[f64], ys: &[f64]) -> RegressionResult {
    let dx = xs[1] - xs[0];
    if dx.abs() <= f64::EPSILON {
        return RegressionResult::neutral(mean(ys));
    }
    let slope = (ys[1] - ys[0]) / dx;
    RegressionResult {
        slope,
        intercept: ys[0] - slope * xs[0],
        r_squared: 1.0,
        correlation: slope.signum(),
        p_value: 1.0,
        is_significant: false,
    }
}

fn require_positive(result: PredictionResult) -> Result<PredictionResult, ModelError> {
    if result.predicted_score > 0.0 {
        Ok(result)
    } else {
        Err(ModelError::NonPositiveScore {
            model: result.model.as_str(),
            score: result.predicted_score,
        })
    }
}

fn ensemble_weight(config: &EngineConfig, model: ForecastModel) -> f64 {
    let weights = &config.prediction.ensemble_weights;
    match model {
        ForecastModel::LinearRegression => weights.linear_regression,
        ForecastModel::ExponentialSmoothing => weights.exponential_smoothing,
        ForecastModel::SeasonalDecomposition => weights.seasonal_decomposition,
    }
}

/// Weighted mean of member scores and the union of their intervals
fn combine(
    survivors: &[(PredictionResult, f64)],
) -> (f64, ConfidenceInterval, Vec<ForecastModel>) {
    let total: f64 = survivors.iter().map(|(_, w)| w).sum();
    let predicted = if total > 0.0 {
        survivors
            .iter()
            .map(|(r, w)| r.predicted_score * w)
            .sum::<f64>()
            / total
    } else {
        survivors.iter().map(|(r, _)| r.predicted_score).sum::<f64>() / survivors.len() as f64
    };

    let lower = survivors
        .iter()
        .map(|(r, _)| r.confidence_interval.lower)
        .fold(f64::INFINITY, f64::min);
    let upper = survivors
        .iter()
        .map(|(r, _)| r.confidence_interval.upper)
        .fold(f64::NEG_INFINITY, f64::max);

    (
        predicted,
        ConfidenceInterval { lower, upper },
        survivors.iter().map(|(r, _)| r.model).collect(),
    )
}

/// Share of the interval below `threshold`, treating it as uniform
fn probability_below(predicted: f64, interval: &ConfidenceInterval, threshold: f64) -> f64 {
    let width = interval.width();
    if width <= f64::EPSILON {
        return if predicted < threshold { 1.0 } else { 0.0 };
    }
    ((threshold - interval.lower) / width).clamp(0.0, 1.0)
}

fn fill_summary(mut summary: PerformanceSummary, baseline: &PerformanceSummary) -> PerformanceSummary {
    summary.avg_fps = summary.get(MetricType::Fps).or(baseline.get(MetricType::Fps));
    summary.avg_memory = summary
        .get(MetricType::MemoryUsage)
        .or(baseline.get(MetricType::MemoryUsage));
    summary.avg_cpu = summary.get(MetricType::CpuUsage).or(baseline.get(MetricType::CpuUsage));
    summary.avg_load_time = summary
        .get(MetricType::LoadTime)
        .or(baseline.get(MetricType::LoadTime));
    summary
}

/// Metrics a sample did not report take the baseline average
fn fill_from_baseline(session: SessionSummary, baseline: &PerformanceSummary) -> SessionSummary {
    SessionSummary {
        started_at: session.started_at,
        summary: fill_summary(session.summary, baseline),
    }
}

fn recommended_actions(route: &str, factors: &[ContributingFactor]) -> Vec<String> {
    if factors.is_empty() {
        return vec![format!("Performance on {} is healthy; keep monitoring", route)];
    }

    factors
        .iter()
        .map(|factor| match factor.name.as_str() {
            "low_frame_rate" => format!(
                "Profile rendering on {}: cut overdraw, heavy layouts and main-thread work",
                route
            ),
            "high_memory_usage" => format!(
                "Audit memory on {}: release cached images and large buffers, check for leaks between visits",
                route
            ),
            "high_cpu_usage" => format!(
                "Move expensive work on {} off the main thread or defer it past first render",
                route
            ),
            "declining_trend" => format!(
                "Compare recent releases touching {}; its score is trending down",
                route
            ),
            _ => format!("Collect more sessions for {} to narrow the forecast range", route),
        })
        .collect()
}
