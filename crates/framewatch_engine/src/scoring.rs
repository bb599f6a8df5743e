//! Scoring Engine
//!
//! Turns metric averages into a weighted 0-100 score and letter grade,
//! nudged by recent trends. Also benchmarks against a baseline and places a
//! device into a coarse performance tier.

use crate::config::{BenchmarkThresholds, EngineConfig, MAX_TREND_ADJUSTMENT};
use crate::statistics::{analyze_trend, TrendAnalysis, TrendDirection, MIN_TREND_POINTS};
use crate::types::{MetricType, PerformanceSummary, Sample};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Net trend signal beyond which the score trend is not "stable"
const TREND_SIGNAL_DEADBAND: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => Grade::A,
            s if s >= 80.0 => Grade::B,
            s if s >= 70.0 => Grade::C,
            s if s >= 60.0 => Grade::D,
            _ => Grade::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreTrend {
    Improving,
    #[default]
    Stable,
    Declining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub fps: u8,
    pub memory: u8,
    pub cpu: u8,
}

/// Percentage change of each metric against a baseline
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub fps_change_pct: f64,
    pub memory_change_pct: f64,
    pub cpu_change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceScore {
    pub overall: u8,
    pub breakdown: ScoreBreakdown,
    pub grade: Grade,
    pub trend: ScoreTrend,
    /// Points added (positive) or removed by the trend adjustment
    pub trend_adjustment: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_comparison: Option<BaselineComparison>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineClassification {
    Excellent,
    Good,
    Average,
    Poor,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineBenchmark {
    pub score: f64,
    pub deviation_pct: f64,
    pub classification: BaselineClassification,
}

/// Coarse device class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceTier {
    HighEnd,
    MidRange,
    LowEnd,
}

impl DeviceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceTier::HighEnd => "high_end",
            DeviceTier::MidRange => "mid_range",
            DeviceTier::LowEnd => "low_end",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceTierResult {
    pub tier: DeviceTier,
    pub confidence: f64,
    /// Accumulated rule points (0-9)
    pub points: u8,
    pub reasoning: Vec<String>,
}

/// Weighted scoring over configured benchmarks
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: EngineConfig,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ScoringEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Score one metric value on 0-100 against its benchmark bands
    ///
    /// NaN, infinite or negative values score 0.
    pub fn calculate_metric_score(&self, value: f64, metric: MetricType) -> f64 {
        if !value.is_finite() || value < 0.0 {
            return 0.0;
        }
        let bands = self.config.benchmarks.for_metric(metric);
        let score = if metric.higher_is_better() {
            score_higher_is_better(value, bands)
        } else {
            score_lower_is_better(value, bands)
        };
        score.clamp(0.0, 100.0)
    }

    /// Weighted composite of fps, memory and cpu; missing metrics score 0
    pub fn composite_score(&self, summary: &PerformanceSummary) -> f64 {
        let weights = &self.config.weights;
        let total = weights.total();
        if total <= 0.0 {
            return 0.0;
        }

        MetricType::SCORED
            .iter()
            .map(|&metric| self.summary_metric_score(summary, metric) * weights.weight(metric))
            .sum::<f64>()
            / total
    }

    fn summary_metric_score(&self, summary: &PerformanceSummary, metric: MetricType) -> f64 {
        summary
            .get(metric)
            .map(|v| self.calculate_metric_score(v, metric))
            .unwrap_or(0.0)
    }

    /// Overall score with optional trend adjustment and baseline deltas
    ///
    /// `trend_samples` only counts when at least five are supplied.
    pub fn calculate_performance_score(
        &self,
        summary: &PerformanceSummary,
        trend_samples: Option<&[Sample]>,
        baseline: Option<&PerformanceSummary>,
    ) -> PerformanceScore {
        let base = self.composite_score(summary);

        let (trend, trend_adjustment) = match trend_samples {
            Some(samples) if samples.len() >= MIN_TREND_POINTS => {
                let trends: Vec<TrendAnalysis> = MetricType::SCORED
                    .iter()
                    .map(|&metric| analyze_trend(samples, metric, "scoring window"))
                    .collect();
                self.trend_adjustment(&trends)
            }
            _ => (ScoreTrend::Stable, 0.0),
        };

        let overall = (base + trend_adjustment).clamp(0.0, 100.0).round();
        debug!(
            "Performance score: base={:.1} adjustment={:.1} overall={}",
            base, trend_adjustment, overall
        );

        PerformanceScore {
            overall: overall as u8,
            breakdown: ScoreBreakdown {
                fps: self.summary_metric_score(summary, MetricType::Fps).round() as u8,
                memory: self.summary_metric_score(summary, MetricType::MemoryUsage).round() as u8,
                cpu: self.summary_metric_score(summary, MetricType::CpuUsage).round() as u8,
            },
            grade: Grade::from_score(overall),
            trend,
            trend_adjustment,
            baseline_comparison: baseline.map(|b| BaselineComparison {
                fps_change_pct: pct_change(summary.get(MetricType::Fps), b.get(MetricType::Fps)),
                memory_change_pct: pct_change(
                    summary.get(MetricType::MemoryUsage),
                    b.get(MetricType::MemoryUsage),
                ),
                cpu_change_pct: pct_change(
                    summary.get(MetricType::CpuUsage),
                    b.get(MetricType::CpuUsage),
                ),
            }),
        }
    }

    /// Aggregate per-metric trends into a direction and a bounded point shift
    pub fn trend_adjustment(&self, trends: &[TrendAnalysis]) -> (ScoreTrend, f64) {
        let weights = &self.config.weights;
        let mut improving = 0.0;
        let mut declining = 0.0;

        for trend in trends {
            let signal =
                trend.confidence * trend.significance.multiplier() * weights.weight(trend.metric);
            let better = trend.metric.higher_is_better();
            match (trend.direction, better) {
                (TrendDirection::Up, true) | (TrendDirection::Down, false) => improving += signal,
                (TrendDirection::Down, true) | (TrendDirection::Up, false) => declining += signal,
                (TrendDirection::Stable, _) => {}
            }
        }

        let net = improving - declining;
        let max_points = self
            .config
            .trend_adjustment_weight
            .clamp(0.0, MAX_TREND_ADJUSTMENT);
        let magnitude = net.abs().min(1.0) * max_points;

        if net > TREND_SIGNAL_DEADBAND {
            (ScoreTrend::Improving, magnitude)
        } else if net < -TREND_SIGNAL_DEADBAND {
            (ScoreTrend::Declining, -magnitude)
        } else {
            (ScoreTrend::Stable, 0.0)
        }
    }

    /// Classify `current` by its percentage distance from `baseline`
    pub fn benchmark_against_baseline(
        &self,
        current: f64,
        baseline: f64,
        metric: MetricType,
    ) -> BaselineBenchmark {
        if !current.is_finite() || !baseline.is_finite() {
            return BaselineBenchmark {
                score: 0.0,
                deviation_pct: 0.0,
                classification: BaselineClassification::Critical,
            };
        }

        let deviation_pct = if baseline > 0.0 {
            (current - baseline) / baseline * 100.0
        } else if current == 0.0 {
            0.0
        } else {
            100.0
        };

        let (classification, base_score): (BaselineClassification, f64) = match deviation_pct.abs() {
            d if d <= 5.0 => (BaselineClassification::Excellent, 95.0),
            d if d <= 15.0 => (BaselineClassification::Good, 80.0),
            d if d <= 30.0 => (BaselineClassification::Average, 65.0),
            d if d <= 50.0 => (BaselineClassification::Poor, 45.0),
            _ => (BaselineClassification::Critical, 25.0),
        };

        let favourable = if metric.higher_is_better() {
            deviation_pct > 0.0
        } else {
            deviation_pct < 0.0
        };
        let nudge = if deviation_pct == 0.0 {
            0.0
        } else if favourable {
            10.0
        } else {
            -10.0
        };

        BaselineBenchmark {
            score: (base_score + nudge).clamp(0.0, 100.0),
            deviation_pct,
            classification,
        }
    }

    /// Rule-based device tier
    ///
    /// A heuristic point system over average fps, memory and cpu, not a
    /// learned model. Each metric earns 0-3 points; 7+ is high end, 4+ mid
    /// range.
    pub fn calculate_performance_tier(&self, summary: &PerformanceSummary) -> PerformanceTierResult {
        let mut points = 0u8;
        let mut reasoning = Vec::new();

        match summary.get(MetricType::Fps) {
            Some(fps) => {
                let earned = match fps {
                    f if f >= 55.0 => 3,
                    f if f >= 40.0 => 2,
                    f if f >= 25.0 => 1,
                    _ => 0,
                };
                points += earned;
                reasoning.push(format!("Average frame rate {:.1} fps (+{})", fps, earned));
            }
            None => reasoning.push("No frame rate data (+0)".to_string()),
        }

        match summary.get(MetricType::MemoryUsage) {
            Some(memory) => {
                let earned = match memory {
                    m if m <= 150.0 => 3,
                    m if m <= 300.0 => 2,
                    m if m <= 500.0 => 1,
                    _ => 0,
                };
                points += earned;
                reasoning.push(format!("Average memory {:.0} MB (+{})", memory, earned));
            }
            None => reasoning.push("No memory data (+0)".to_string()),
        }

        match summary.get(MetricType::CpuUsage) {
            Some(cpu) => {
                let earned = match cpu {
                    c if c <= 30.0 => 3,
                    c if c <= 50.0 => 2,
                    c if c <= 70.0 => 1,
                    _ => 0,
                };
                points += earned;
                reasoning.push(format!("Average CPU {:.1}% (+{})", cpu, earned));
            }
            None => reasoning.push("No CPU data (+0)".to_string()),
        }

        let tier = match points {
            p if p >= 7 => DeviceTier::HighEnd,
            p if p >= 4 => DeviceTier::MidRange,
            _ => DeviceTier::LowEnd,
        };

        // Distance from the nearest band edge (3.5 and 6.5)
        let p = points as f64;
        let distance = ((p - 3.5).abs().min((p - 6.5).abs()) - 0.5).max(0.0);
        let confidence = (0.6 + 0.2 * distance).min(1.0);

        debug!("Device tier {} with {} points", tier.as_str(), points);

        PerformanceTierResult {
            tier,
            confidence,
            points,
            reasoning,
        }
    }
}

fn score_lower_is_better(value: f64, bands: &BenchmarkThresholds) -> f64 {
    if value <= bands.excellent {
        100.0
    } else if value <= bands.good {
        interpolate(value, bands.excellent, bands.good, 100.0, 80.0)
    } else if value <= bands.average {
        interpolate(value, bands.good, bands.average, 80.0, 60.0)
    } else if value <= bands.poor {
        interpolate(value, bands.average, bands.poor, 60.0, 40.0)
    } else if bands.poor > 0.0 {
        40.0 * (1.0 - (value - bands.poor) / bands.poor).max(0.0)
    } else {
        0.0
    }
}

fn score_higher_is_better(value: f64, bands: &BenchmarkThresholds) -> f64 {
    if value >= bands.excellent {
        100.0
    } else if value >= bands.good {
        interpolate(value, bands.good, bands.excellent, 80.0, 100.0)
    } else if value >= bands.average {
        interpolate(value, bands.average, bands.good, 60.0, 80.0)
    } else if value >= bands.poor {
        interpolate(value, bands.poor, bands.average, 40.0, 60.0)
    } else if bands.poor > 0.0 {
        40.0 * value / bands.poor
    } else {
        0.0
    }
}

/// Map `value` in [from_edge, to_edge] onto [from_score, to_score]
fn interpolate(value: f64, from_edge: f64, to_edge: f64, from_score: f64, to_score: f64) -> f64 {
    let span = to_edge - from_edge;
    if span.abs() <= f64::EPSILON {
        return from_score.min(to_score);
    }
    from_score + (to_score - from_score) * (value - from_edge) / span
}

/// Percentage change from `baseline`; 0 when either side is missing or the
/// baseline is not positive
fn pct_change(current: Option<f64>, baseline: Option<f64>) -> f64 {
    match (current, baseline) {
        (Some(c), Some(b)) if b > 0.0 => (c - b) / b * 100.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_is_better_anchors() {
        let engine = ScoringEngine::default();
        assert_eq!(engine.calculate_metric_score(20.0, MetricType::CpuUsage), 100.0);
        assert!((engine.calculate_metric_score(40.0, MetricType::CpuUsage) - 80.0).abs() < 1e-9);
        assert!((engine.calculate_metric_score(50.0, MetricType::CpuUsage) - 70.0).abs() < 1e-9);
        assert!((engine.calculate_metric_score(80.0, MetricType::CpuUsage) - 40.0).abs() < 1e-9);
        assert!((engine.calculate_metric_score(120.0, MetricType::CpuUsage) - 20.0).abs() < 1e-9);
        assert_eq!(engine.calculate_metric_score(1000.0, MetricType::MemoryUsage), 0.0);
    }

    #[test]
    fn test_higher_is_better_anchors() {
        let engine = ScoringEngine::default();
        assert_eq!(engine.calculate_metric_score(60.0, MetricType::Fps), 100.0);
        assert!((engine.calculate_metric_score(45.0, MetricType::Fps) - 80.0).abs() < 1e-9);
        assert!((engine.calculate_metric_score(25.0, MetricType::Fps) - 50.0).abs() < 1e-9);
        assert!((engine.calculate_metric_score(10.0, MetricType::Fps) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_values_score_zero() {
        let engine = ScoringEngine::default();
        assert_eq!(engine.calculate_metric_score(f64::NAN, MetricType::Fps), 0.0);
        assert_eq!(engine.calculate_metric_score(-5.0, MetricType::CpuUsage), 0.0);
    }

    #[test]
    fn test_grade_cutoffs() {
        assert_eq!(Grade::from_score(90.0), Grade::A);
        assert_eq!(Grade::from_score(89.9), Grade::B);
        assert_eq!(Grade::from_score(70.0), Grade::C);
        assert_eq!(Grade::from_score(60.0), Grade::D);
        assert_eq!(Grade::from_score(59.0), Grade::F);
    }
}
