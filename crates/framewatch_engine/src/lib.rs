//! Framewatch analytical engine.
//!
//! Statistics, time-series analysis, scoring and prediction over device
//! performance telemetry (frame rate, memory, CPU, load time).
//! All engines are pure and synchronous; configuration is passed in at
//! construction and the wall clock is never read.

pub mod config;
pub mod error;
pub mod insights;
pub mod prediction;
pub mod scoring;
pub mod statistics;
pub mod time_series;
pub mod types;

pub use config::EngineConfig;
pub use error::{EngineError, ModelError, Result};
pub use insights::{InsightsEngine, RouteInsights};
pub use prediction::{
    ForecastModel, HorizonForecast, PerformancePrediction, PredictionEngine, PredictionStage,
};
pub use scoring::{DeviceTier, Grade, PerformanceScore, ScoringEngine};
pub use types::{
    MetricType, PatternType, PerformanceSummary, Sample, SeasonalPattern, SessionSummary,
};
