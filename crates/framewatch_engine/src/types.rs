//! Telemetry data model shared by every engine component.
//!
//! Samples are fixed-shape records. A metric that was not collected, or that
//! arrived as NaN/infinity, reads back as `None` from [`Sample::value`].

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One performance observation from the collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    /// Frames per second
    #[serde(default)]
    pub fps: Option<f64>,
    /// Resident memory in MB
    #[serde(default)]
    pub memory_usage: Option<f64>,
    /// CPU usage percent (0-100)
    #[serde(default)]
    pub cpu_usage: Option<f64>,
    /// Screen load time in ms
    #[serde(default)]
    pub load_time: Option<f64>,
    /// Screen or route label (non-unique)
    #[serde(default)]
    pub screen_name: String,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, screen_name: impl Into<String>) -> Self {
        Self {
            timestamp,
            fps: None,
            memory_usage: None,
            cpu_usage: None,
            load_time: None,
            screen_name: screen_name.into(),
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    pub fn with_memory(mut self, memory_mb: f64) -> Self {
        self.memory_usage = Some(memory_mb);
        self
    }

    pub fn with_cpu(mut self, cpu_percent: f64) -> Self {
        self.cpu_usage = Some(cpu_percent);
        self
    }

    pub fn with_load_time(mut self, load_time_ms: f64) -> Self {
        self.load_time = Some(load_time_ms);
        self
    }

    /// Value of `metric`, or `None` when missing or non-finite
    pub fn value(&self, metric: MetricType) -> Option<f64> {
        let raw = match metric {
            MetricType::Fps => self.fps,
            MetricType::MemoryUsage => self.memory_usage,
            MetricType::CpuUsage => self.cpu_usage,
            MetricType::LoadTime => self.load_time,
        };
        raw.filter(|v| v.is_finite())
    }
}

/// Metric carried by a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Fps,
    MemoryUsage,
    CpuUsage,
    LoadTime,
}

impl MetricType {
    pub const ALL: [MetricType; 4] = [
        MetricType::Fps,
        MetricType::MemoryUsage,
        MetricType::CpuUsage,
        MetricType::LoadTime,
    ];

    /// The three metrics that feed the composite score
    pub const SCORED: [MetricType; 3] = [
        MetricType::Fps,
        MetricType::MemoryUsage,
        MetricType::CpuUsage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Fps => "fps",
            MetricType::MemoryUsage => "memory_usage",
            MetricType::CpuUsage => "cpu_usage",
            MetricType::LoadTime => "load_time",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fps" => Some(MetricType::Fps),
            "memory" | "memory_usage" => Some(MetricType::MemoryUsage),
            "cpu" | "cpu_usage" => Some(MetricType::CpuUsage),
            "load" | "load_time" => Some(MetricType::LoadTime),
            _ => None,
        }
    }

    /// Only frame rate improves as it grows
    pub fn higher_is_better(&self) -> bool {
        matches!(self, MetricType::Fps)
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collect the valid values of `metric`, preserving input order
pub fn metric_values(samples: &[Sample], metric: MetricType) -> Vec<f64> {
    samples.iter().filter_map(|s| s.value(metric)).collect()
}

/// Clone and order samples ascending by timestamp
///
/// Stable, so samples sharing a timestamp keep their input order.
pub fn sorted_by_time(samples: &[Sample]) -> Vec<Sample> {
    let mut sorted = samples.to_vec();
    sorted.sort_by_key(|s| s.timestamp);
    sorted
}

/// Per-metric averages for a route, device or session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    #[serde(default)]
    pub avg_fps: Option<f64>,
    #[serde(default)]
    pub avg_memory: Option<f64>,
    #[serde(default)]
    pub avg_cpu: Option<f64>,
    #[serde(default)]
    pub avg_load_time: Option<f64>,
}

impl PerformanceSummary {
    pub fn new(fps: f64, memory: f64, cpu: f64) -> Self {
        Self {
            avg_fps: Some(fps),
            avg_memory: Some(memory),
            avg_cpu: Some(cpu),
            avg_load_time: None,
        }
    }

    /// Average every metric over its valid values
    pub fn from_samples(samples: &[Sample]) -> Self {
        let avg = |metric| {
            let values = metric_values(samples, metric);
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };

        Self {
            avg_fps: avg(MetricType::Fps),
            avg_memory: avg(MetricType::MemoryUsage),
            avg_cpu: avg(MetricType::CpuUsage),
            avg_load_time: avg(MetricType::LoadTime),
        }
    }

    pub fn get(&self, metric: MetricType) -> Option<f64> {
        let raw = match metric {
            MetricType::Fps => self.avg_fps,
            MetricType::MemoryUsage => self.avg_memory,
            MetricType::CpuUsage => self.avg_cpu,
            MetricType::LoadTime => self.avg_load_time,
        };
        raw.filter(|v| v.is_finite())
    }
}

/// A scored unit of history for prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub started_at: DateTime<Utc>,
    pub summary: PerformanceSummary,
}

impl SessionSummary {
    pub fn new(started_at: DateTime<Utc>, summary: PerformanceSummary) -> Self {
        Self { started_at, summary }
    }

    pub fn from_sample(sample: &Sample) -> Self {
        Self {
            started_at: sample.timestamp,
            summary: PerformanceSummary {
                avg_fps: sample.value(MetricType::Fps),
                avg_memory: sample.value(MetricType::MemoryUsage),
                avg_cpu: sample.value(MetricType::CpuUsage),
                avg_load_time: sample.value(MetricType::LoadTime),
            },
        }
    }
}

/// Calendar grain a seasonal pattern is computed against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

const WEEKDAYS: [&str; 7] = [
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

impl PatternType {
    pub const ALL: [PatternType; 4] = [
        PatternType::Hourly,
        PatternType::Daily,
        PatternType::Weekly,
        PatternType::Monthly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Hourly => "hourly",
            PatternType::Daily => "daily",
            PatternType::Weekly => "weekly",
            PatternType::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hourly" => Some(PatternType::Hourly),
            "daily" => Some(PatternType::Daily),
            "weekly" => Some(PatternType::Weekly),
            "monthly" => Some(PatternType::Monthly),
            _ => None,
        }
    }

    /// Number of buckets in one cycle
    pub fn bucket_count(&self) -> usize {
        match self {
            PatternType::Hourly => 24,
            PatternType::Daily => 7,
            PatternType::Weekly => 4,
            PatternType::Monthly => 12,
        }
    }

    /// Bucket index of `ts` for this grain
    pub fn bucket_of(&self, ts: &DateTime<Utc>) -> usize {
        match self {
            PatternType::Hourly => ts.hour() as usize,
            PatternType::Daily => ts.weekday().num_days_from_monday() as usize,
            // Days 29-31 fold into the fourth week
            PatternType::Weekly => (((ts.day() - 1) / 7) as usize).min(3),
            PatternType::Monthly => ts.month0() as usize,
        }
    }

    /// Human label for a bucket
    pub fn label(&self, bucket: usize) -> String {
        match self {
            PatternType::Hourly => format!("{:02}:00", bucket),
            PatternType::Daily => WEEKDAYS.get(bucket).copied().unwrap_or("unknown").to_string(),
            PatternType::Weekly => format!("week {}", bucket + 1),
            PatternType::Monthly => MONTHS.get(bucket).copied().unwrap_or("unknown").to_string(),
        }
    }

    /// First bucket start strictly after `after` that falls into `bucket`
    pub fn next_occurrence(&self, after: &DateTime<Utc>, bucket: usize) -> Option<DateTime<Utc>> {
        let midnight = |date: NaiveDate| {
            date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive))
        };

        match self {
            PatternType::Hourly => {
                let hour_start = after
                    .date_naive()
                    .and_hms_opt(after.hour(), 0, 0)
                    .map(|naive| Utc.from_utc_datetime(&naive))?;
                (1..=24)
                    .map(|h| hour_start + Duration::hours(h))
                    .find(|ts| self.bucket_of(ts) == bucket)
            }
            PatternType::Daily | PatternType::Weekly => {
                let today = midnight(after.date_naive())?;
                (1..=35)
                    .map(|d| today + Duration::days(d))
                    .find(|ts| self.bucket_of(ts) == bucket)
            }
            PatternType::Monthly => {
                let base = after.year() * 12 + after.month0() as i32;
                (1..=12).find_map(|k| {
                    let target = base + k;
                    let date = NaiveDate::from_ymd_opt(target / 12, (target % 12) as u32 + 1, 1)?;
                    midnight(date).filter(|ts| self.bucket_of(ts) == bucket)
                })
            }
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Average behaviour of one bucket in a seasonal pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStat {
    pub bucket: usize,
    pub label: String,
    pub average_value: f64,
    /// Share of the analysed samples that fell into this bucket (0-1)
    pub frequency: f64,
}

/// A recurring cycle in one metric at one grain
///
/// Only valid for the sample window it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPattern {
    pub pattern_type: PatternType,
    pub metric: MetricType,
    pub peak_periods: Vec<PeriodStat>,
    pub low_periods: Vec<PeriodStat>,
    pub amplitude: f64,
    pub confidence: f64,
    pub seasonal_strength: f64,
    pub next_peak: Option<DateTime<Utc>>,
    pub next_low: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_value_filters_non_finite() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let sample = Sample::new(ts, "home").with_fps(f64::NAN).with_cpu(12.0);

        assert_eq!(sample.value(MetricType::Fps), None);
        assert_eq!(sample.value(MetricType::CpuUsage), Some(12.0));
        assert_eq!(sample.value(MetricType::MemoryUsage), None);
    }

    #[test]
    fn test_summary_from_samples() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let samples = vec![
            Sample::new(ts, "home").with_fps(50.0).with_memory(100.0),
            Sample::new(ts, "home").with_fps(60.0),
        ];

        let summary = PerformanceSummary::from_samples(&samples);
        assert_eq!(summary.avg_fps, Some(55.0));
        assert_eq!(summary.avg_memory, Some(100.0));
        assert_eq!(summary.avg_cpu, None);
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!(MetricType::parse("CPU"), Some(MetricType::CpuUsage));
        assert_eq!(MetricType::parse("memory_usage"), Some(MetricType::MemoryUsage));
        assert_eq!(MetricType::parse("gpu"), None);
        assert!(MetricType::Fps.higher_is_better());
        assert!(!MetricType::LoadTime.higher_is_better());
    }

    #[test]
    fn test_pattern_buckets() {
        // 2025-03-30 is a Sunday
        let ts = Utc.with_ymd_and_hms(2025, 3, 30, 14, 25, 0).unwrap();
        assert_eq!(PatternType::Hourly.bucket_of(&ts), 14);
        assert_eq!(PatternType::Daily.bucket_of(&ts), 6);
        assert_eq!(PatternType::Weekly.bucket_of(&ts), 3);
        assert_eq!(PatternType::Monthly.bucket_of(&ts), 2);
        assert_eq!(PatternType::Daily.label(6), "Sunday");
        assert_eq!(PatternType::Hourly.label(9), "09:00");
    }

    #[test]
    fn test_next_occurrence() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 30, 14, 25, 0).unwrap();

        let next_hour = PatternType::Hourly.next_occurrence(&ts, 9).unwrap();
        assert_eq!(next_hour, Utc.with_ymd_and_hms(2025, 3, 31, 9, 0, 0).unwrap());

        // Next Monday
        let next_day = PatternType::Daily.next_occurrence(&ts, 0).unwrap();
        assert_eq!(next_day, Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap());

        let next_month = PatternType::Monthly.next_occurrence(&ts, 0).unwrap();
        assert_eq!(next_month, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    }
}
