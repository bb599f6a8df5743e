//! Tests for loading and validating engine configuration files.

use framewatch_engine::config::EngineConfig;
use framewatch_engine::error::EngineError;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_overrides_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("framewatch.toml");
    fs::write(
        &path,
        r#"
anomaly_threshold = 3.0

[benchmarks.fps]
excellent = 115.0
good = 90.0
average = 60.0
poor = 30.0

[prediction]
seasonal_period = 24

[prediction.ensemble_weights]
seasonal_decomposition = 0.0
"#,
    )
    .unwrap();

    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config.anomaly_threshold, 3.0);
    assert_eq!(config.benchmarks.fps.excellent, 115.0);
    assert_eq!(config.benchmarks.memory.excellent, 100.0);
    assert_eq!(config.prediction.seasonal_period, 24);
    assert_eq!(config.prediction.min_sessions, 3);
    assert_eq!(config.prediction.ensemble_weights.seasonal_decomposition, 0.0);
    assert_eq!(config.prediction.ensemble_weights.linear_regression, 0.4);
}

#[test]
fn test_missing_file_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = EngineConfig::load(&temp_dir.path().join("absent.toml"));
    assert!(matches!(result, Err(EngineError::Io(_))));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let result = EngineConfig::from_toml_str("anomaly_threshold = [");
    assert!(matches!(result, Err(EngineError::ConfigParse(_))));
}

#[test]
fn test_invalid_values_rejected() {
    let negative = EngineConfig::from_toml_str("anomaly_threshold = -1.0");
    assert!(matches!(negative, Err(EngineError::InvalidConfig(_))));

    let too_strong = EngineConfig::from_toml_str("trend_adjustment_weight = 25.0");
    assert!(matches!(too_strong, Err(EngineError::InvalidConfig(_))));

    let short_period = EngineConfig::from_toml_str("[prediction]\nseasonal_period = 1");
    assert!(matches!(short_period, Err(EngineError::InvalidConfig(_))));

    let no_models = EngineConfig::from_toml_str(
        "[prediction.ensemble_weights]\nlinear_regression = 0.0\nexponential_smoothing = 0.0\nseasonal_decomposition = 0.0",
    );
    assert!(matches!(no_models, Err(EngineError::InvalidConfig(_))));
}

#[test]
fn test_written_config_reloads() {
    let mut config = EngineConfig::default();
    config.weights.fps = 0.5;
    config.recommendations.issue_score_threshold = 70.0;

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("framewatch.toml");
    fs::write(&path, config.to_toml_string().unwrap()).unwrap();

    assert_eq!(EngineConfig::load(&path).unwrap(), config);
}

#[test]
fn test_empty_file_is_default() {
    assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
}
