use halo_runtime::{Rotation, RuntimeConfig, RuntimeError};
use std::time::Duration;

#[test]
fn test_empty_object_yields_defaults() {
    let config = RuntimeConfig::from_json("{}").unwrap();
    assert_eq!(config, RuntimeConfig::default());
    assert_eq!(config.paint_period(), Duration::from_millis(33));
    assert_eq!(config.poll_interval(), Duration::from_millis(20));
    assert_eq!(config.gesture.long_press_ms, 400);
    assert_eq!(config.gesture.double_tap_ms, 300);
    assert_eq!(config.gesture.near_threshold, 8.0);
}

#[test]
fn test_partial_override() {
    let config = RuntimeConfig::from_json(
        r#"{ "rotation": "deg90", "gesture": { "long_press_ms": 150 }, "background": [1, 2, 3, 255] }"#,
    )
    .unwrap();
    assert_eq!(config.rotation, Rotation::Deg90);
    assert_eq!(config.gesture.long_press_ms, 150);
    assert_eq!(config.gesture.near_threshold, 8.0);
    assert_eq!(config.background_color().0, [1, 2, 3, 255]);
}

#[test]
fn test_zero_period_is_rejected() {
    let err = RuntimeConfig::from_json(r#"{ "paint_period_ms": 0 }"#).unwrap_err();
    assert!(matches!(err, RuntimeError::Config(_)), "{err}");
}

#[test]
fn test_negative_threshold_is_rejected() {
    let err = RuntimeConfig::from_json(r#"{ "gesture": { "near_threshold": -1.0 } }"#).unwrap_err();
    assert!(matches!(err, RuntimeError::Config(_)), "{err}");
}

#[test]
fn test_malformed_json_is_a_parse_error() {
    let err = RuntimeConfig::from_json("{ nope").unwrap_err();
    assert!(matches!(err, RuntimeError::Parse(_)), "{err}");
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("halo.json");
    std::fs::write(&path, r#"{ "paint_period_ms": 16 }"#).unwrap();
    let config = RuntimeConfig::load(&path).unwrap();
    assert_eq!(config.paint_period_ms, 16);

    let missing = RuntimeConfig::load(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(missing, RuntimeError::Io(_)));
}
