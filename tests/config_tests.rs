use clipsaver::config::Configuration;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
manifest-url: "https://cdn.example/manifest.json"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.manifest_url, "https://cdn.example/manifest.json");
    assert_eq!(cfg.settings_path, PathBuf::from("settings.json"));
    assert_eq!(cfg.probe_timeout, Duration::from_secs(8));
    assert_eq!(cfg.near_end_lead, Duration::from_millis(1500));
    assert_eq!(cfg.decel_tick, Duration::from_millis(120));
    assert!((cfg.slow_rate_ceiling - 0.7).abs() < f64::EPSILON);
    assert!((cfg.min_rate - 0.5).abs() < f64::EPSILON);
}

#[test]
fn parse_humantime_durations() {
    let yaml = r#"
manifest-url: "https://cdn.example/manifest.json"
probe-timeout: 12s
near-end-lead: 2s 500ms
decel-tick: 100ms
end-epsilon: 80ms
inter-clip-delay: 1s
resize-settle: 400ms
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.probe_timeout, Duration::from_secs(12));
    assert_eq!(cfg.near_end_lead, Duration::from_millis(2500));
    assert_eq!(cfg.decel_tick, Duration::from_millis(100));
    assert_eq!(cfg.end_epsilon, Duration::from_millis(80));
    assert_eq!(cfg.inter_clip_delay, Duration::from_secs(1));
    assert_eq!(cfg.resize_settle, Duration::from_millis(400));
}

#[test]
fn parse_screen_and_rate_overrides() {
    let yaml = r#"
manifest-url: "https://cdn.example/manifest.json"
screen-width: 1080
screen-height: 1920
slow-rate-ceiling: 0.8
min-rate: 0.4
decel-step: 0.1
square-tolerance: 0.05
"#;
    let cfg: Configuration = serde_yaml::from_str::<Configuration>(yaml).unwrap().validated().unwrap();
    assert_eq!((cfg.screen_width, cfg.screen_height), (1080, 1920));
    assert!((cfg.slow_rate_ceiling - 0.8).abs() < f64::EPSILON);
    assert!((cfg.min_rate - 0.4).abs() < f64::EPSILON);
}

#[test]
fn validation_requires_a_manifest_url() {
    let cfg = Configuration::default();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("manifest-url"));
}

#[test]
fn validation_rejects_inverted_rate_bounds() {
    let yaml = r#"
manifest-url: "https://cdn.example/manifest.json"
min-rate: 0.9
slow-rate-ceiling: 0.6
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn validation_rejects_out_of_range_tolerance() {
    let yaml = r#"
manifest-url: "https://cdn.example/manifest.json"
square-tolerance: 1.5
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn unknown_keys_are_rejected() {
    let yaml = r#"
manifest-url: "https://cdn.example/manifest.json"
dwell-ms: 2000
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}
