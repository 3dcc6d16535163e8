use sitemap_audit::{
    config::{Config, Throttling},
    runner::LighthouseConfigFile,
};

#[test]
fn parse_example_config() {
    let raw = include_str!("../sitemap-audit.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.global.workers, 4);
    assert_eq!(cfg.global.batch_size, 3);
    assert!(!cfg.paths.reports_dir.is_empty());
    assert_eq!(cfg.audit.command, "lighthouse");
    assert_eq!(cfg.lighthouse.only_categories.len(), 4);
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let cfg: Config = toml::from_str("[global]\nworkers = 2\n").expect("parse TOML");
    assert_eq!(cfg.global.workers, 2);
    assert_eq!(cfg.global.batch_size, 3);
    assert_eq!(cfg.output.summary_filename, "summary.json");
    assert_eq!(cfg.audit.chrome_flags, "--headless");
}

#[test]
fn throttling_profiles_resolve() {
    let mut cfg = Config::default();
    assert_eq!(
        cfg.lighthouse.resolved_throttling().unwrap(),
        Throttling::mobile_modern()
    );

    cfg.lighthouse.throttling_profile = "default_mobile".into();
    assert_eq!(
        cfg.lighthouse.resolved_throttling().unwrap().cpu_slowdown_multiplier,
        4.0
    );

    cfg.lighthouse.throttling_profile = "custom".into();
    cfg.lighthouse.throttling.rtt_ms = 300.0;
    assert_eq!(cfg.lighthouse.resolved_throttling().unwrap().rtt_ms, 300.0);

    cfg.lighthouse.throttling_profile = "satellite".into();
    assert!(cfg.lighthouse.resolved_throttling().is_err());
}

#[test]
fn lighthouse_config_uses_camel_case_keys() {
    let cfg = Config::default();
    let file = LighthouseConfigFile::from_settings(&cfg.lighthouse).unwrap();
    let v = serde_json::to_value(&file).unwrap();
    assert_eq!(v["extends"], "lighthouse:default");
    assert_eq!(v["settings"]["throttlingMethod"], "simulate");
    assert_eq!(v["settings"]["throttling"]["rttMs"], 20.0);
    assert_eq!(v["settings"]["onlyCategories"][1], "seo");
    assert_eq!(v["settings"]["skipAudits"][3], "color-contrast");
    assert_eq!(v["settings"]["disableFullPageScreenshot"], true);
}

#[test]
fn effective_config_round_trips_through_toml() {
    let cfg = Config::default();
    let raw = toml::to_string(&cfg).expect("serialize");
    let back: Config = toml::from_str(&raw).expect("parse");
    assert_eq!(back.lighthouse.skip_audits, cfg.lighthouse.skip_audits);
    assert_eq!(back.normalized_for_hash(), cfg.normalized_for_hash());
}

#[test]
fn work_dir_must_not_be_a_cleaned_dir() {
    assert!(Config::default().validate().is_ok());

    let mut cfg = Config::default();
    cfg.paths.work_dir = "./summary".into();
    let err = cfg.validate().unwrap_err().to_string();
    assert!(err.contains("paths.summary_dir"), "{err}");

    cfg.paths.work_dir = "reports/".into();
    assert!(cfg.validate().is_err());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sitemap-audit.toml");
    std::fs::write(&path, "[paths]\nreports_dir = \"out\"\nwork_dir = \"out\"\n").unwrap();
    assert!(Config::load(&path).is_err());
}
