use sitemap_audit::{
    config::Config,
    runner::{Auditor, LighthouseRunner},
    store::ReportStore,
    work::WorkItem,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

fn runner_in(dir: &Path, cfg: &mut Config) -> LighthouseRunner {
    cfg.paths.work_dir = dir.join("work").display().to_string();
    let store = ReportStore::new(dir.join("reports"));
    LighthouseRunner::new(cfg, store).unwrap()
}

#[test]
fn arguments_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = Config::default();
    let runner = runner_in(dir.path(), &mut cfg);
    let item = WorkItem::new("https://example.com/blog");

    let args = runner.command_args(&item);
    let config_path = dir.path().join("work").join("lighthouse.config.json");
    let report_path = dir.path().join("reports").join("example.com-blog.json");

    let mut config_arg = OsString::from("--config-path=");
    config_arg.push(&config_path);
    let expected: Vec<OsString> = vec![
        "https://example.com/blog".into(),
        "--output".into(),
        "json".into(),
        "--output-path".into(),
        report_path.into_os_string(),
        config_arg,
        "--chrome-flags=--headless".into(),
    ];
    assert_eq!(args, expected);
    assert_eq!(args, runner.command_args(&item));
}

#[test]
fn generated_config_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = Config::default();
    cfg.lighthouse.throttling_profile = "default_mobile".into();
    let runner = runner_in(dir.path(), &mut cfg);

    let raw = std::fs::read_to_string(runner.config_path()).unwrap();
    let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(v["settings"]["output"], "json");
    assert_eq!(v["settings"]["throttling"]["cpuSlowdownMultiplier"], 4.0);
}

#[test]
fn explicit_config_path_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = Config::default();
    cfg.paths.work_dir = dir.path().join("work").display().to_string();
    cfg.audit.config_path = dir.path().join("nope.js").display().to_string();
    assert!(LighthouseRunner::new(&cfg, ReportStore::new(dir.path())).is_err());

    let custom = dir.path().join("lighthouse.config.js");
    std::fs::write(&custom, "export default {}").unwrap();
    cfg.audit.config_path = custom.display().to_string();
    cfg.audit.extra_args = vec!["--quiet".into()];
    let runner = LighthouseRunner::new(&cfg, ReportStore::new(dir.path())).unwrap();
    assert_eq!(runner.config_path(), custom.as_path());
    let args = runner.command_args(&WorkItem::new("https://e.com"));
    assert_eq!(args.last().unwrap(), "--quiet");
}

fn with_command(dir: &Path, command: &str) -> LighthouseRunner {
    let mut cfg = Config::default();
    cfg.audit.command = command.into();
    cfg.audit.output_wait_ms = 200;
    cfg.audit.timeout_seconds = 1;
    std::fs::create_dir_all(dir.join("reports")).unwrap();
    runner_in(dir, &mut cfg)
}

#[cfg(unix)]
fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[tokio::test]
async fn clean_exit_without_report_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let runner = with_command(dir.path(), "true");
    let err = runner
        .audit(&WorkItem::new("https://a.test/x"))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("report not written"), "{err:#}");
}

#[cfg(unix)]
#[tokio::test]
async fn nonzero_exit_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let runner = with_command(dir.path(), "false");
    let err = runner
        .audit(&WorkItem::new("https://a.test/x"))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("exited with"), "{err:#}");
}

#[cfg(unix)]
#[tokio::test]
async fn scripted_tool_writes_report_or_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    // $5 is the value of --output-path
    let writes = script(&bin, "writes.sh", r#"printf '{"categories":{}}' > "$5""#);
    let hangs = script(&bin, "hangs.sh", "exec sleep 5");

    let item = WorkItem::new("https://a.test/x");
    let runner = with_command(dir.path(), &writes.display().to_string());
    runner.audit(&item).await.unwrap();
    let report = dir.path().join("reports").join("a.test-x.json");
    assert_eq!(std::fs::read_to_string(&report).unwrap(), r#"{"categories":{}}"#);

    let runner = with_command(dir.path(), &hangs.display().to_string());
    let started = std::time::Instant::now();
    let err = runner.audit(&WorkItem::new("https://a.test/slow")).await.unwrap_err();
    assert!(format!("{err:#}").contains("exceeded timeout"), "{err:#}");
    assert!(started.elapsed() < std::time::Duration::from_secs(4));
}
