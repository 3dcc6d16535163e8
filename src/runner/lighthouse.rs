use super::{types::*, Auditor};
use crate::{config::Config, store::ReportStore, util::ensure_dir, work::WorkItem};
use anyhow::{anyhow, Context, Result};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const GENERATED_CONFIG: &str = "lighthouse.config.json";
const STDERR_TAIL_BYTES: usize = 2000;

pub struct LighthouseRunner {
    cfg: Config,
    store: ReportStore,
    program: PathBuf,
    config_path: PathBuf,
}

impl LighthouseRunner {
    pub fn new(cfg: &Config, store: ReportStore) -> Result<Self> {
        let config_path = resolve_config_path(cfg)?;
        Ok(Self {
            cfg: cfg.clone(),
            store,
            program: expand_tilde(&cfg.audit.command),
            config_path,
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Arguments for one audit; the same item always yields the same vector.
    pub fn command_args(&self, item: &WorkItem) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            item.raw_url.clone().into(),
            "--output".into(),
            "json".into(),
            "--output-path".into(),
            self.store.path_for(&item.file_key).into_os_string(),
        ];
        let mut config_arg = OsString::from("--config-path=");
        config_arg.push(&self.config_path);
        args.push(config_arg);
        if !self.cfg.audit.chrome_flags.is_empty() {
            args.push(format!("--chrome-flags={}", self.cfg.audit.chrome_flags).into());
        }
        args.extend(self.cfg.audit.extra_args.iter().map(OsString::from));
        args
    }

    pub async fn doctor(&self) -> ToolDiag {
        let mut diag = ToolDiag {
            command: self.program.display().to_string(),
            version: None,
            config_path: self.config_path.display().to_string(),
            ok: false,
            error: None,
        };
        let out = tokio::time::timeout(
            Duration::from_secs(30),
            Command::new(&self.program)
                .arg("--version")
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await;
        match out {
            Ok(Ok(out)) if out.status.success() => {
                diag.version = Some(String::from_utf8_lossy(&out.stdout).trim().to_string());
                diag.ok = true;
            }
            Ok(Ok(out)) => {
                diag.error = Some(format!(
                    "exited with {}: {}",
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                ));
            }
            Ok(Err(e)) => diag.error = Some(format!("spawn failed: {e}")),
            Err(_) => diag.error = Some("timed out after 30s".to_string()),
        }
        diag
    }

    async fn run_one(&self, item: &WorkItem) -> Result<()> {
        info!("running lighthouse for {}", item.raw_url);
        let mut cmd = Command::new(&self.program);
        cmd.args(self.command_args(item));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        for (k, v) in &self.cfg.audit.env {
            cmd.env(k, v);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("spawning {} for {}", self.program.display(), item.raw_url))?;

        let output = if self.cfg.audit.timeout_seconds > 0 {
            let limit = Duration::from_secs(self.cfg.audit.timeout_seconds);
            match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(out) => out,
                Err(_) => {
                    warn!("lighthouse timed out after {:?} for {}", limit, item.raw_url);
                    return Err(anyhow!(
                        "lighthouse exceeded timeout ({:?}) for {}",
                        limit,
                        item.raw_url
                    ));
                }
            }
        } else {
            child.wait_with_output().await
        }
        .with_context(|| format!("waiting for lighthouse: {}", item.raw_url))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            warn!("lighthouse failed for {} ({})", item.raw_url, output.status);
            return Err(anyhow!(
                "lighthouse exited with {} for {}\n{}",
                output.status,
                item.raw_url,
                tail(&stderr, STDERR_TAIL_BYTES)
            ));
        }
        if self.cfg.debug.keep_tool_stderr && !stderr.trim().is_empty() {
            debug!("lighthouse stderr {}: {}", item.raw_url, stderr.trim());
        }

        let wait = Duration::from_millis(self.cfg.audit.output_wait_ms);
        let bytes = self.store.confirm_written(&item.file_key, wait).await?;
        info!("completed lighthouse for {} ({} bytes)", item.raw_url, bytes);
        Ok(())
    }
}

impl Auditor for LighthouseRunner {
    fn audit(&self, item: &WorkItem) -> impl Future<Output = Result<()>> + Send {
        self.run_one(item)
    }
}

fn resolve_config_path(cfg: &Config) -> Result<PathBuf> {
    let user = cfg.audit.config_path.trim();
    if !user.is_empty() {
        let path = expand_tilde(user);
        if !path.exists() {
            return Err(anyhow!("audit.config_path does not exist: {}", path.display()));
        }
        return Ok(path);
    }

    cfg.validate()?;
    let work_dir = PathBuf::from(&cfg.paths.work_dir);
    ensure_dir(&work_dir)?;
    let path = work_dir.join(GENERATED_CONFIG);
    let file = LighthouseConfigFile::from_settings(&cfg.lighthouse)?;
    crate::util::write_pretty_json(&path, &file)?;
    debug!("wrote lighthouse config {}", path.display());
    Ok(path)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn tail(s: &str, max: usize) -> &str {
    let s = s.trim_end();
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
