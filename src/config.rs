use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub sitemap: Sitemap,
    #[serde(default)]
    pub audit: Audit,
    #[serde(default)]
    pub lighthouse: Lighthouse,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects settings a run cannot work with. The work dir must not be a directory that
    /// gets cleaned, or the generated Lighthouse config would be deleted before use.
    pub fn validate(&self) -> Result<()> {
        let work = lexical(&self.paths.work_dir);
        for (name, dir) in [
            ("paths.reports_dir", &self.paths.reports_dir),
            ("paths.summary_dir", &self.paths.summary_dir),
        ] {
            if lexical(dir) == work {
                bail!("paths.work_dir must differ from {name} ({dir})");
            }
        }
        if self.global.workers == 0 {
            bail!("global.workers must be at least 1");
        }
        if self.global.batch_size == 0 {
            bail!("global.batch_size must be at least 1");
        }
        Ok(())
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }

    /// Sitemap URL from the config file, falling back to `SITEMAP_URL`.
    pub fn sitemap_url(&self) -> Option<String> {
        if !self.sitemap.url.trim().is_empty() {
            return Some(self.sitemap.url.trim().to_string());
        }
        std::env::var("SITEMAP_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

fn lexical(dir: &str) -> PathBuf {
    Path::new(dir.trim())
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Global {
    pub workers: usize,
    pub batch_size: usize,
    pub clean_before_run: bool,
    pub print_summary: bool,
    pub write_run_index: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            workers: 4,
            batch_size: 3,
            clean_before_run: true,
            print_summary: true,
            write_run_index: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub reports_dir: String,
    pub summary_dir: String,
    pub work_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            reports_dir: "reports".into(),
            summary_dir: "summary".into(),
            work_dir: ".sitemap-audit-work".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Sitemap {
    pub url: String,
    pub timeout_seconds: u64,
    /// 0 keeps every URL of the sitemap.
    pub max_urls: usize,
    pub user_agent: String,
}
impl Default for Sitemap {
    fn default() -> Self {
        Self {
            url: "".into(),
            timeout_seconds: 30,
            max_urls: 0,
            user_agent: concat!("sitemap-audit/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Audit {
    pub command: String,
    /// Empty means a config is rendered from `[lighthouse]` into `paths.work_dir`.
    pub config_path: String,
    pub chrome_flags: String,
    pub extra_args: Vec<String>,
    pub timeout_seconds: u64,
    pub output_wait_ms: u64,
    pub env: BTreeMap<String, String>,
}
impl Default for Audit {
    fn default() -> Self {
        Self {
            command: "lighthouse".into(),
            config_path: "".into(),
            chrome_flags: "--headless".into(),
            extra_args: Vec::new(),
            timeout_seconds: 0,
            output_wait_ms: 2000,
            env: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Lighthouse {
    pub extends: String,
    pub output: String,
    pub throttling_method: String,
    /// `mobile_modern`, `default_mobile` or `custom` (reads `throttling`).
    pub throttling_profile: String,
    pub throttling: Throttling,
    pub only_categories: Vec<String>,
    pub skip_audits: Vec<String>,
    pub disable_full_page_screenshot: bool,
    pub save_assets: bool,
}
impl Default for Lighthouse {
    fn default() -> Self {
        Self {
            extends: "lighthouse:default".into(),
            output: "json".into(),
            throttling_method: "simulate".into(),
            throttling_profile: "mobile_modern".into(),
            throttling: Throttling::mobile_modern(),
            only_categories: vec![
                "performance".into(),
                "seo".into(),
                "accessibility".into(),
                "best-practices".into(),
            ],
            skip_audits: vec![
                "screenshot-thumbnails".into(),
                "final-screenshot".into(),
                "full-page-screenshot".into(),
                "color-contrast".into(),
            ],
            disable_full_page_screenshot: true,
            save_assets: false,
        }
    }
}

impl Lighthouse {
    pub fn resolved_throttling(&self) -> Result<Throttling> {
        match self.throttling_profile.as_str() {
            "mobile_modern" => Ok(Throttling::mobile_modern()),
            "default_mobile" => Ok(Throttling::default_mobile()),
            "custom" => Ok(self.throttling.clone()),
            other => anyhow::bail!("unknown lighthouse.throttling_profile: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Throttling {
    pub rtt_ms: f64,
    pub throughput_kbps: f64,
    pub request_latency_ms: f64,
    pub download_throughput_kbps: f64,
    pub upload_throughput_kbps: f64,
    pub cpu_slowdown_multiplier: f64,
}
impl Default for Throttling {
    fn default() -> Self {
        Self::mobile_modern()
    }
}

impl Throttling {
    /// Mid-tier mobile device; what Lighthouse itself applies by default.
    pub fn default_mobile() -> Self {
        Self {
            rtt_ms: 150.0,
            throughput_kbps: 1638.4,
            request_latency_ms: 562.5,
            download_throughput_kbps: 1474.56,
            upload_throughput_kbps: 675.0,
            cpu_slowdown_multiplier: 4.0,
        }
    }

    /// Recent phone on a 5G network.
    pub fn mobile_modern() -> Self {
        Self {
            rtt_ms: 20.0,
            throughput_kbps: 100_000.0,
            request_latency_ms: 30.0,
            download_throughput_kbps: 95_000.0,
            upload_throughput_kbps: 30_000.0,
            cpu_slowdown_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub summary_filename: String,
    pub index_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            summary_filename: "summary.json".into(),
            index_filename: "run.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Debug {
    pub keep_tool_stderr: bool,
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_tool_stderr: false,
            dump_effective_config: true,
        }
    }
}
