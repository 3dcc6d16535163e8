use crate::config::{Lighthouse, Throttling};
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDiag {
    pub command: String,
    pub version: Option<String>,
    pub config_path: String,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Lighthouse configuration file, as passed through `--config-path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LighthouseConfigFile {
    pub extends: String,
    pub settings: LighthouseSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LighthouseSettings {
    pub output: String,
    pub save_assets: bool,
    pub throttling_method: String,
    pub throttling: ThrottlingSettings,
    pub disable_full_page_screenshot: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub only_categories: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skip_audits: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottlingSettings {
    pub rtt_ms: f64,
    pub throughput_kbps: f64,
    pub request_latency_ms: f64,
    pub download_throughput_kbps: f64,
    pub upload_throughput_kbps: f64,
    pub cpu_slowdown_multiplier: f64,
}

impl From<Throttling> for ThrottlingSettings {
    fn from(t: Throttling) -> Self {
        Self {
            rtt_ms: t.rtt_ms,
            throughput_kbps: t.throughput_kbps,
            request_latency_ms: t.request_latency_ms,
            download_throughput_kbps: t.download_throughput_kbps,
            upload_throughput_kbps: t.upload_throughput_kbps,
            cpu_slowdown_multiplier: t.cpu_slowdown_multiplier,
        }
    }
}

impl LighthouseConfigFile {
    pub fn from_settings(lh: &Lighthouse) -> Result<Self> {
        Ok(Self {
            extends: lh.extends.clone(),
            settings: LighthouseSettings {
                output: lh.output.clone(),
                save_assets: lh.save_assets,
                throttling_method: lh.throttling_method.clone(),
                throttling: lh.resolved_throttling()?.into(),
                disable_full_page_screenshot: lh.disable_full_page_screenshot,
                only_categories: lh.only_categories.clone(),
                skip_audits: lh.skip_audits.clone(),
            },
        })
    }
}
