use crate::config::Sitemap;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{error, info};

static URL_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<url(?:\s[^>]*)?>(.*?)</url>").expect("url regex"));
static LOC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<loc>\s*(.*?)\s*</loc>").expect("loc regex"));

/// Extracts `<urlset><url><loc>` entries in document order.
pub fn parse_sitemap(xml: &str) -> Result<Vec<String>> {
    if xml.contains("<sitemapindex") {
        return Err(anyhow!("sitemap index documents are not supported"));
    }
    if !xml.contains("<urlset") {
        return Err(anyhow!("not a sitemap: missing <urlset>"));
    }

    Ok(URL_ENTRY
        .captures_iter(xml)
        .filter_map(|entry| {
            let body = entry.get(1)?.as_str();
            let loc = LOC.captures(body)?.get(1)?.as_str();
            let loc = decode_text(loc);
            (!loc.is_empty()).then_some(loc)
        })
        .collect())
}

fn decode_text(raw: &str) -> String {
    if let Some(inner) = raw
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
    {
        return inner.trim().to_string();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

pub async fn fetch_sitemap(cfg: &Sitemap, url: &str) -> Result<Vec<String>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_seconds.max(1)))
        .user_agent(cfg.user_agent.clone())
        .build()
        .with_context(|| "building HTTP client")?;
    let body = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url}"))?
        .text()
        .await
        .with_context(|| format!("reading body of {url}"))?;
    parse_sitemap(&body).with_context(|| format!("parsing sitemap {url}"))
}

/// Like [`fetch_sitemap`], but a failure is logged and yields no URLs.
pub async fn sitemap_urls(cfg: &Sitemap, url: &str) -> Vec<String> {
    match fetch_sitemap(cfg, url).await {
        Ok(urls) => {
            info!("sitemap {url} lists {} urls", urls.len());
            urls
        }
        Err(err) => {
            error!("error fetching or parsing the sitemap: {:#}", err);
            Vec::new()
        }
    }
}
