#![allow(dead_code)]

use anyhow::{bail, Result};
use serde_json::json;
use sitemap_audit::{runner::Auditor, store::Report, store::ReportStore, work::WorkItem};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A Lighthouse-shaped report with performance and SEO categories.
pub fn report(perf: Option<f64>, seo: Option<f64>) -> Report {
    serde_json::from_value(json!({
        "categories": {
            "performance": {
                "id": "performance",
                "title": "Performance",
                "score": perf,
                "auditRefs": [
                    {"id": "first-contentful-paint", "weight": 10},
                    {"id": "largest-contentful-paint", "weight": 25},
                    {"id": "network-requests", "weight": 0}
                ]
            },
            "seo": {
                "id": "seo",
                "title": "SEO",
                "score": seo,
                "auditRefs": [
                    {"id": "document-title", "weight": 1}
                ]
            }
        },
        "audits": {
            "first-contentful-paint": {"score": 0.876},
            "largest-contentful-paint": {"score": null},
            "network-requests": {"score": null},
            "document-title": {"score": 1}
        }
    }))
    .expect("valid report")
}

pub fn runtime_error_report(message: &str) -> Report {
    serde_json::from_value(json!({
        "categories": {},
        "audits": {},
        "runtimeError": {"code": "NO_FCP", "message": message}
    }))
    .expect("valid report")
}

pub fn items(urls: &[&str]) -> Vec<WorkItem> {
    urls.iter().map(|u| WorkItem::new(*u)).collect()
}

/// Writes a report for every URL unless it contains `fail` (error) or `panic`.
pub struct FakeAuditor {
    pub store: ReportStore,
    pub calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    pub delay: Duration,
}

impl FakeAuditor {
    pub fn new(store: ReportStore) -> Self {
        Self {
            store,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay: Duration::from_millis(20),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Auditor for FakeAuditor {
    fn audit(&self, item: &WorkItem) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.calls.lock().unwrap().push(item.raw_url.clone());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if item.raw_url.contains("panic") {
                panic!("auditor blew up on {}", item.raw_url);
            }
            if item.raw_url.contains("fail") {
                bail!("lighthouse exited with exit status: 1");
            }
            self.store.write(&item.file_key, &report(Some(0.9), Some(0.8)))?;
            Ok(())
        }
    }
}
