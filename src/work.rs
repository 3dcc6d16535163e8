use crate::util::sha256_hex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::{debug, warn};

static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+:|)//").expect("scheme regex"));

/// One URL to audit, plus the name its report is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub raw_url: String,
    pub file_key: String,
}

impl WorkItem {
    pub fn new(raw_url: impl Into<String>) -> Self {
        let raw_url = raw_url.into();
        let file_key = file_key(&raw_url);
        Self { raw_url, file_key }
    }
}

/// Strips the scheme and flattens the rest of the URL into a single file name.
pub fn file_key(raw_url: &str) -> String {
    let stripped = SCHEME.replace(raw_url.trim(), "");
    stripped
        .chars()
        .map(|c| match c {
            '/' => '-',
            '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Builds the run's work list: blank and duplicate URLs dropped, optional cap applied,
/// colliding file keys made unique.
pub fn build_work_items(urls: impl IntoIterator<Item = String>, max_urls: usize) -> Vec<WorkItem> {
    let mut seen_urls = HashSet::new();
    let mut keys: HashMap<String, String> = HashMap::new();
    let mut items = Vec::new();

    for url in urls {
        let url = url.trim().to_string();
        if url.is_empty() || !seen_urls.insert(url.clone()) {
            continue;
        }
        if max_urls > 0 && items.len() >= max_urls {
            debug!("max_urls={max_urls} reached; dropping remaining urls");
            break;
        }

        let mut item = WorkItem::new(url);
        if let Some(owner) = keys.get(&item.file_key) {
            let suffix = &sha256_hex(item.raw_url.as_bytes())[..8];
            warn!(
                "file key collision: {} and {} both map to {}; using suffix {suffix}",
                owner, item.raw_url, item.file_key
            );
            item.file_key = format!("{}-{suffix}", item.file_key);
        }
        keys.insert(item.file_key.clone(), item.raw_url.clone());
        items.push(item);
    }

    items
}

/// A contiguous slice of the work list handed to one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    pub id: usize,
    /// Offset of the first item in the work list.
    pub start: usize,
    pub items: Vec<WorkItem>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The batches a run would produce, in dispatch order.
pub fn plan_batches(items: &[WorkItem], batch_size: usize) -> Vec<Batch> {
    items
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(id, chunk)| Batch {
            id,
            start: id * batch_size.max(1),
            items: chunk.to_vec(),
        })
        .collect()
}
