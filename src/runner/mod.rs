pub mod lighthouse;
pub mod types;

use crate::work::WorkItem;
use anyhow::Result;
use std::future::Future;

pub use lighthouse::LighthouseRunner;
pub use types::{LighthouseConfigFile, ToolDiag};

/// Audits a single URL. On `Ok` the item's report is in the report store.
pub trait Auditor: Send + Sync + 'static {
    fn audit(&self, item: &WorkItem) -> impl Future<Output = Result<()>> + Send;
}
