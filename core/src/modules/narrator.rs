use async_trait::async_trait;
use log::warn;
use std::time::Duration;

use crate::core::result_aggregator::{findings_as_text, ScanReport};

/// Turns a plain-text scan summary into advisory prose.
///
/// Output is opaque text attached to the report. It never drives crawl or
/// probe decisions.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn summarize(&self, findings_text: &str) -> anyhow::Result<String>;
}

/// Used when no narrator is configured.
pub struct DisabledNarrator;

#[async_trait]
impl Narrator for DisabledNarrator {
    async fn summarize(&self, _findings_text: &str) -> anyhow::Result<String> {
        anyhow::bail!("narration is disabled")
    }
}

/// Runs `narrator` over the report summary under `limit`. Failure, timeout
/// and empty output all yield `None`.
pub async fn narrate(report: &ScanReport, narrator: &dyn Narrator, limit: Duration) -> Option<String> {
    let text = findings_as_text(report);
    match tokio::time::timeout(limit, narrator.summarize(&text)).await {
        Ok(Ok(narrative)) if !narrative.trim().is_empty() => Some(narrative),
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            warn!("Narrator failed: {:#}", e);
            None
        }
        Err(_) => {
            warn!("Narrator timed out after {:?}", limit);
            None
        }
    }
}
