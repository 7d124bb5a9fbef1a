use anyhow::Context;
use async_trait::async_trait;
use log::warn;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::core::result_aggregator::ScanReport;

/// Best-effort delivery of a scan summary.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str, attachment: Option<&Path>) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookKind {
    Discord,
    Slack,
    Generic,
}

impl WebhookKind {
    pub fn detect(url: &str) -> Self {
        if url.contains("discord.com/api/webhooks") {
            WebhookKind::Discord
        } else if url.contains("hooks.slack.com") {
            WebhookKind::Slack
        } else {
            WebhookKind::Generic
        }
    }
}

/// Posts to a Discord, Slack or generic JSON webhook.
///
/// Discord and generic endpoints get the attachment as a multipart file part.
/// Slack incoming webhooks take no files, so only the path is mentioned.
pub struct WebhookNotifier {
    url: String,
    kind: WebhookKind,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("building webhook client")?;
        Ok(Self {
            url: url.to_string(),
            kind: WebhookKind::detect(url),
            client,
        })
    }

    pub fn kind(&self) -> WebhookKind {
        self.kind
    }

    fn payload(&self, message: &str, attachment: Option<&Path>) -> Value {
        match self.kind {
            WebhookKind::Discord => serde_json::json!({
                "embeds": [{
                    "title": "webprobe scan finished",
                    "description": message,
                    "color": 15158332,
                    "footer": { "text": "webprobe" }
                }]
            }),
            WebhookKind::Slack => {
                let text = match attachment {
                    Some(path) => format!("{}\nReport: `{}`", message, path.display()),
                    None => message.to_string(),
                };
                serde_json::json!({ "text": text })
            }
            WebhookKind::Generic => serde_json::json!({
                "event": "scan_finished",
                "message": message,
            }),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str, attachment: Option<&Path>) -> anyhow::Result<()> {
        let payload = self.payload(message, attachment);

        let request = match attachment {
            Some(path) if self.kind != WebhookKind::Slack => {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("reading attachment {}", path.display()))?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "report".to_string());
                let form = Form::new()
                    .text("payload_json", payload.to_string())
                    .part("files[0]", Part::bytes(bytes).file_name(file_name));
                self.client.post(&self.url).multipart(form)
            }
            _ => self.client.post(&self.url).json(&payload),
        };

        request
            .send()
            .await
            .context("sending webhook")?
            .error_for_status()
            .context("webhook rejected the notification")?;
        Ok(())
    }
}

/// Short human summary of a finished scan.
pub fn notification_message(report: &ScanReport) -> String {
    let mut message = format!(
        "Scan of {} finished: {} finding(s) across {} page(s)",
        report.target,
        report.findings.len(),
        report.pages_visited
    );
    if !report.errors.is_empty() {
        message.push_str(&format!(", {} URL(s) failed", report.errors.len()));
    }
    if report.aborted {
        message.push_str(" (aborted)");
    }
    message
}

/// Sends the summary; failures are logged and reported as `false`.
pub async fn notify_report(notifier: &dyn Notifier, report: &ScanReport, attachment: Option<&Path>) -> bool {
    match notifier.notify(&notification_message(report), attachment).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Notification failed: {:#}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn report() -> ScanReport {
        let now = Utc::now();
        ScanReport {
            target: "http://example.com/".to_string(),
            findings: Vec::new(),
            errors: Vec::new(),
            pages_visited: 3,
            aborted: true,
            started_at: now,
            finished_at: now,
            narrative: None,
        }
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(WebhookKind::detect("https://discord.com/api/webhooks/1/abc"), WebhookKind::Discord);
        assert_eq!(WebhookKind::detect("https://hooks.slack.com/services/T/B/X"), WebhookKind::Slack);
        assert_eq!(WebhookKind::detect("https://example.com/hook"), WebhookKind::Generic);
    }

    #[test]
    fn test_message() {
        let msg = notification_message(&report());
        assert_eq!(msg, "Scan of http://example.com/ finished: 0 finding(s) across 3 page(s) (aborted)");
    }

    #[tokio::test]
    async fn test_generic_webhook_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({ "event": "scan_finished" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(&format!("{}/hook", server.uri())).unwrap();
        assert!(notify_report(&notifier, &report(), None).await);
    }

    #[tokio::test]
    async fn test_rejected_webhook_is_isolated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(&server.uri()).unwrap();
        assert!(!notify_report(&notifier, &report(), None).await);
    }

    #[tokio::test]
    async fn test_missing_attachment_is_error() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook").unwrap();
        let result = notifier
            .notify("done", Some(Path::new("/nonexistent/report.html")))
            .await;
        assert!(result.is_err());
    }
}
