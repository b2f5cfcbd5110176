use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use sentinel_core::{HttpClient, HttpRequest};
use serde_json::json;
use tracing::info;

use crate::effects::{RunReport, SideChannel};

pub fn alert_text(severity: &str, message: &str) -> String {
    format!(":rotating_light: Release Sentinel Alert\n*Severity:* {severity}\n*Message:* {message}")
}

/// Posts `{"text": ...}` to a chat webhook for every run that carries a
/// severity. Without a webhook it does nothing.
pub struct WebhookAlertSink {
    http: Arc<dyn HttpClient>,
    webhook: Option<String>,
    timeout: Duration,
}

impl WebhookAlertSink {
    pub fn new(http: Arc<dyn HttpClient>, webhook: Option<String>, timeout: Duration) -> Self {
        Self { http, webhook, timeout }
    }
}

impl SideChannel for WebhookAlertSink {
    fn name(&self) -> &str {
        "alert"
    }

    fn emit(&self, report: &RunReport) -> Result<()> {
        let Some(severity) = report.severity else {
            return Ok(());
        };
        let Some(webhook) = &self.webhook else {
            info!(severity, "no alert webhook configured; alert skipped");
            return Ok(());
        };

        let payload = json!({ "text": alert_text(severity, &report.message) });
        let request = HttpRequest::post_json(webhook, payload.to_string(), self.timeout);
        let response = self.http.send(&request)?;
        if !response.is_success() {
            bail!("webhook answered {}", response.status);
        }
        info!(severity, "alert sent");
        Ok(())
    }
}
