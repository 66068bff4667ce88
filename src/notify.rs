//! Run notifications
//!
//! Notification failure never fails a run; callers log the error.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::summary::RunSummary;

/// Errors for notification delivery
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Receives the outcome of a run.
pub trait Notifier {
    fn notify(&self, summary: &RunSummary) -> Result<(), NotifyError>;
}

/// Notifier that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _summary: &RunSummary) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    title: String,
    text: String,
    summary: &'a RunSummary,
}

/// Posts the run summary as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, summary: &RunSummary) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            title: format!("qxgen: {}", summary.status.as_str()),
            text: summary.to_human(),
            summary,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let resp = client.post(&self.url).json(&payload).send()?.error_for_status()?;
        debug!(status = %resp.status(), "webhook response");
        info!("run notification sent");
        Ok(())
    }
}
