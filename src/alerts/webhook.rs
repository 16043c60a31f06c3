//! Webhook delivery: alerts are POSTed as JSON from a background worker.

use super::{AlertSeverity, AlertSink, FraudAlert};
use crate::config::AlertsConfig;
use crate::error::AlertError;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Queues alerts for a worker thread that owns the HTTP client, so scoring never waits on
/// the network. When the queue is full new alerts are dropped with a warning.
pub struct WebhookAlerter {
    min_severity: AlertSeverity,
    queue: SyncSender<FraudAlert>,
}

impl WebhookAlerter {
    pub fn spawn(config: &AlertsConfig) -> Result<Self, AlertError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Self::start(config, client)
    }

    /// Start delivery with a prepared client.
    pub fn start(config: &AlertsConfig, client: reqwest::blocking::Client) -> Result<Self, AlertError> {
        let url = config.webhook_url.clone().ok_or(AlertError::MissingUrl)?;
        let (queue, pending) = mpsc::sync_channel(config.queue_capacity.max(1));
        std::thread::Builder::new()
            .name("alert-webhook".into())
            .spawn(move || deliver(client, url, pending))?;
        info!(min_severity = config.min_severity.as_str(), "alert webhook enabled");
        Ok(Self {
            min_severity: config.min_severity,
            queue,
        })
    }

    pub fn accepts(&self, alert: &FraudAlert) -> bool {
        alert.severity >= self.min_severity
    }
}

impl AlertSink for WebhookAlerter {
    fn notify(&self, alert: &FraudAlert) {
        if !self.accepts(alert) {
            return;
        }
        match self.queue.try_send(alert.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!(transaction_id = %dropped.transaction_id, "alert queue full, alert dropped")
            }
            Err(TrySendError::Disconnected(dropped)) => {
                error!(transaction_id = %dropped.transaction_id, "alert worker stopped, alert dropped")
            }
        }
    }
}

/// Runs until every sender is dropped.
fn deliver(client: reqwest::blocking::Client, url: String, pending: Receiver<FraudAlert>) {
    for alert in pending {
        match post(&client, &url, &alert) {
            Ok(()) => debug!(transaction_id = %alert.transaction_id, "alert delivered"),
            Err(e) => warn!(transaction_id = %alert.transaction_id, error = %e, "alert delivery failed"),
        }
    }
}

fn post(client: &reqwest::blocking::Client, url: &str, alert: &FraudAlert) -> Result<(), String> {
    let res = client.post(url).json(alert).send().map_err(|e| e.to_string())?;
    if !res.status().is_success() {
        let status = res.status();
        let text = res.text().unwrap_or_default();
        return Err(format!("{} {}", status, text));
    }
    Ok(())
}
