//! Operator notifications.
//!
//! Best-effort only: a notification never blocks or fails an admission
//! decision. Delivery errors are logged and dropped, there are no retries.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

/// What happened to a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEventKind {
    /// The admission watermark advanced by one quantum.
    PermitAdvanced,
    /// The queue went quiescent and was reset.
    Reset,
}

impl QueueEventKind {
    const fn headline(self) -> &'static str {
        match self {
            Self::PermitAdvanced => "WaitingRoom Additional access granted",
            Self::Reset => "Reset WaitingRoom",
        }
    }
}

/// Snapshot of queue state attached to a notification.
#[derive(Debug, Clone)]
pub struct QueueEvent {
    pub kind: QueueEventKind,
    pub domain: String,
    pub permitted_number: i64,
    pub current_number: i64,
    pub ttl: Duration,
}

/// Sink for queue events.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one event. Implementations log failures; they never return
    /// them.
    async fn notify(&self, event: &QueueEvent);
}

/// Discards every event.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _event: &QueueEvent) {}
}

/// Posts events to a Slack incoming webhook.
pub struct SlackNotifier {
    http: reqwest::Client,
    webhook_url: String,
    channel: String,
}

impl SlackNotifier {
    /// Creates a notifier targeting `webhook_url` / `channel`.
    #[must_use]
    pub fn new(webhook_url: String, channel: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url,
            channel,
        }
    }

    fn payload(&self, event: &QueueEvent) -> serde_json::Value {
        json!({
            "channel": self.channel,
            "blocks": [{
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": format!("*{}*", event.kind.headline()),
                },
                "fields": [
                    { "type": "plain_text", "text": format!("Domain: {}", event.domain) },
                    { "type": "plain_text", "text": format!("CurrentClient: {}", event.current_number) },
                    { "type": "plain_text", "text": format!("PermittedNumber: {}", event.permitted_number) },
                    { "type": "plain_text", "text": format!("TTL: {}", event.ttl.as_secs()) },
                ],
            }],
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, event: &QueueEvent) {
        let result = self
            .http
            .post(&self.webhook_url)
            .json(&self.payload(event))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        if let Err(e) = result {
            tracing::error!(
                domain = %event.domain,
                error = %e,
                "failed to notify slack"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_queue_state() {
        let notifier = SlackNotifier::new(
            "https://hooks.slack.invalid/services/x".to_string(),
            "#ops".to_string(),
        );
        let event = QueueEvent {
            kind: QueueEventKind::PermitAdvanced,
            domain: "ex.com".to_string(),
            permitted_number: 2000,
            current_number: 3500,
            ttl: Duration::from_secs(300),
        };

        let payload = notifier.payload(&event);
        assert_eq!(payload["channel"], "#ops");
        let rendered = payload.to_string();
        assert!(rendered.contains("Additional access granted"));
        assert!(rendered.contains("Domain: ex.com"));
        assert!(rendered.contains("CurrentClient: 3500"));
        assert!(rendered.contains("PermittedNumber: 2000"));
        assert!(rendered.contains("TTL: 300"));
    }

    #[test]
    fn reset_headline() {
        assert_eq!(QueueEventKind::Reset.headline(), "Reset WaitingRoom");
    }
}
