//! Activity notifications sent to pin owners.
//!
//! Delivery is handed to an external collaborator over HTTP. Failures are
//! logged and never surface to the request that triggered them.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;

/// Upper bound on a single webhook request.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on how long a request handler waits for any notifier.
pub const DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Like,
    Comment,
}

/// Payload handed to the notifications collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub recipient_email: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub photo_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ActivityEvent {
    pub fn like(recipient_email: impl Into<String>, photo_title: impl Into<String>) -> Self {
        Self {
            recipient_email: recipient_email.into(),
            kind: ActivityKind::Like,
            photo_title: photo_title.into(),
            comment: None,
        }
    }

    pub fn comment(
        recipient_email: impl Into<String>,
        photo_title: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            recipient_email: recipient_email.into(),
            kind: ActivityKind::Comment,
            photo_title: photo_title.into(),
            comment: Some(comment.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to reach notifications service: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Notifications service answered {0}")]
    Rejected(reqwest::StatusCode),
}

#[async_trait]
pub trait ActivityNotifier: Send + Sync {
    async fn notify(&self, event: ActivityEvent) -> Result<(), NotifyError>;
}

/// Posts events as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        Self::with_timeout(url, WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ActivityNotifier for WebhookNotifier {
    async fn notify(&self, event: ActivityEvent) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(&event).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status()));
        }
        Ok(())
    }
}

/// Logs events instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl ActivityNotifier for LogNotifier {
    async fn notify(&self, event: ActivityEvent) -> Result<(), NotifyError> {
        info!(
            recipient = %event.recipient_email,
            kind = ?event.kind,
            photo_title = %event.photo_title,
            "Activity notification (not delivered)"
        );
        Ok(())
    }
}

/// Keeps every event in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<ActivityEvent>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ActivityEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl ActivityNotifier for RecordingNotifier {
    async fn notify(&self, event: ActivityEvent) -> Result<(), NotifyError> {
        self.events.lock().expect("lock poisoned").push(event);
        Ok(())
    }
}

/// Webhook delivery when `NOTIFICATIONS_URL` is set, log-only otherwise.
pub fn notifier_from_config(
    config: &Config,
) -> Result<Arc<dyn ActivityNotifier>, NotifyError> {
    let notifier: Arc<dyn ActivityNotifier> = match config.notifications_url() {
        Some(url) => Arc::new(WebhookNotifier::new(url)?),
        None => Arc::new(LogNotifier),
    };
    Ok(notifier)
}

/// Sends `event`, logging instead of propagating failures.
pub async fn dispatch(notifier: &dyn ActivityNotifier, event: ActivityEvent) {
    dispatch_within(notifier, event, DISPATCH_TIMEOUT).await;
}

/// Like [`dispatch`], giving up once `timeout` has elapsed.
pub async fn dispatch_within(
    notifier: &dyn ActivityNotifier,
    event: ActivityEvent,
    timeout: Duration,
) {
    let kind = event.kind;
    match tokio::time::timeout(timeout, notifier.notify(event)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(?kind, error = %err, "Failed to send activity notification"),
        Err(_) => warn!(?kind, ?timeout, "Activity notification timed out"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingNotifier;

    struct StalledNotifier;

    #[async_trait]
    impl ActivityNotifier for StalledNotifier {
        async fn notify(&self, _event: ActivityEvent) -> Result<(), NotifyError> {
            std::future::pending().await
        }
    }

    #[async_trait]
    impl ActivityNotifier for FailingNotifier {
        async fn notify(&self, _event: ActivityEvent) -> Result<(), NotifyError> {
            Err(NotifyError::Rejected(reqwest::StatusCode::BAD_GATEWAY))
        }
    }

    #[test]
    fn test_event_wire_format() {
        let like = serde_json::to_value(ActivityEvent::like("a@example.com", "Sunset")).unwrap();
        assert_eq!(
            like,
            serde_json::json!({
                "recipientEmail": "a@example.com",
                "type": "like",
                "photoTitle": "Sunset",
            })
        );

        let comment =
            serde_json::to_value(ActivityEvent::comment("a@example.com", "Sunset", "wow")).unwrap();
        assert_eq!(comment["type"], "comment");
        assert_eq!(comment["comment"], "wow");
    }

    #[tokio::test]
    async fn test_recording_notifier_shares_events_between_clones() {
        let notifier = RecordingNotifier::new();
        let handle = notifier.clone();

        dispatch(&notifier, ActivityEvent::like("a@example.com", "x")).await;

        assert_eq!(handle.events().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        dispatch(&FailingNotifier, ActivityEvent::like("a@example.com", "x")).await;
    }

    #[test]
    fn test_notifier_from_config_without_url() {
        let config = Config::new_for_test();
        // Log-only notifier accepts events without network access
        let notifier = notifier_from_config(&config).unwrap();
        let result = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(notifier.notify(ActivityEvent::like("a@example.com", "x")));
        assert!(result.is_ok());
    }

    #[test]
    fn test_webhook_notifier_builds_with_default_timeout() {
        assert!(WebhookNotifier::new("http://127.0.0.1:9/notify").is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_gives_up_on_stalled_notifier() {
        tokio::time::timeout(
            Duration::from_secs(2),
            dispatch_within(
                &StalledNotifier,
                ActivityEvent::like("a@example.com", "x"),
                Duration::from_millis(20),
            ),
        )
        .await
        .expect("dispatch should return after its own timeout");
    }

    #[tokio::test]
    async fn test_webhook_times_out_on_silent_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let notifier =
            WebhookNotifier::with_timeout(format!("http://{addr}/notify"), Duration::from_millis(100))
                .unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            notifier.notify(ActivityEvent::like("a@example.com", "x")),
        )
        .await
        .expect("client timeout should fire first");

        assert!(matches!(result, Err(NotifyError::Transport(ref err)) if err.is_timeout()));
        server.abort();
    }
}
