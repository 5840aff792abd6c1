//! Incoming-webhook notifier (Slack block-kit payloads).

use super::{templates, Notification, NotificationError, Notifier};
use crate::config::DispatcherConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook_url: Option<String>,
    environment: String,
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("configured", &self.is_configured())
            .field("environment", &self.environment)
            .finish()
    }
}

impl WebhookNotifier {
    /// An unset or empty `webhook_url` produces a notifier that drops every message
    pub fn new(
        webhook_url: Option<String>,
        timeout: Duration,
        environment: impl Into<String>,
    ) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Client(e.to_string()))?;

        Ok(Self {
            client,
            webhook_url: webhook_url.filter(|url| !url.is_empty()),
            environment: environment.into(),
        })
    }

    pub fn from_config(config: &DispatcherConfig) -> Result<Self, NotificationError> {
        Self::new(
            config.notifications.webhook_url.clone(),
            config.notifications.timeout(),
            config.environment.clone(),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let Some(url) = self.webhook_url.as_deref() else {
            debug!(
                service = %notification.service,
                kind = %notification.kind,
                "Webhook not configured, skipping notification"
            );
            return Ok(());
        };

        let payload = if notification.environment.is_empty() {
            templates::render(&notification.clone().with_environment(self.environment.clone()))
        } else {
            templates::render(notification)
        };

        debug!(
            service = %notification.service,
            kind = %notification.kind,
            state = %notification.state_name,
            "Sending notification"
        );

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send notification");
                NotificationError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(status = status.as_u16(), "Webhook returned error status");
            return Err(NotificationError::Status {
                status: status.as_u16(),
            });
        }

        info!(
            service = %notification.service,
            kind = %notification.kind,
            "📣 NOTIFY: Notification sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationKind;
    use mockito::{Matcher, Server};

    fn notifier(url: Option<String>) -> WebhookNotifier {
        WebhookNotifier::new(url, Duration::from_secs(10), "dev").unwrap()
    }

    #[tokio::test]
    async fn test_posts_rendered_payload() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/hooks/deploys")
            .match_header("content-type", "application/json")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("Deployment Successful".to_string()),
                Matcher::Regex(r"\*Environment:\* dev".to_string()),
            ]))
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let notifier = notifier(Some(format!("{}/hooks/deploys", server.url())));
        let notification = Notification::deployment_succeeded(
            "acme_worker",
            Some("ecs-svc/1".to_string()),
            None,
        );
        notifier.send(&notification).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_explicit_environment_is_kept() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r"\*Environment:\* prod".to_string()))
            .with_status(200)
            .create_async()
            .await;

        let notifier = notifier(Some(server.url()));
        let notification = Notification::new(NotificationKind::Info, "acme_api", "SERVICE_SCALING")
            .with_environment("prod");
        notifier.send(&notification).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(500)
            .with_body("invalid_payload")
            .create_async()
            .await;

        let notifier = notifier(Some(server.url()));
        let err = notifier
            .send(&Notification::deployment_failed("acme_worker", "boom"))
            .await
            .unwrap_err();
        assert_eq!(err, NotificationError::Status { status: 500 });

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_transport_error() {
        // Port 9 (discard) on localhost is not expected to accept connections.
        let notifier = WebhookNotifier::new(
            Some("http://127.0.0.1:9/hook".to_string()),
            Duration::from_secs(2),
            "dev",
        )
        .unwrap();
        let err = notifier
            .send(&Notification::deployment_initiating("acme_worker", "test"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::Transport(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_webhook_is_a_no_op() {
        let notifier = notifier(Some(String::new()));
        assert!(!notifier.is_configured());
        notifier
            .send(&Notification::deployment_initiating("acme_worker", "test"))
            .await
            .unwrap();
    }
}
