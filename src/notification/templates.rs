//! Chat webhook payloads.
//!
//! Three layouts: success, error, and info. Warnings use the info layout.

use super::{Notification, NotificationKind};
use serde_json::{json, Value};

/// Render `notification` as a block-kit payload
pub fn render(notification: &Notification) -> Value {
    let mut blocks = vec![header_block(notification)];

    match notification.kind {
        NotificationKind::Success => {
            blocks.extend(notification.deployment_id.as_deref().map(|id| {
                context_block(&format!("Deployment ID: {id}"))
            }));
            blocks.extend(
                notification
                    .revision
                    .as_deref()
                    .map(|revision| context_block(&format!("Task Definition: {revision}"))),
            );
        }
        NotificationKind::Error => {
            if !notification.reason.is_empty() {
                blocks.push(section_block(&format!("*Reason:* {}", notification.reason)));
            }
            blocks.extend(notification.deployment_id.as_deref().map(|id| {
                context_block(&format!("Deployment ID: {id}"))
            }));
        }
        NotificationKind::Info | NotificationKind::Warning => {
            if !notification.reason.is_empty() {
                blocks.push(section_block(&notification.reason));
            }
        }
    }

    json!({ "blocks": blocks })
}

fn header_block(notification: &Notification) -> Value {
    let title = match notification.kind {
        NotificationKind::Success => ":white_check_mark: *Deployment Successful*",
        NotificationKind::Error => ":x: *Deployment Failed*",
        NotificationKind::Info | NotificationKind::Warning => {
            ":information_source: *Deployment Update*"
        }
    };
    section_block(&format!(
        "{title}\n*Environment:* {}\n*Service:* {}\n*Status:* {}",
        notification.environment, notification.service, notification.state_name
    ))
}

fn section_block(text: &str) -> Value {
    json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": text }
    })
}

fn context_block(text: &str) -> Value {
    json!({
        "type": "context",
        "elements": [{ "type": "mrkdwn", "text": text }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(block: &Value) -> String {
        block["text"]["text"]
            .as_str()
            .or_else(|| block["elements"][0]["text"].as_str())
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn test_success_payload_includes_deployment_and_revision() {
        let notification = Notification::deployment_succeeded(
            "acme_worker",
            Some("ecs-svc/42".to_string()),
            Some("acme_worker_dev:7".to_string()),
        )
        .with_environment("dev");

        let payload = render(&notification);
        let blocks = payload["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 3);
        let header = text_of(&blocks[0]);
        assert!(header.contains("Deployment Successful"));
        assert!(header.contains("*Environment:* dev"));
        assert!(header.contains("*Service:* acme_worker"));
        assert_eq!(text_of(&blocks[1]), "Deployment ID: ecs-svc/42");
        assert_eq!(text_of(&blocks[2]), "Task Definition: acme_worker_dev:7");
    }

    #[test]
    fn test_error_payload_includes_reason() {
        let notification =
            Notification::deployment_failed("acme_worker", "Failed after 3 attempts: throttled");
        let payload = render(&notification);
        let blocks = payload["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(text_of(&blocks[0]).contains("Deployment Failed"));
        assert_eq!(
            text_of(&blocks[1]),
            "*Reason:* Failed after 3 attempts: throttled"
        );
    }

    #[test]
    fn test_warning_uses_info_layout() {
        let notification = Notification::new(NotificationKind::Warning, "acme_api", "SERVICE_DRAINING")
            .with_reason("draining tasks");
        let payload = render(&notification);
        let blocks = payload["blocks"].as_array().unwrap();
        assert!(text_of(&blocks[0]).contains("Deployment Update"));
        assert_eq!(text_of(&blocks[1]), "draining tasks");
    }

    #[test]
    fn test_info_without_reason_is_header_only() {
        let notification = Notification::new(NotificationKind::Info, "acme_api", "SERVICE_SCALING");
        assert_eq!(render(&notification)["blocks"].as_array().unwrap().len(), 1);
    }
}
