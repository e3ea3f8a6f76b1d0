//! Slack webhook notifications.
//!
//! Lifecycle and placement announcements for operators watching a channel.
//! Delivery is best-effort: a failed webhook is logged and never interferes
//! with distribution.

use serde_json::json;
use tracing::warn;

pub struct SlackNotifier {
    webhook_url: String,
    username: String,
    format: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    /// `format` is a message template; `{message}` is replaced with the text
    /// being announced.
    pub fn new(webhook_url: String, username: String, format: String) -> Self {
        Self {
            webhook_url,
            username,
            format,
            client: reqwest::Client::new(),
        }
    }

    pub async fn send(&self, message: &str) {
        let text = self.format.replace("{message}", message);
        let payload = json!({ "username": self.username, "text": text });
        match self.client.post(&self.webhook_url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(status = %response.status(), "slack webhook rejected notification")
            }
            Err(err) => warn!(error = %err, "slack notification failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_send_applies_template() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/hook")
                .json_body(json!({ "username": "distributr", "text": "[deluge] 3 torrents placed" }));
            then.status(200);
        });

        let notifier = SlackNotifier::new(
            server.url("/hook"),
            "distributr".to_string(),
            "[deluge] {message}".to_string(),
        );
        notifier.send("3 torrents placed").await;
        mock.assert();
    }

    #[tokio::test]
    async fn test_send_swallows_delivery_failure() {
        let notifier = SlackNotifier::new(
            "http://127.0.0.1:1/hook".to_string(),
            "distributr".to_string(),
            "{message}".to_string(),
        );
        // Must not panic or error.
        notifier.send("unreachable webhook").await;
    }
}
