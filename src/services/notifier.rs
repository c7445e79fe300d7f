use crate::error::{AotwError, Result};
use crate::services::traits::Notifier;
use async_trait::async_trait;
use serde_json::json;

/// Prints messages instead of sending them. Used in the test environment.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn id(&self) -> &'static str {
        "console"
    }

    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        println!("**MOCK EMAIL**");
        println!("Recipients: {}", recipients.join(", "));
        println!("Subject: {subject}");
        println!("\n{body}\n");
        Ok(())
    }
}

/// Hands messages to a mail relay over HTTP as a JSON document.
pub struct WebhookNotifier {
    endpoint: String,
    sender: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            sender: sender.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn id(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        if recipients.is_empty() {
            return Err(AotwError::Delivery("no recipients".to_owned()));
        }

        let payload = json!({
            "from": self.sender,
            "to": recipients,
            "subject": subject,
            "body": body,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AotwError::Delivery(format!("mail relay unreachable: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AotwError::Delivery(format!(
                "mail relay returned {status}: {text}"
            )));
        }
        Ok(())
    }
}
