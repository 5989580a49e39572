use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use serde_derive::Serialize;

use crate::config::NotifyConfig;
use crate::dispatch::Notifier;

#[derive(Debug, Serialize, PartialEq)]
struct WebhookPayload<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
}

/// Posts messages to a chat webhook (Slack-compatible payload).
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    channel: Option<String>,
    username: Option<String>,
}

impl WebhookNotifier {
    /// Returns `None` when no webhook is configured.
    pub fn from_config(
        config: &NotifyConfig,
        timeout: Duration,
    ) -> reqwest::Result<Option<Self>> {
        let Some(url) = config.webhook_url.clone() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Some(WebhookNotifier {
            client,
            url,
            channel: config.channel.clone(),
            username: config.username.clone(),
        }))
    }

    fn payload<'a>(&'a self, message: &'a str) -> WebhookPayload<'a> {
        WebhookPayload {
            text: message,
            channel: self.channel.as_deref(),
            username: self.username.as_deref(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) -> anyhow::Result<()> {
        let payload = self.payload(message);
        debug!("Webhook payload: {:?}", payload);
        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Used when no notification transport is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> anyhow::Result<()> {
        info!("{}", message);
        Ok(())
    }
}
