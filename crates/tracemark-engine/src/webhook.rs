use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracemark_types::events::EngineEvent;

use crate::outbox::NotificationGateway;

/// Posts each event as JSON to the external notification collaborator.
pub struct WebhookGateway {
    client: reqwest::Client,
    url: String,
}

impl WebhookGateway {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build webhook client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationGateway for WebhookGateway {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, event: &EngineEvent) -> Result<()> {
        self.client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .with_context(|| format!("POST {}", self.url))?
            .error_for_status()?;
        Ok(())
    }
}
