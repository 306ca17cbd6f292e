use async_trait::async_trait;
use tracing::info;

use crate::error::NotificationError;
use crate::stores::{ApprovalEvent, NotificationSink};

/// Notification sink posting approval events to a webhook.
///
/// The event is sent as a JSON body. Any 2xx answer counts as delivered and
/// the response body is never read.
pub struct WebhookNotificationSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotificationSink {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn notify(&self, event: &ApprovalEvent) -> Result<(), NotificationError> {
        info!(
            "Posting {} event for invoice {} to {}",
            event.event, event.invoice_number, self.url
        );

        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| NotificationError::Delivery(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected(status.as_u16()));
        }

        info!("Notification for invoice {} accepted ({})", event.invoice_number, status);
        Ok(())
    }
}

/// Sink used when no webhook is configured. Logs the event and succeeds.
pub struct DisabledNotificationSink;

#[async_trait]
impl NotificationSink for DisabledNotificationSink {
    async fn notify(&self, event: &ApprovalEvent) -> Result<(), NotificationError> {
        info!(
            "Notifications disabled, skipping {} event for invoice {}",
            event.event, event.invoice_number
        );
        Ok(())
    }
}
