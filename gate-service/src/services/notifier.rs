//! Operator notifications for new access requests.

use async_trait::async_trait;
use serde_json::json;
use service_core::observability::TracedClientExt;
use std::time::Duration;
use tracing::{info, instrument};

use crate::models::AccessRequest;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_access_request(&self, request: &AccessRequest) -> Result<(), anyhow::Error>;
}

/// Writes the notification to the service log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_access_request(&self, request: &AccessRequest) -> Result<(), anyhow::Error> {
        info!(
            request_id = %request.id,
            user_id = %request.user_id,
            user_email = %request.user_email,
            payment_confirmation = %request.payment_confirmation,
            requested_at = ?request.requested_at,
            "New access request awaiting review"
        );
        Ok(())
    }
}

/// Posts a JSON message to a webhook (chat channel, mail relay).
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, request), fields(request_id = %request.id))]
    async fn notify_access_request(&self, request: &AccessRequest) -> Result<(), anyhow::Error> {
        let body = json!({
            "text": format!(
                "New access request from {} ({})",
                request.user_email, request.user_id
            ),
            "request": request,
        });

        let response = self
            .client
            .traced_post(&self.url)
            .json(&body)
            .timeout(self.timeout)
            .request_id(request.id.to_string())
            .send()
            .await?;

        response.error_for_status()?;
        Ok(())
    }
}
