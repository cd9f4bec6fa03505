use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use vigil::{NotificationGateway, NotifyError};

use crate::config::MailCredentials;

const RELAY_TIMEOUT: Duration = Duration::from_secs(15);

/// Message body accepted by the mail relay
#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Sends email through an HTTP mail relay
///
/// Without credentials every send fails with [`NotifyError::Unconfigured`].
pub struct MailRelayGateway {
    client: Client,
    credentials: Option<MailCredentials>,
}

impl MailRelayGateway {
    pub fn new(credentials: Option<MailCredentials>) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(RELAY_TIMEOUT).build()?;
        Ok(Self { client, credentials })
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }
}

#[async_trait]
impl NotificationGateway for MailRelayGateway {
    async fn send(&self, destination: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let Some(credentials) = &self.credentials else {
            return Err(NotifyError::Unconfigured);
        };

        let message = RelayMessage { from: &credentials.sender, to: destination, subject, text: body };

        let response = self
            .client
            .post(&credentials.endpoint)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Delivery(format!("Mail relay returned {}: {}", status, error_body.trim())));
        }

        debug!(destination, subject, "Notification handed to mail relay");
        Ok(())
    }
}
