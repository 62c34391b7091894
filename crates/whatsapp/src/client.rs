use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, info};

use vendy_core::config::WhatsAppConfig;

use crate::payload::text_message_body;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("request to the graph api failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("graph api rejected the message: status {status}, body {body}")]
    Api { status: u16, body: String },
}

/// Outbound reply channel. The runtime only ever needs this one operation.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(
        &self,
        phone_number_id: &str,
        to: &str,
        text: &str,
    ) -> Result<(), SendError>;
}

/// Cloud API client. One instance serves every tenant; the tenant's own
/// `phone_number_id` selects the sending number per call.
pub struct WhatsAppClient {
    http: reqwest::Client,
    api_token: SecretString,
    graph_base_url: String,
}

impl WhatsAppClient {
    pub fn new(api_token: SecretString, graph_base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_token,
            graph_base_url: graph_base_url.into(),
        }
    }

    pub fn from_config(config: &WhatsAppConfig) -> Self {
        Self::new(config.api_token.clone(), config.graph_base_url.clone())
    }

    fn endpoint(&self, phone_number_id: &str) -> String {
        format!(
            "{}/{phone_number_id}/messages",
            self.graph_base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl MessageSender for WhatsAppClient {
    async fn send_text(
        &self,
        phone_number_id: &str,
        to: &str,
        text: &str,
    ) -> Result<(), SendError> {
        let response = self
            .http
            .post(self.endpoint(phone_number_id))
            .bearer_auth(self.api_token.expose_secret())
            .json(&text_message_body(to, text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SendError::Api { status: status.as_u16(), body });
        }

        debug!(
            event_name = "whatsapp_message_sent",
            phone_number_id = %phone_number_id,
            to = %to,
            "outbound message accepted"
        );
        Ok(())
    }
}

/// Stand-in sender for disabled or local setups: replies go to the log
/// instead of the wire.
#[derive(Clone, Debug, Default)]
pub struct NoopSender;

#[async_trait]
impl MessageSender for NoopSender {
    async fn send_text(
        &self,
        phone_number_id: &str,
        to: &str,
        text: &str,
    ) -> Result<(), SendError> {
        info!(
            event_name = "whatsapp_send_skipped",
            phone_number_id = %phone_number_id,
            to = %to,
            text = %text,
            "outbound sends are disabled, dropping reply"
        );
        Ok(())
    }
}
