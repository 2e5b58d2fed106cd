//! Guest notification over the messaging provider's push API.
//! Fire-and-forget from the orchestrator's perspective.

use async_trait::async_trait;
use derive_more::{Display, Error};
use log::warn;
use serde_json::json;
use std::time::Duration;

use crate::server::model::config::MessagingConfig;

#[derive(Debug, Display, Error)]
pub(crate) enum MessagingError {
    #[display("messaging transport error, {message}")]
    Transport { message: String },
    #[display("messaging provider rejected the push, status={status}")]
    Provider { status: u16 },
}

#[derive(Debug, Clone)]
pub(crate) struct OrderNotice {
    pub order_id: i64,
    pub room_number: String,
    pub total: i64,
}

#[async_trait]
pub(crate) trait GuestMessenger: Send + Sync {
    async fn send_order_notice(
        &self,
        guest_identity: &str,
        notice: &OrderNotice,
    ) -> Result<(), MessagingError>;
}

pub(crate) struct PushMessenger {
    http: reqwest::Client,
    base_url: String,
    channel_token: String,
}

impl PushMessenger {
    pub fn new(config: &MessagingConfig, request_timeout: Duration) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            channel_token: config.channel_token.clone(),
        })
    }
}

#[async_trait]
impl GuestMessenger for PushMessenger {
    async fn send_order_notice(
        &self,
        guest_identity: &str,
        notice: &OrderNotice,
    ) -> Result<(), MessagingError> {
        let body = json!({
            "to": guest_identity,
            "messages": [{
                "type": "text",
                "text": format!(
                    "Your order #{} for room {} has been placed. Total: {}",
                    notice.order_id, notice.room_number, notice.total
                ),
            }],
        });
        let response = self
            .http
            .post(format!("{}/v2/bot/message/push", self.base_url))
            .bearer_auth(&self.channel_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| MessagingError::Transport {
                message: e.to_string(),
            })?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            warn!(
                "push to guest failed, status={}, payload={}",
                status,
                response.text().await.unwrap_or_default()
            );
            return Err(MessagingError::Provider { status });
        }
        Ok(())
    }
}
