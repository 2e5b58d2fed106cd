//! reqwest implementation of the ticket gateway against the POS provider's
//! orders API.

use crate::server::gateway::{GatewayError, TicketAppend, TicketGateway};
use crate::server::model::config::PosConfig;
use crate::server::model::item::ResolvedItem;
use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub(crate) struct PosTicketGateway {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TicketRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchTicketsResponse {
    #[serde(default)]
    tickets: Vec<TicketRef>,
}

#[derive(Debug, Deserialize)]
struct CreateTicketResponse {
    ticket: TicketRef,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    total: i64,
    status: String,
}

impl PosTicketGateway {
    pub fn new(config: &PosConfig, request_timeout: Duration) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        check_status(response).await
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport {
            message: e.to_string(),
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(GatewayError::Auth);
    }
    let payload = response.text().await.unwrap_or_default();
    warn!(
        "ticket provider returned status={}, payload={}",
        status, payload
    );
    Err(GatewayError::Provider {
        status: status.as_u16(),
        payload,
    })
}

fn line_item_body(item: &ResolvedItem) -> serde_json::Value {
    json!({
        "catalog_object_id": item.external_item_id,
        "name": item.name,
        "quantity": item.quantity.to_string(),
        "base_price_amount": item.unit_price,
        "note": item.note,
    })
}

#[async_trait]
impl TicketGateway for PosTicketGateway {
    async fn ensure_open_ticket(&self, room_number: &str) -> Result<String, GatewayError> {
        let found = self
            .post(
                "/v2/tickets/search",
                json!({ "reference_id": room_number, "state": "OPEN" }),
            )
            .await?
            .json::<SearchTicketsResponse>()
            .await
            .map_err(classify_reqwest_error)?;
        if let Some(ticket) = found.tickets.into_iter().next() {
            return Ok(ticket.id);
        }

        let created = self
            .post("/v2/tickets", json!({ "reference_id": room_number }))
            .await?
            .json::<CreateTicketResponse>()
            .await
            .map_err(classify_reqwest_error)?;
        Ok(created.ticket.id)
    }

    async fn append_line_items(
        &self,
        ticket_id: &str,
        items: &[ResolvedItem],
        idempotency_key: &str,
    ) -> Result<TicketAppend, GatewayError> {
        let body = json!({
            "idempotency_key": idempotency_key,
            "line_items": items.iter().map(line_item_body).collect::<Vec<_>>(),
        });
        let appended = self
            .post(&format!("/v2/tickets/{ticket_id}/line-items"), body)
            .await?
            .json::<AppendResponse>()
            .await
            .map_err(classify_reqwest_error)?;
        Ok(TicketAppend {
            remote_total: appended.total,
            status: appended.status,
        })
    }

    async fn close_ticket(&self, ticket_id: &str) -> Result<(), GatewayError> {
        self.post(&format!("/v2/tickets/{ticket_id}/close"), json!({}))
            .await?;
        Ok(())
    }
}
