//! Remote ticket gateway: the POS provider's open tab per room.

pub(crate) mod pos;

use crate::server::model::item::ResolvedItem;
use async_trait::async_trait;
use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub(crate) enum GatewayError {
    #[display("ticket gateway transport error, {message}")]
    Transport { message: String },
    #[display("ticket gateway timed out")]
    Timeout,
    #[display("ticket gateway auth rejected")]
    Auth,
    #[display("ticket provider rejected the request, status={status}")]
    Provider {
        status: u16,
        /// provider payload, logged server-side and never echoed to callers
        payload: String,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct TicketAppend {
    pub remote_total: i64,
    pub status: String,
}

/// The provider owns the remote representation; there is at most one open
/// ticket per room. The provider gives no idempotency guarantee, so callers
/// bound duplicate-append risk to a single retry carrying the same key.
#[async_trait]
pub(crate) trait TicketGateway: Send + Sync {
    async fn ensure_open_ticket(&self, room_number: &str) -> Result<String, GatewayError>;

    async fn append_line_items(
        &self,
        ticket_id: &str,
        items: &[ResolvedItem],
        idempotency_key: &str,
    ) -> Result<TicketAppend, GatewayError>;

    /// close the tab at checkout
    async fn close_ticket(&self, ticket_id: &str) -> Result<(), GatewayError>;
}
