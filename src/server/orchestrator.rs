//! Room ticket orchestrator: normalizes requested items, resolves and prices
//! them, pushes the consolidated state to the remote ticket, persists the
//! local mirror, and fires the best-effort guest notice.
//!
//! Ordering within one call: remote ticket mutation happens-before the local
//! transaction commit, which happens-before the notification attempt.

use crate::server::catalog::{self, CatalogProvider};
use crate::server::gateway::{GatewayError, TicketAppend, TicketGateway};
use crate::server::input;
use crate::server::ledger::{EditOutcome, LedgerError, OrderDraft, OrderLedger};
use crate::server::messaging::{GuestMessenger, OrderNotice};
use crate::server::model::config::OrderConfig;
use crate::server::model::item::ResolvedItem;
use crate::server::model::order::{Order, OrderEdit, PlaceOrderRequest};
use crate::server::pricing::{compute_totals, is_degenerate, OrderTotals};
use derive_more::{Display, Error};
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Display, Error)]
pub(crate) enum OrderError {
    #[display("{message}")]
    Validation { message: String },
    #[display("ticket gateway failed, {_0}")]
    Gateway(#[error(source)] GatewayError),
    #[display("order ledger failed, {_0}")]
    Ledger(#[error(source)] LedgerError),
}

impl From<GatewayError> for OrderError {
    fn from(e: GatewayError) -> Self {
        Self::Gateway(e)
    }
}

impl From<LedgerError> for OrderError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}

fn validation(message: &str) -> OrderError {
    OrderError::Validation {
        message: message.to_string(),
    }
}

#[derive(Debug)]
pub(crate) struct PlacedOrder {
    pub order_id: i64,
    pub external_ticket_id: String,
    pub totals: OrderTotals,
}

pub(crate) struct RoomTicketOrchestrator {
    catalog: Arc<dyn CatalogProvider>,
    gateway: Arc<dyn TicketGateway>,
    ledger: Arc<dyn OrderLedger>,
    messenger: Arc<dyn GuestMessenger>,
    config: OrderConfig,
    /// serializes the ensure-append-persist sequence per room; concurrent
    /// placements for the same room would otherwise race the provider's
    /// ensure-open-ticket step
    room_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RoomTicketOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        gateway: Arc<dyn TicketGateway>,
        ledger: Arc<dyn OrderLedger>,
        messenger: Arc<dyn GuestMessenger>,
        config: OrderConfig,
    ) -> Self {
        Self {
            catalog,
            gateway,
            ledger,
            messenger,
            config,
            room_locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn place_order(&self, request: PlaceOrderRequest) -> Result<PlacedOrder, OrderError> {
        let room_number = request.room_number.trim().to_string();
        if room_number.is_empty() {
            return Err(validation("room_number is required"));
        }

        let requested = input::normalize_items(&request.items);
        let resolved = catalog::resolve_items(
            self.catalog.as_ref(),
            requested,
            self.config.zero_price_fallback,
        )
        .await;
        if resolved.is_empty() {
            return Err(validation("no valid items in the request"));
        }

        let totals = compute_totals(
            resolved.iter().map(|l| (l.unit_price, l.quantity)),
            self.config.tax_rate,
        );
        if is_degenerate(totals.total, resolved.len()) {
            return Err(validation("order total would be zero"));
        }

        let lock = self.room_lock(&room_number);
        let order = {
            let _guard = lock.lock().await;

            let idempotency_key = Uuid::new_v4().to_string();
            let (ticket_id, append) = self
                .append_with_retry(&room_number, &resolved, &idempotency_key)
                .await?;
            info!(
                "room {}: appended {} items to ticket {}, remote total={}, remote status={}",
                room_number,
                resolved.len(),
                ticket_id,
                append.remote_total,
                append.status
            );

            self.ledger
                .create_order(OrderDraft {
                    room_number: room_number.clone(),
                    guest_name: request.guest_name,
                    note: request.note,
                    external_ticket_id: ticket_id,
                    lines: resolved,
                })
                .await?
        };

        self.notify(&order).await;

        Ok(PlacedOrder {
            order_id: order.id,
            external_ticket_id: order.external_ticket_id,
            totals,
        })
    }

    pub async fn edit_order(
        &self,
        order_id: i64,
        edits: &[OrderEdit],
    ) -> Result<EditOutcome, OrderError> {
        if edits.is_empty() {
            return Err(validation("edit batch is empty"));
        }
        Ok(self.ledger.edit_order(order_id, edits).await?)
    }

    /// Close the room's remote ticket(s), then mark its OPEN orders
    /// COMPLETED. Remote close happens-before the local update, with the
    /// same single-retry policy as placement.
    pub async fn checkout(&self, room_number: &str) -> Result<u64, OrderError> {
        let room_number = room_number.trim();
        if room_number.is_empty() {
            return Err(validation("room_number is required"));
        }

        let lock = self.room_lock(room_number);
        let _guard = lock.lock().await;

        for ticket_id in self.ledger.open_ticket_ids(room_number).await? {
            if let Err(first) = self.gateway.close_ticket(&ticket_id).await {
                warn!(
                    "closing ticket {} for room {} failed, retrying once, {}",
                    ticket_id, room_number, first
                );
                tokio::time::sleep(Duration::from_millis(self.config.ticket_retry_delay_ms)).await;
                self.gateway.close_ticket(&ticket_id).await.map_err(|second| {
                    error!(
                        "closing ticket {} for room {} failed twice, {}",
                        ticket_id, room_number, second
                    );
                    second
                })?;
            }
        }

        Ok(self.ledger.complete_orders_on_checkout(room_number).await?)
    }

    fn room_lock(&self, room_number: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.room_locks.lock().expect("room lock map poisoned");
        // entries only the map still references are idle; drop them so the
        // map does not grow with every room string ever requested
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(room_number.to_string()).or_default().clone()
    }

    /// exactly one retry after a short fixed delay, same idempotency key on
    /// both attempts; the provider is not idempotent, so this only bounds
    /// duplicate-append risk
    async fn append_with_retry(
        &self,
        room_number: &str,
        items: &[ResolvedItem],
        idempotency_key: &str,
    ) -> Result<(String, TicketAppend), GatewayError> {
        match self.try_append(room_number, items, idempotency_key).await {
            Ok(appended) => Ok(appended),
            Err(first) => {
                warn!(
                    "ticket append for room {} failed, retrying once, {}",
                    room_number, first
                );
                tokio::time::sleep(Duration::from_millis(self.config.ticket_retry_delay_ms)).await;
                self.try_append(room_number, items, idempotency_key)
                    .await
                    .map_err(|second| {
                        error!(
                            "ticket append for room {} failed twice, giving up, {}",
                            room_number, second
                        );
                        second
                    })
            }
        }
    }

    async fn try_append(
        &self,
        room_number: &str,
        items: &[ResolvedItem],
        idempotency_key: &str,
    ) -> Result<(String, TicketAppend), GatewayError> {
        let ticket_id = self.gateway.ensure_open_ticket(room_number).await?;
        let append = self
            .gateway
            .append_line_items(&ticket_id, items, idempotency_key)
            .await?;
        Ok((ticket_id, append))
    }

    /// best effort: any failure is logged and swallowed
    async fn notify(&self, order: &Order) {
        let contact = match self.ledger.guest_contact(&order.room_number).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                info!("no linked guest for room {}, skipping notice", order.room_number);
                return;
            }
            Err(e) => {
                warn!(
                    "guest lookup for room {} failed, skipping notice, {}",
                    order.room_number, e
                );
                return;
            }
        };
        let notice = OrderNotice {
            order_id: order.id,
            room_number: order.room_number.clone(),
            total: order.total_amount,
        };
        if let Err(e) = self.messenger.send_order_notice(&contact, &notice).await {
            warn!("order notice for room {} failed, {}", order.room_number, e);
        }
    }
}
