use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum OrderStatus {
    Open,
    Completed,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Completed => "COMPLETED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELED" => Ok(Self::Canceled),
            s => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Local order header, the mirror of one placement against the room's
/// remote ticket.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Order {
    pub id: i64,
    pub room_number: String,
    pub guest_name: Option<String>,
    pub external_ticket_id: String,
    pub status: OrderStatus,
    /// tax-inclusive, currency minor units
    pub total_amount: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub checkout_at: Option<DateTime<Utc>>,
    pub line_items: Vec<OrderLineItem>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct OrderLineItem {
    pub id: i64,
    pub order_id: i64,
    pub external_item_id: Option<String>,
    pub product_name: String,
    pub unit_price: i64,
    pub quantity: i32,
    /// unit_price * quantity, always derived, never edited directly
    pub subtotal: i64,
    pub note: Option<String>,
}

/// One command in an edit batch: either a quantity update or a hard delete.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OrderEdit {
    pub detail_id: i64,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub delete: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlaceOrderRequest {
    pub room_number: String,
    #[serde(default)]
    pub guest_name: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    /// raw on purpose, normalized by the input stage
    pub items: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PlaceOrderResponse {
    pub order_id: i64,
    pub external_ticket_id: String,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EditOrderRequest {
    pub edits: Vec<OrderEdit>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EditOrderResponse {
    pub new_total: i64,
    pub removed: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetOrderResponse {
    pub order: Order,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetRoomOrdersResponse {
    pub orders: Vec<Order>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoomOrdersParams {
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct CheckoutResponse {
    pub completed: u64,
}
