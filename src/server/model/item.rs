use serde::Serialize;

/// One requested item after the tolerant normalization stage, before
/// catalog resolution. Any of the references may be absent; resolution
/// order is product_id, then external_id, then freeform name+price.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ItemRequest {
    pub product_id: Option<i64>,
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub unit_price: Option<i64>,
    pub quantity: i32,
    pub note: Option<String>,
}

/// A priced line ready for the ticket gateway and the ledger.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ResolvedItem {
    pub external_item_id: Option<String>,
    pub name: String,
    /// tax-exclusive, currency minor units
    pub unit_price: i64,
    pub quantity: i32,
    pub note: Option<String>,
}

impl ResolvedItem {
    pub fn subtotal(&self) -> i64 {
        self.unit_price.saturating_mul(self.quantity as i64)
    }
}
