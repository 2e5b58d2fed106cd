//! Order ledger: the local system of record for order headers and line
//! items. Every mutation runs inside one transaction; an order whose
//! surviving lines sum to nothing is deleted outright rather than persisted.

use crate::server::database::pool::Pool;
use crate::server::model::item::ResolvedItem;
use crate::server::model::order::{Order, OrderEdit, OrderLineItem, OrderStatus};
use crate::server::model::room::Room;
use crate::server::pricing::{compute_totals, is_degenerate};
use crate::server::util::time;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::{Display, Error};
use log::warn;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use tokio_postgres::types::ToSql;

#[derive(Debug, Display, Error)]
pub(crate) enum LedgerError {
    #[display("order not found")]
    NotFound,
    #[display("order is not open")]
    InvalidStatus,
    #[display("order has no billable line items")]
    EmptyOrder,
    #[display("no database connection available")]
    Busy,
    #[display("storage failure, {message}")]
    Storage { message: String },
}

impl From<tokio_postgres::Error> for LedgerError {
    fn from(e: tokio_postgres::Error) -> Self {
        Self::Storage {
            message: e.to_string(),
        }
    }
}

/// Everything needed to persist one placement after the remote ticket
/// append succeeded.
#[derive(Debug, Clone)]
pub(crate) struct OrderDraft {
    pub room_number: String,
    pub guest_name: Option<String>,
    pub note: Option<String>,
    pub external_ticket_id: String,
    pub lines: Vec<ResolvedItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EditOutcome {
    pub new_total: i64,
    pub removed: bool,
}

#[async_trait]
pub(crate) trait OrderLedger: Send + Sync {
    async fn create_order(&self, draft: OrderDraft) -> Result<Order, LedgerError>;

    async fn edit_order(
        &self,
        order_id: i64,
        edits: &[OrderEdit],
    ) -> Result<EditOutcome, LedgerError>;

    async fn get_order(&self, order_id: i64) -> Result<Option<Order>, LedgerError>;

    async fn orders_by_room(
        &self,
        room_number: &str,
        active_only: bool,
    ) -> Result<Vec<Order>, LedgerError>;

    async fn update_status(&self, order_id: i64, status: OrderStatus) -> Result<(), LedgerError>;

    /// transition all OPEN orders for a room to COMPLETED, stamping checkout time
    async fn complete_orders_on_checkout(&self, room_number: &str) -> Result<u64, LedgerError>;

    /// distinct remote ticket ids still referenced by the room's OPEN orders
    async fn open_ticket_ids(&self, room_number: &str) -> Result<Vec<String>, LedgerError>;

    /// linked messaging identity for the room, if the guest ever linked one
    async fn guest_contact(&self, room_number: &str) -> Result<Option<String>, LedgerError>;

    async fn list_rooms(&self) -> Result<Vec<Room>, LedgerError>;
}

#[derive(Debug, PartialEq)]
pub(crate) struct LineUpdate {
    pub id: i64,
    pub quantity: i32,
    pub subtotal: i64,
}

#[derive(Debug, Default)]
pub(crate) struct EditPlan {
    pub updates: Vec<LineUpdate>,
    pub deletes: Vec<i64>,
    /// (unit_price, quantity) of every line left after the batch
    pub surviving: Vec<(i64, i32)>,
}

/// Apply an edit batch to the current lines without touching storage.
/// Unknown detail ids and unusable quantities are skipped with a warning,
/// never fatal to the batch. Shared by the Postgres and in-memory ledgers.
pub(crate) fn plan_edits(lines: &[OrderLineItem], edits: &[OrderEdit]) -> EditPlan {
    let known: HashSet<i64> = lines.iter().map(|l| l.id).collect();
    let mut quantities: HashMap<i64, i32> = lines.iter().map(|l| (l.id, l.quantity)).collect();
    let mut deleted: HashSet<i64> = HashSet::new();

    for edit in edits {
        if !known.contains(&edit.detail_id) {
            warn!("edit references unknown line item {}, skipping", edit.detail_id);
            continue;
        }
        if deleted.contains(&edit.detail_id) {
            warn!("edit follows a delete of line item {}, skipping", edit.detail_id);
            continue;
        }
        if edit.delete {
            deleted.insert(edit.detail_id);
            continue;
        }
        match edit.quantity {
            Some(q) if (0..=i32::MAX as i64).contains(&q) => {
                quantities.insert(edit.detail_id, q as i32);
            }
            Some(q) => {
                warn!(
                    "edit for line item {} carries unusable quantity={}, skipping",
                    edit.detail_id, q
                );
            }
            None => {
                warn!(
                    "edit for line item {} has neither quantity nor delete, skipping",
                    edit.detail_id
                );
            }
        }
    }

    let mut plan = EditPlan::default();
    for line in lines {
        if deleted.contains(&line.id) {
            plan.deletes.push(line.id);
            continue;
        }
        let quantity = quantities[&line.id];
        if quantity != line.quantity {
            plan.updates.push(LineUpdate {
                id: line.id,
                quantity,
                subtotal: line.unit_price * quantity as i64,
            });
        }
        plan.surviving.push((line.unit_price, quantity));
    }
    plan
}

const SELECT_LINE_COLUMNS: &str =
    "id, order_id, external_item_id, product_name, unit_price, quantity, subtotal, note";

pub(crate) struct PgOrderLedger {
    read_pool: Pool,
    write_pool: Pool,
    tax_rate: f64,
}

impl PgOrderLedger {
    pub fn new(read_pool: Pool, write_pool: Pool, tax_rate: f64) -> Self {
        Self {
            read_pool,
            write_pool,
            tax_rate,
        }
    }

    async fn lines_for_orders(
        &self,
        client: &tokio_postgres::Client,
        order_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<OrderLineItem>>, LedgerError> {
        let rows = client
            .query(
                &format!(
                    "SELECT {SELECT_LINE_COLUMNS} FROM order_line_item WHERE order_id = ANY($1) ORDER BY id"
                ),
                &[&order_ids.to_vec()],
            )
            .await?;
        let mut grouped: HashMap<i64, Vec<OrderLineItem>> = HashMap::new();
        for row in rows {
            let line = map_line(&row);
            grouped.entry(line.order_id).or_default().push(line);
        }
        Ok(grouped)
    }
}

fn map_line(row: &tokio_postgres::Row) -> OrderLineItem {
    OrderLineItem {
        id: row.get("id"),
        order_id: row.get("order_id"),
        external_item_id: row.get("external_item_id"),
        product_name: row.get("product_name"),
        unit_price: row.get("unit_price"),
        quantity: row.get("quantity"),
        subtotal: row.get("subtotal"),
        note: row.get("note"),
    }
}

fn map_order(row: &tokio_postgres::Row, line_items: Vec<OrderLineItem>) -> Result<Order, LedgerError> {
    let status: String = row.get("status");
    let created_at: DateTime<Utc> = row.get("created_at");
    let checkout_at: Option<DateTime<Utc>> = row.get("checkout_at");
    Ok(Order {
        id: row.get("id"),
        room_number: row.get("room_number"),
        guest_name: row.get("guest_name"),
        external_ticket_id: row.get("external_ticket_id"),
        status: OrderStatus::from_str(&status).map_err(|message| LedgerError::Storage { message })?,
        total_amount: row.get("total_amount"),
        note: row.get("note"),
        created_at,
        checkout_at,
        line_items,
    })
}

#[async_trait]
impl OrderLedger for PgOrderLedger {
    async fn create_order(&self, draft: OrderDraft) -> Result<Order, LedgerError> {
        let totals = compute_totals(
            draft.lines.iter().map(|l| (l.unit_price, l.quantity)),
            self.tax_rate,
        );
        if is_degenerate(totals.total, draft.lines.len()) {
            return Err(LedgerError::EmptyOrder);
        }

        let mut conn = self.write_pool.acquire().ok_or(LedgerError::Busy)?;
        let txn = conn.client_mut().transaction().await?;

        let created_at = time::helper::get_utc_now();
        let header = txn
            .query_one(
                r#"
                INSERT INTO orders(room_number, guest_name, external_ticket_id, status, total_amount, note, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
            "#,
                &[
                    &draft.room_number,
                    &draft.guest_name,
                    &draft.external_ticket_id,
                    &OrderStatus::Open.as_str(),
                    &totals.total,
                    &draft.note,
                    &created_at,
                ],
            )
            .await?;
        let order_id: i64 = header.get("id");

        // multi-row insert, one statement for the whole batch
        const COLUMN_LEN: usize = 7;
        let subtotals: Vec<i64> = draft.lines.iter().map(|l| l.subtotal()).collect();
        let mut stmt =
            "INSERT INTO order_line_item(order_id, external_item_id, product_name, unit_price, quantity, subtotal, note) VALUES"
                .to_string();
        let mut params: Vec<&(dyn ToSql + Sync)> =
            Vec::with_capacity(draft.lines.len() * COLUMN_LEN);
        let mut idx = 1;
        for (i, line) in draft.lines.iter().enumerate() {
            let maybe_comma = if i != draft.lines.len() - 1 { "," } else { "" };
            stmt.extend(
                format!(
                    " (${}, ${}, ${}, ${}, ${}, ${}, ${}){}",
                    idx,
                    idx + 1,
                    idx + 2,
                    idx + 3,
                    idx + 4,
                    idx + 5,
                    idx + 6,
                    maybe_comma
                )
                .chars(),
            );
            params.extend([
                &order_id as &(dyn ToSql + Sync),
                &line.external_item_id,
                &line.name,
                &line.unit_price,
                &line.quantity,
                &subtotals[i],
                &line.note,
            ]);
            idx += COLUMN_LEN;
        }
        stmt.push_str(" RETURNING id");
        let line_rows = txn.query(&stmt, params.as_slice()).await?;

        txn.commit().await?;

        let line_items = draft
            .lines
            .iter()
            .zip(line_rows.iter())
            .map(|(line, row)| OrderLineItem {
                id: row.get("id"),
                order_id,
                external_item_id: line.external_item_id.clone(),
                product_name: line.name.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                subtotal: line.subtotal(),
                note: line.note.clone(),
            })
            .collect();

        Ok(Order {
            id: order_id,
            room_number: draft.room_number,
            guest_name: draft.guest_name,
            external_ticket_id: draft.external_ticket_id,
            status: OrderStatus::Open,
            total_amount: totals.total,
            note: draft.note,
            created_at,
            checkout_at: None,
            line_items,
        })
    }

    async fn edit_order(
        &self,
        order_id: i64,
        edits: &[OrderEdit],
    ) -> Result<EditOutcome, LedgerError> {
        let mut conn = self.write_pool.acquire().ok_or(LedgerError::Busy)?;
        let txn = conn.client_mut().transaction().await?;

        let header = txn
            .query_opt(
                "SELECT status FROM orders WHERE id = $1 FOR UPDATE",
                &[&order_id],
            )
            .await?
            .ok_or(LedgerError::NotFound)?;
        let status: String = header.get("status");
        if status != OrderStatus::Open.as_str() {
            return Err(LedgerError::InvalidStatus);
        }

        let rows = txn
            .query(
                &format!(
                    "SELECT {SELECT_LINE_COLUMNS} FROM order_line_item WHERE order_id = $1 ORDER BY id FOR UPDATE"
                ),
                &[&order_id],
            )
            .await?;
        let lines: Vec<OrderLineItem> = rows.iter().map(map_line).collect();

        let plan = plan_edits(&lines, edits);
        for update in &plan.updates {
            txn.execute(
                "UPDATE order_line_item SET quantity = $2, subtotal = $3 WHERE id = $1",
                &[&update.id, &update.quantity, &update.subtotal],
            )
            .await?;
        }
        if !plan.deletes.is_empty() {
            txn.execute(
                "DELETE FROM order_line_item WHERE id = ANY($1)",
                &[&plan.deletes],
            )
            .await?;
        }

        let totals = compute_totals(plan.surviving.iter().copied(), self.tax_rate);
        if is_degenerate(totals.total, plan.surviving.len()) {
            txn.execute(
                "DELETE FROM order_line_item WHERE order_id = $1",
                &[&order_id],
            )
            .await?;
            txn.execute("DELETE FROM orders WHERE id = $1", &[&order_id])
                .await?;
            txn.commit().await?;
            return Ok(EditOutcome {
                new_total: 0,
                removed: true,
            });
        }

        txn.execute(
            "UPDATE orders SET total_amount = $2 WHERE id = $1",
            &[&order_id, &totals.total],
        )
        .await?;
        txn.commit().await?;
        Ok(EditOutcome {
            new_total: totals.total,
            removed: false,
        })
    }

    async fn get_order(&self, order_id: i64) -> Result<Option<Order>, LedgerError> {
        let conn = self.read_pool.acquire().ok_or(LedgerError::Busy)?;
        let header = conn
            .client()
            .query_opt("SELECT * FROM orders WHERE id = $1", &[&order_id])
            .await?;
        let Some(header) = header else {
            return Ok(None);
        };
        let mut lines = self.lines_for_orders(conn.client(), &[order_id]).await?;
        let order = map_order(&header, lines.remove(&order_id).unwrap_or_default())?;
        Ok(Some(order))
    }

    async fn orders_by_room(
        &self,
        room_number: &str,
        active_only: bool,
    ) -> Result<Vec<Order>, LedgerError> {
        let conn = self.read_pool.acquire().ok_or(LedgerError::Busy)?;
        let stmt = if active_only {
            "SELECT * FROM orders WHERE room_number = $1 AND status = 'OPEN' ORDER BY id"
        } else {
            "SELECT * FROM orders WHERE room_number = $1 ORDER BY id"
        };
        let headers = conn
            .client()
            .query(stmt, &[&room_number.to_string()])
            .await?;
        let ids: Vec<i64> = headers.iter().map(|r| r.get("id")).collect();
        let mut lines = self.lines_for_orders(conn.client(), &ids).await?;
        headers
            .iter()
            .map(|row| {
                let id: i64 = row.get("id");
                map_order(row, lines.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn update_status(&self, order_id: i64, status: OrderStatus) -> Result<(), LedgerError> {
        if status == OrderStatus::Open {
            // no transition back into OPEN
            return Err(LedgerError::InvalidStatus);
        }
        let conn = self.write_pool.acquire().ok_or(LedgerError::Busy)?;
        let checkout_at = match status {
            OrderStatus::Completed => Some(time::helper::get_utc_now()),
            _ => None,
        };
        let affected = conn
            .client()
            .execute(
                "UPDATE orders SET status = $2, checkout_at = COALESCE($3, checkout_at) WHERE id = $1 AND status = 'OPEN'",
                &[&order_id, &status.as_str(), &checkout_at],
            )
            .await?;
        if affected == 1 {
            return Ok(());
        }
        let exists = conn
            .client()
            .query_opt("SELECT id FROM orders WHERE id = $1", &[&order_id])
            .await?;
        match exists {
            Some(_) => Err(LedgerError::InvalidStatus),
            None => Err(LedgerError::NotFound),
        }
    }

    async fn complete_orders_on_checkout(&self, room_number: &str) -> Result<u64, LedgerError> {
        let conn = self.write_pool.acquire().ok_or(LedgerError::Busy)?;
        let affected = conn
            .client()
            .execute(
                "UPDATE orders SET status = 'COMPLETED', checkout_at = $2 WHERE room_number = $1 AND status = 'OPEN'",
                &[&room_number.to_string(), &time::helper::get_utc_now()],
            )
            .await?;
        Ok(affected)
    }

    async fn open_ticket_ids(&self, room_number: &str) -> Result<Vec<String>, LedgerError> {
        let conn = self.read_pool.acquire().ok_or(LedgerError::Busy)?;
        let rows = conn
            .client()
            .query(
                "SELECT DISTINCT external_ticket_id FROM orders WHERE room_number = $1 AND status = 'OPEN'",
                &[&room_number.to_string()],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get("external_ticket_id")).collect())
    }

    async fn guest_contact(&self, room_number: &str) -> Result<Option<String>, LedgerError> {
        let conn = self.read_pool.acquire().ok_or(LedgerError::Busy)?;
        let row = conn
            .client()
            .query_opt(
                "SELECT guest_identity FROM room_link WHERE room_number = $1 ORDER BY linked_at DESC LIMIT 1",
                &[&room_number.to_string()],
            )
            .await?;
        Ok(row.map(|r| r.get("guest_identity")))
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, LedgerError> {
        let conn = self.read_pool.acquire().ok_or(LedgerError::Busy)?;
        let rows = conn
            .client()
            .query(
                r#"
                SELECT r.room_number, r.active, COUNT(o.id) FILTER (WHERE o.status = 'OPEN') AS open_orders
                FROM room r
                LEFT JOIN orders o ON o.room_number = r.room_number
                GROUP BY r.room_number, r.active
                ORDER BY r.room_number
            "#,
                &[],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|r| Room {
                room_number: r.get("room_number"),
                active: r.get("active"),
                open_orders: r.get("open_orders"),
            })
            .collect())
    }
}

/// for test: same contract as the Postgres ledger, driven through the same
/// `plan_edits`/`compute_totals` core, with commit-or-nothing semantics and
/// an injectable mid-transaction failure.
#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryState {
        next_order_id: i64,
        next_line_id: i64,
        orders: BTreeMap<i64, Order>,
        contacts: HashMap<String, String>,
    }

    pub(crate) struct MemoryLedger {
        tax_rate: f64,
        state: Mutex<MemoryState>,
        /// simulate a storage failure after the header write but before the
        /// line items land; the "transaction" must leave nothing behind
        pub fail_after_header: AtomicBool,
    }

    impl MemoryLedger {
        pub fn new(tax_rate: f64) -> Self {
            Self {
                tax_rate,
                state: Mutex::new(MemoryState::default()),
                fail_after_header: AtomicBool::new(false),
            }
        }

        pub fn link_guest(&self, room_number: &str, identity: &str) {
            self.state
                .lock()
                .unwrap()
                .contacts
                .insert(room_number.to_string(), identity.to_string());
        }

        pub fn order_count(&self) -> usize {
            self.state.lock().unwrap().orders.len()
        }
    }

    #[async_trait]
    impl OrderLedger for MemoryLedger {
        async fn create_order(&self, draft: OrderDraft) -> Result<Order, LedgerError> {
            let totals = compute_totals(
                draft.lines.iter().map(|l| (l.unit_price, l.quantity)),
                self.tax_rate,
            );
            if is_degenerate(totals.total, draft.lines.len()) {
                return Err(LedgerError::EmptyOrder);
            }

            let mut state = self.state.lock().unwrap();
            state.next_order_id += 1;
            let order_id = state.next_order_id;
            let mut order = Order {
                id: order_id,
                room_number: draft.room_number,
                guest_name: draft.guest_name,
                external_ticket_id: draft.external_ticket_id,
                status: OrderStatus::Open,
                total_amount: totals.total,
                note: draft.note,
                created_at: time::helper::get_utc_now(),
                checkout_at: None,
                line_items: Vec::new(),
            };

            // header written; the injected failure rolls everything back
            if self.fail_after_header.load(Ordering::SeqCst) {
                return Err(LedgerError::Storage {
                    message: "simulated failure between header and line items".to_string(),
                });
            }

            for line in draft.lines {
                state.next_line_id += 1;
                order.line_items.push(OrderLineItem {
                    id: state.next_line_id,
                    order_id,
                    external_item_id: line.external_item_id.clone(),
                    product_name: line.name.clone(),
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                    subtotal: line.subtotal(),
                    note: line.note,
                });
            }
            state.orders.insert(order_id, order.clone());
            Ok(order)
        }

        async fn edit_order(
            &self,
            order_id: i64,
            edits: &[OrderEdit],
        ) -> Result<EditOutcome, LedgerError> {
            let mut state = self.state.lock().unwrap();
            let order = state.orders.get_mut(&order_id).ok_or(LedgerError::NotFound)?;
            if order.status != OrderStatus::Open {
                return Err(LedgerError::InvalidStatus);
            }

            let plan = plan_edits(&order.line_items, edits);
            let totals = compute_totals(plan.surviving.iter().copied(), self.tax_rate);
            if is_degenerate(totals.total, plan.surviving.len()) {
                state.orders.remove(&order_id);
                return Ok(EditOutcome {
                    new_total: 0,
                    removed: true,
                });
            }

            let order = state
                .orders
                .get_mut(&order_id)
                .expect("order checked above");
            order.line_items.retain(|l| !plan.deletes.contains(&l.id));
            for update in &plan.updates {
                if let Some(line) = order.line_items.iter_mut().find(|l| l.id == update.id) {
                    line.quantity = update.quantity;
                    line.subtotal = update.subtotal;
                }
            }
            order.total_amount = totals.total;
            Ok(EditOutcome {
                new_total: totals.total,
                removed: false,
            })
        }

        async fn get_order(&self, order_id: i64) -> Result<Option<Order>, LedgerError> {
            Ok(self.state.lock().unwrap().orders.get(&order_id).cloned())
        }

        async fn orders_by_room(
            &self,
            room_number: &str,
            active_only: bool,
        ) -> Result<Vec<Order>, LedgerError> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .orders
                .values()
                .filter(|o| o.room_number == room_number)
                .filter(|o| !active_only || o.status == OrderStatus::Open)
                .cloned()
                .collect())
        }

        async fn update_status(
            &self,
            order_id: i64,
            status: OrderStatus,
        ) -> Result<(), LedgerError> {
            if status == OrderStatus::Open {
                return Err(LedgerError::InvalidStatus);
            }
            let mut state = self.state.lock().unwrap();
            let order = state.orders.get_mut(&order_id).ok_or(LedgerError::NotFound)?;
            if order.status != OrderStatus::Open {
                return Err(LedgerError::InvalidStatus);
            }
            order.status = status;
            if status == OrderStatus::Completed {
                order.checkout_at = Some(time::helper::get_utc_now());
            }
            Ok(())
        }

        async fn complete_orders_on_checkout(
            &self,
            room_number: &str,
        ) -> Result<u64, LedgerError> {
            let mut state = self.state.lock().unwrap();
            let now = time::helper::get_utc_now();
            let mut completed = 0;
            for order in state.orders.values_mut() {
                if order.room_number == room_number && order.status == OrderStatus::Open {
                    order.status = OrderStatus::Completed;
                    order.checkout_at = Some(now);
                    completed += 1;
                }
            }
            Ok(completed)
        }

        async fn open_ticket_ids(&self, room_number: &str) -> Result<Vec<String>, LedgerError> {
            let state = self.state.lock().unwrap();
            let mut ids: Vec<String> = state
                .orders
                .values()
                .filter(|o| o.room_number == room_number && o.status == OrderStatus::Open)
                .map(|o| o.external_ticket_id.clone())
                .collect();
            ids.sort();
            ids.dedup();
            Ok(ids)
        }

        async fn guest_contact(&self, room_number: &str) -> Result<Option<String>, LedgerError> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .contacts
                .get(room_number)
                .cloned())
        }

        async fn list_rooms(&self) -> Result<Vec<Room>, LedgerError> {
            let state = self.state.lock().unwrap();
            let mut rooms: BTreeMap<String, i64> = BTreeMap::new();
            for order in state.orders.values() {
                let open = (order.status == OrderStatus::Open) as i64;
                *rooms.entry(order.room_number.clone()).or_default() += open;
            }
            Ok(rooms
                .into_iter()
                .map(|(room_number, open_orders)| Room {
                    room_number,
                    active: true,
                    open_orders,
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryLedger;
    use super::*;
    use crate::server::util::time::mock_chrono;
    use std::sync::atomic::Ordering;

    fn coffee_line(quantity: i32) -> ResolvedItem {
        ResolvedItem {
            external_item_id: Some("SQ-COFFEE".to_string()),
            name: "Coffee".to_string(),
            unit_price: 500,
            quantity,
            note: None,
        }
    }

    fn draft(room: &str, lines: Vec<ResolvedItem>) -> OrderDraft {
        OrderDraft {
            room_number: room.to_string(),
            guest_name: Some("Guest A".to_string()),
            note: None,
            external_ticket_id: "T-1".to_string(),
            lines,
        }
    }

    fn quantity_edit(detail_id: i64, quantity: i64) -> OrderEdit {
        OrderEdit {
            detail_id,
            quantity: Some(quantity),
            delete: false,
        }
    }

    fn delete_edit(detail_id: i64) -> OrderEdit {
        OrderEdit {
            detail_id,
            quantity: None,
            delete: true,
        }
    }

    #[test]
    fn plan_skips_unknown_and_invalid_edits() {
        let lines = vec![OrderLineItem {
            id: 10,
            order_id: 1,
            external_item_id: None,
            product_name: "Coffee".to_string(),
            unit_price: 500,
            quantity: 2,
            subtotal: 1000,
            note: None,
        }];
        let plan = plan_edits(
            &lines,
            &[
                quantity_edit(999, 5),    // unknown line
                quantity_edit(10, -3),    // negative quantity
                OrderEdit {
                    detail_id: 10,
                    quantity: None,
                    delete: false,
                }, // no-op edit
            ],
        );
        assert!(plan.updates.is_empty());
        assert!(plan.deletes.is_empty());
        assert_eq!(plan.surviving, vec![(500, 2)]);
    }

    #[test]
    fn plan_applies_update_and_delete() {
        let lines = vec![
            OrderLineItem {
                id: 10,
                order_id: 1,
                external_item_id: None,
                product_name: "Coffee".to_string(),
                unit_price: 500,
                quantity: 2,
                subtotal: 1000,
                note: None,
            },
            OrderLineItem {
                id: 11,
                order_id: 1,
                external_item_id: None,
                product_name: "Tea".to_string(),
                unit_price: 400,
                quantity: 1,
                subtotal: 400,
                note: None,
            },
        ];
        let plan = plan_edits(&lines, &[quantity_edit(10, 3), delete_edit(11)]);
        assert_eq!(
            plan.updates,
            vec![LineUpdate {
                id: 10,
                quantity: 3,
                subtotal: 1500
            }]
        );
        assert_eq!(plan.deletes, vec![11]);
        assert_eq!(plan.surviving, vec![(500, 3)]);
    }

    #[tokio::test]
    async fn create_holds_total_invariant() {
        let ledger = MemoryLedger::new(0.10);
        let order = ledger
            .create_order(draft("101", vec![coffee_line(2)]))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.total_amount, 1100);

        let recomputed = compute_totals(
            order.line_items.iter().map(|l| (l.unit_price, l.quantity)),
            0.10,
        );
        assert_eq!(order.total_amount, recomputed.total);
    }

    #[tokio::test]
    async fn edit_recomputes_total() {
        let ledger = MemoryLedger::new(0.10);
        let order = ledger
            .create_order(draft("101", vec![coffee_line(2)]))
            .await
            .unwrap();
        let line_id = order.line_items[0].id;

        let outcome = ledger
            .edit_order(order.id, &[quantity_edit(line_id, 1)])
            .await
            .unwrap();
        assert_eq!(
            outcome,
            EditOutcome {
                new_total: 550,
                removed: false
            }
        );

        let stored = ledger.get_order(order.id).await.unwrap().unwrap();
        let recomputed = compute_totals(
            stored.line_items.iter().map(|l| (l.unit_price, l.quantity)),
            0.10,
        );
        assert_eq!(stored.total_amount, recomputed.total);
    }

    #[tokio::test]
    async fn deleting_last_line_removes_order() {
        let ledger = MemoryLedger::new(0.10);
        let order = ledger
            .create_order(draft("101", vec![coffee_line(1)]))
            .await
            .unwrap();
        let line_id = order.line_items[0].id;

        let outcome = ledger
            .edit_order(order.id, &[delete_edit(line_id)])
            .await
            .unwrap();
        assert!(outcome.removed);
        assert!(ledger.get_order(order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zeroing_every_quantity_removes_order() {
        let ledger = MemoryLedger::new(0.10);
        let order = ledger
            .create_order(draft("101", vec![coffee_line(2)]))
            .await
            .unwrap();
        let line_id = order.line_items[0].id;

        let outcome = ledger
            .edit_order(order.id, &[quantity_edit(line_id, 0)])
            .await
            .unwrap();
        assert!(outcome.removed);
        assert!(ledger.get_order(order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_rolls_back_on_midway_failure() {
        let ledger = MemoryLedger::new(0.10);
        ledger.fail_after_header.store(true, Ordering::SeqCst);

        let result = ledger.create_order(draft("101", vec![coffee_line(2)])).await;
        assert!(matches!(result, Err(LedgerError::Storage { .. })));
        assert_eq!(ledger.order_count(), 0);
    }

    #[tokio::test]
    async fn checkout_completes_only_that_room() {
        mock_chrono::set_utc_now(1_700_000_000);
        let ledger = MemoryLedger::new(0.10);
        let kept_open = ledger
            .create_order(draft("102", vec![coffee_line(1)]))
            .await
            .unwrap();
        let first = ledger
            .create_order(draft("101", vec![coffee_line(1)]))
            .await
            .unwrap();
        let second = ledger
            .create_order(draft("101", vec![coffee_line(2)]))
            .await
            .unwrap();

        let completed = ledger.complete_orders_on_checkout("101").await.unwrap();
        assert_eq!(completed, 2);

        for id in [first.id, second.id] {
            let order = ledger.get_order(id).await.unwrap().unwrap();
            assert_eq!(order.status, OrderStatus::Completed);
            assert_eq!(order.checkout_at.unwrap().timestamp(), 1_700_000_000);
        }
        let untouched = ledger.get_order(kept_open.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, OrderStatus::Open);
        assert!(untouched.checkout_at.is_none());
    }

    #[tokio::test]
    async fn open_ticket_ids_are_distinct() {
        let ledger = MemoryLedger::new(0.10);
        // same ticket referenced by non-adjacent orders
        for ticket in ["T-1", "T-2", "T-1"] {
            let mut d = draft("101", vec![coffee_line(1)]);
            d.external_ticket_id = ticket.to_string();
            ledger.create_order(d).await.unwrap();
        }

        let ids = ledger.open_ticket_ids("101").await.unwrap();
        assert_eq!(ids, ["T-1", "T-2"]);
    }

    #[tokio::test]
    async fn no_transition_out_of_terminal_states() {
        let ledger = MemoryLedger::new(0.10);
        let order = ledger
            .create_order(draft("101", vec![coffee_line(1)]))
            .await
            .unwrap();
        ledger
            .update_status(order.id, OrderStatus::Canceled)
            .await
            .unwrap();

        let result = ledger.update_status(order.id, OrderStatus::Completed).await;
        assert!(matches!(result, Err(LedgerError::InvalidStatus)));

        let result = ledger.update_status(order.id, OrderStatus::Open).await;
        assert!(matches!(result, Err(LedgerError::InvalidStatus)));

        let result = ledger.update_status(9999, OrderStatus::Canceled).await;
        assert!(matches!(result, Err(LedgerError::NotFound)));
    }
}
