use crate::server::controller::error::CustomError;
use crate::server::model::order::{
    EditOrderRequest, EditOrderResponse, GetOrderResponse, GetRoomOrdersResponse, OrderStatus,
    PlaceOrderRequest, PlaceOrderResponse, RoomOrdersParams, UpdateStatusRequest,
};
use crate::server::state::AppState;
use actix_web::{get, patch, post, web, HttpResponse, Responder};
use log::{error, warn};
use std::str::FromStr;

#[post("/v1/orders")]
/// place an order against the room's open ticket
async fn post_orders(
    body: web::Json<PlaceOrderRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let placed = data
        .get_orchestrator()
        .place_order(body.into_inner())
        .await
        .map_err(|e| {
            warn!("post_orders failed, {}", e);
            CustomError::from(e)
        })?;
    Ok(web::Json(PlaceOrderResponse {
        order_id: placed.order_id,
        external_ticket_id: placed.external_ticket_id,
        subtotal: placed.totals.subtotal,
        tax: placed.totals.tax,
        total: placed.totals.total,
    }))
}

#[get("/v1/order/{id}")]
/// one order with its line items
async fn get_order(
    id: web::Path<i64>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    match data.get_ledger().get_order(id.into_inner()).await {
        Ok(Some(order)) => Ok(web::Json(GetOrderResponse { order })),
        Ok(None) => Err(CustomError::ResourceNotFound),
        Err(e) => {
            error!("get_order failed, {}", e);
            Err(e.into())
        }
    }
}

#[patch("/v1/order/{id}")]
/// apply a batch of quantity updates / line deletions
async fn patch_order(
    id: web::Path<i64>,
    body: web::Json<EditOrderRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let outcome = data
        .get_orchestrator()
        .edit_order(id.into_inner(), &body.edits)
        .await
        .map_err(|e| {
            warn!("patch_order failed, {}", e);
            CustomError::from(e)
        })?;
    Ok(web::Json(EditOrderResponse {
        new_total: outcome.new_total,
        removed: outcome.removed,
    }))
}

#[patch("/v1/order/{id}/status")]
/// cancel (or complete) a single open order
async fn patch_order_status(
    id: web::Path<i64>,
    body: web::Json<UpdateStatusRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let status = OrderStatus::from_str(body.status.as_str()).map_err(|e| {
        warn!("patch_order_status rejected, {}", e);
        CustomError::BadRequest
    })?;
    data.get_ledger()
        .update_status(id.into_inner(), status)
        .await
        .map_err(|e| {
            warn!("patch_order_status failed, {}", e);
            CustomError::from(e)
        })?;
    Ok(HttpResponse::Ok())
}

#[get("/v1/room/{room_number}/orders")]
/// orders for one room, optionally only the OPEN ones
async fn get_room_orders(
    room_number: web::Path<String>,
    params: web::Query<RoomOrdersParams>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let orders = data
        .get_ledger()
        .orders_by_room(room_number.as_str(), params.active)
        .await
        .map_err(|e| {
            error!("get_room_orders failed, {}", e);
            CustomError::from(e)
        })?;
    Ok(web::Json(GetRoomOrdersResponse { orders }))
}
