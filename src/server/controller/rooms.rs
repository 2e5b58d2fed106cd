use crate::server::controller::error::CustomError;
use crate::server::model::order::CheckoutResponse;
use crate::server::model::room::GetRoomsResponse;
use crate::server::state::AppState;
use actix_web::{get, post, web, Responder};
use log::{error, warn};

#[get("/v1/rooms")]
/// room list with open-order counts, for the staff console
async fn get_rooms(data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let rooms = data.get_ledger().list_rooms().await.map_err(|e| {
        error!("get_rooms failed, {}", e);
        CustomError::from(e)
    })?;
    Ok(web::Json(GetRoomsResponse { rooms }))
}

#[post("/v1/room/{room_number}/checkout")]
/// close the room's tab: remote ticket first, then the local orders
async fn post_checkout(
    room_number: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let completed = data
        .get_orchestrator()
        .checkout(room_number.as_str())
        .await
        .map_err(|e| {
            warn!("post_checkout failed, {}", e);
            CustomError::from(e)
        })?;
    Ok(web::Json(CheckoutResponse { completed }))
}
