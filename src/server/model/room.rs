use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct Room {
    pub room_number: String,
    pub active: bool,
    pub open_orders: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetRoomsResponse {
    pub rooms: Vec<Room>,
}
