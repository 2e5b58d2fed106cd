//! main file for the server

pub(crate) mod catalog;
pub(crate) mod controller;
pub(crate) mod database;
pub(crate) mod gateway;
pub(crate) mod input;
pub(crate) mod ledger;
pub(crate) mod messaging;
pub(crate) mod model;
pub(crate) mod orchestrator;
pub(crate) mod pricing;
pub(crate) mod state;
pub(crate) mod util;

use crate::server::catalog::PgCatalog;
use crate::server::controller::orders::{
    get_order, get_room_orders, patch_order, patch_order_status, post_orders,
};
use crate::server::controller::rooms::{get_rooms, post_checkout};
use crate::server::database::pool::Pool;
use crate::server::gateway::pos::PosTicketGateway;
use crate::server::ledger::PgOrderLedger;
use crate::server::messaging::PushMessenger;
use crate::server::model::config::ServerConfig;
use crate::server::orchestrator::RoomTicketOrchestrator;
use crate::server::state::AppState;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Run the server
pub async fn run(config: ServerConfig) -> io::Result<()> {
    let read_pool = Pool::new("read");
    read_pool
        .init(config.db_read_conn_str.as_str())
        .await
        .map_err(io::Error::other)?;
    let write_pool = Pool::new("write");
    write_pool
        .init(config.db_write_conn_str.as_str())
        .await
        .map_err(io::Error::other)?;

    let request_timeout = Duration::from_millis(config.order.request_timeout_ms);
    let gateway =
        Arc::new(PosTicketGateway::new(&config.pos, request_timeout).map_err(io::Error::other)?);
    let messenger =
        Arc::new(PushMessenger::new(&config.messaging, request_timeout).map_err(io::Error::other)?);
    let catalog = Arc::new(PgCatalog::new(read_pool.clone()));
    let ledger = Arc::new(PgOrderLedger::new(
        read_pool,
        write_pool,
        config.order.tax_rate,
    ));

    let orchestrator = Arc::new(RoomTicketOrchestrator::new(
        catalog,
        gateway,
        ledger.clone(),
        messenger,
        config.order.clone(),
    ));
    let state = AppState::new(orchestrator, ledger);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .service(post_orders)
            .service(get_order)
            .service(patch_order)
            .service(patch_order_status)
            .service(get_room_orders)
            .service(get_rooms)
            .service(post_checkout)
    })
    .bind(config.addr)?
    .run()
    .await
}
