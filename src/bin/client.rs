use clap::{Args, Parser, Subcommand};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "roomtab")]
#[command(about = "client cli used by hotel staff to interact with the server", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
enum Commands {
    /// order related ops
    #[command(arg_required_else_help = true)]
    Order(OrderArgs),
    /// room related ops
    #[command(arg_required_else_help = true)]
    Room(RoomArgs),
}

#[derive(Debug, Args)]
struct OrderArgs {
    #[command(subcommand)]
    command: OrderCmds,
}

#[derive(Debug, Subcommand)]
enum OrderCmds {
    #[command(arg_required_else_help = true)]
    Place {
        #[arg(long, help = "Room number to bill")]
        room: String,
        #[arg(long, help = "Guest name shown on the order")]
        guest: Option<String>,
        #[arg(long, help = "Items as PRODUCT_ID:QUANTITY pairs.", value_name = "ID:QTY", num_args = 1..)]
        items: Vec<String>,
    },
    #[command(arg_required_else_help = true)]
    SetQuantity {
        id: i64,
        #[arg(long, help = "Line item id to update")]
        detail: i64,
        #[arg(long, help = "New quantity")]
        quantity: i64,
    },
    #[command(arg_required_else_help = true)]
    RemoveLine {
        id: i64,
        #[arg(long, help = "Line item id to delete")]
        detail: i64,
    },
    #[command(arg_required_else_help = true)]
    Cancel { id: i64 },
}

#[derive(Debug, Args)]
struct RoomArgs {
    #[command(subcommand)]
    command: RoomCmds,
}

#[derive(Debug, Subcommand)]
enum RoomCmds {
    List,
    #[command(arg_required_else_help = true)]
    Checkout { room: String },
}

const HOST: &str = "http://localhost:8080";

#[derive(Debug, Deserialize)]
struct PlaceOrderResponse {
    order_id: i64,
    total: i64,
}

#[derive(Debug, Deserialize)]
struct EditOrderResponse {
    new_total: i64,
    removed: bool,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    completed: u64,
}

fn parse_item(raw: &str) -> Option<serde_json::Value> {
    let (id, quantity) = raw.split_once(':')?;
    Some(serde_json::json!({
        "product_id": id.parse::<i64>().ok()?,
        "quantity": quantity.parse::<i64>().ok()?,
    }))
}

async fn report_edit(res: reqwest::Response, order_id: i64) -> Result<(), anyhow::Error> {
    match res.status() {
        StatusCode::OK => {
            let body = res.json::<EditOrderResponse>().await?;
            if body.removed {
                println!("order {} is now empty and was removed", order_id);
            } else {
                println!("order {} updated, new total = {}", order_id, body.new_total);
            }
        }
        StatusCode::NOT_FOUND => println!("order {} not found", order_id),
        unexpected => println!("got unexpected status code, {}", unexpected),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Cli::parse();

    match args.command {
        Commands::Order(order) => match order.command {
            OrderCmds::Place { room, guest, items } => {
                let items: Vec<_> = items.iter().filter_map(|raw| parse_item(raw)).collect();
                println!("placing an order for room={}", room);
                let res = Client::new()
                    .post(format!("{}/v1/orders", HOST))
                    .json(&serde_json::json!({
                        "room_number": room,
                        "guest_name": guest,
                        "items": items,
                    }))
                    .send()
                    .await?;
                match res.status() {
                    StatusCode::OK => {
                        let body = res.json::<PlaceOrderResponse>().await?;
                        println!(
                            "order {} placed successfully, total = {}",
                            body.order_id, body.total
                        );
                    }
                    StatusCode::BAD_REQUEST => {
                        println!("order was rejected, check the items and room number");
                    }
                    StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
                        println!("the POS provider is unreachable, nothing was charged");
                    }
                    unexpected => println!("got unexpected status code, {}", unexpected),
                }
            }
            OrderCmds::SetQuantity { id, detail, quantity } => {
                let res = Client::new()
                    .patch(format!("{}/v1/order/{}", HOST, id))
                    .json(&serde_json::json!({
                        "edits": [{"detail_id": detail, "quantity": quantity}],
                    }))
                    .send()
                    .await?;
                report_edit(res, id).await?;
            }
            OrderCmds::RemoveLine { id, detail } => {
                let res = Client::new()
                    .patch(format!("{}/v1/order/{}", HOST, id))
                    .json(&serde_json::json!({
                        "edits": [{"detail_id": detail, "delete": true}],
                    }))
                    .send()
                    .await?;
                report_edit(res, id).await?;
            }
            OrderCmds::Cancel { id } => {
                let res = Client::new()
                    .patch(format!("{}/v1/order/{}/status", HOST, id))
                    .json(&serde_json::json!({"status": "CANCELED"}))
                    .send()
                    .await?;
                match res.status() {
                    StatusCode::OK => println!("order {} canceled", id),
                    StatusCode::NOT_FOUND => println!("order {} not found", id),
                    StatusCode::BAD_REQUEST => println!("order {} is not open", id),
                    unexpected => println!("got unexpected status code, {}", unexpected),
                }
            }
        },
        Commands::Room(room) => match room.command {
            RoomCmds::List => {
                let res = Client::new().get(format!("{}/v1/rooms", HOST)).send().await?;
                println!("{}", res.text().await?);
            }
            RoomCmds::Checkout { room } => {
                println!("checking out room={}", room);
                let res = Client::new()
                    .post(format!("{}/v1/room/{}/checkout", HOST, room))
                    .send()
                    .await?;
                match res.status() {
                    StatusCode::OK => {
                        let body = res.json::<CheckoutResponse>().await?;
                        println!("room {} checked out, {} orders completed", room, body.completed);
                    }
                    StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
                        println!("the POS provider is unreachable, the tab is still open");
                    }
                    unexpected => println!("got unexpected status code, {}", unexpected),
                }
            }
        },
    };
    Ok(())
}
