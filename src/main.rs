use std::net::SocketAddr;

use axum::{Router, routing::get};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

mod config;
mod http;
mod room;
mod telemetry;
mod util;
mod ws;

use crate::http::routes::{self, AppState};
use crate::room::hub;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let state = AppState { hub: hub::spawn() };

    let app = Router::new()
        .route("/", get(routes::index))
        .route("/healthz", get(routes::healthz))
        .route("/room", get(routes::room_page))
        .route("/ws", get(ws::connection::ws_handler))
        .nest_service("/static", ServeDir::new(config::static_dir()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config::server_addr();
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
