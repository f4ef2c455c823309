mod db;
mod hub;
mod message;
mod routes;
mod services;
mod session;
mod state;
mod store;

use std::sync::Arc;

use hub::{ChannelHub, DEFAULT_CHANNEL_QUEUE_CAPACITY};
use store::postgres::PgStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    let pool = db::init_pool(&database_url)
        .await
        .expect("database init failed");

    let queue_capacity = state::env_parse("CHANNEL_QUEUE_CAPACITY", DEFAULT_CHANNEL_QUEUE_CAPACITY);
    let state = state::AppState::new(
        Arc::new(PgStore::new(pool)),
        Arc::new(ChannelHub::new(queue_capacity)),
    );

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, queue_capacity, "pairchat listening");
    axum::serve(listener, app).await.expect("server failed");
}
