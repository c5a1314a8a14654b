use std::net::SocketAddr;

use shared::config::ApiConfig;
use shared::pubsub::PubSubBus;
use shared::repos::Store;
use tracing::{error, info};

mod health;
mod ws;

use ws::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "api_server=debug,axum=info,tower_http=info".to_string()),
        )
        .init();

    let config = match ApiConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to read api config: {err}");
            std::process::exit(1);
        }
    };

    let store = match Store::connect(&config.database_url, config.database_max_connections).await
    {
        Ok(store) => store,
        Err(err) => {
            error!("failed to connect to postgres: {err}");
            std::process::exit(1);
        }
    };

    let pubsub = match PubSubBus::connect(&config.redis_url).await {
        Ok(pubsub) => pubsub,
        Err(err) => {
            error!("failed to connect to redis: {err}");
            std::process::exit(1);
        }
    };

    let state = AppState {
        store,
        pubsub,
        redis_url: config.redis_url.clone(),
        heartbeat_seconds: config.websocket_heartbeat_seconds,
    };

    let app = health::router(state.clone()).merge(ws::router(state));

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .unwrap_or_else(|_| "127.0.0.1:8080".parse().expect("valid default bind addr"));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };

    info!(
        "api server listening on {}",
        listener.local_addr().unwrap_or(addr)
    );

    if let Err(err) = axum::serve(listener, app).await {
        error!("server error: {err}");
    }
}
