// src/main.rs
mod config;
mod filter;
mod handlers;
mod models;
mod protocol;
mod storage;
mod utils;

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize};
use std::sync::Arc;
use std::time::Duration;

use env_logger::Env;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::RateLimiter;
use log::{error, info, warn};
use tokio::net::{TcpListener, UdpSocket};

use crate::config::Config;
use crate::handlers::browse::Session;
use crate::handlers::heartbeat::HeartbeatListener;
use crate::storage::database::Database;
use crate::storage::memory::ServerRegistry;

// Process-wide state threaded through sessions and the heartbeat listener.
pub struct AppContext {
    pub config: Config,
    pub registry: ServerRegistry,
    pub database: Database,
    pub next_session_id: AtomicU64,
    pub active_sessions: AtomicUsize,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger only once at the start
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    dotenv::dotenv().ok();
    let config = Config::from_env();

    // The connection string is built exactly once; a database we cannot
    // reach at startup is fatal.
    let database = match Database::connect(&config.connection_string()).await {
        Ok(database) => database,
        Err(e) => {
            error!("Failed to connect to the master database: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                e.to_string(),
            ));
        }
    };

    let ctx = Arc::new(AppContext {
        registry: ServerRegistry::new(),
        database,
        next_session_id: AtomicU64::new(1),
        active_sessions: AtomicUsize::new(0),
        config: config.clone(),
    });

    // Heartbeat listener feeding the registry.
    let heartbeat_socket = UdpSocket::bind(config.heartbeat_endpoint()).await?;
    info!("Heartbeat listener on {}", config.heartbeat_endpoint());
    tokio::spawn(HeartbeatListener::new(ctx.clone()).run(heartbeat_socket));

    // Servers that stop reporting go offline and drop out of the registry.
    let evict_ctx = ctx.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            ticker.tick().await;
            let evicted = evict_ctx
                .registry
                .evict_stale(evict_ctx.config.server_timeout_secs);
            for server in evicted {
                info!("Evicting stale server {}:{}", server.ip, server.query_port);
                evict_ctx.database.mark_offline(&server).await;
            }
        }
    });

    let listener = TcpListener::bind(config.bind_endpoint()).await?;
    info!("Master server listening on {}", config.bind_endpoint());

    let query_limiter: RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock> =
        RateLimiter::keyed(config.query_quota());

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Accept failed: {}", e);
                continue;
            }
        };
        if query_limiter.check_key(&peer.ip()).is_err() {
            warn!("Rate limit exceeded for server list from {}", peer.ip());
            continue; // dropping the stream closes the connection
        }
        tokio::spawn(Session::new(stream, peer, ctx.clone()).run());
    }
}
