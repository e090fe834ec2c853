//! Priority task broker.
//!
//! Usage:
//!     broker --bind 0.0.0.0:5000 --persistence-file tasks.json
//!
//! Requires `BROKER_SECRET_KEY` (base64, 32 bytes) in the environment.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use socket2::{Domain, Socket, Type};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use broker_protocol::SecretKey;
use broker_queue::TaskQueue;
use broker_registry::WorkerRegistry;

use broker::config::{Args, LISTEN_BACKLOG, SECRET_KEY_ENV_VAR};
use broker::dispatcher::{self, SharedState};
use broker::stats::Stats;
use broker::sweeper;

/// Bind with address-reuse and an explicit listen backlog, which plain
/// `TcpListener::bind` does not expose.
fn bind_listener(addr: &str) -> Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("{addr} is not a valid socket address"))?;
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)
        .context("creating listener socket")?;
    socket.set_reuse_address(true).context("setting SO_REUSEADDR")?;
    socket.bind(&addr.into()).with_context(|| format!("binding listener on {addr}"))?;
    socket
        .listen(LISTEN_BACKLOG as i32)
        .context("listening on socket")?;
    socket.set_nonblocking(true).context("setting socket non-blocking")?;
    TcpListener::from_std(socket.into()).context("handing socket to the async runtime")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "broker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let key_b64 = std::env::var(SECRET_KEY_ENV_VAR)
        .with_context(|| format!("{SECRET_KEY_ENV_VAR} must be set (base64, 32 bytes)"))?;
    let key = SecretKey::from_base64(&key_b64)
        .with_context(|| format!("{SECRET_KEY_ENV_VAR} is not a valid 32-byte base64 key"))?;

    let queue = Arc::new(
        TaskQueue::load(args.persistence_file.clone())
            .with_context(|| format!("loading persisted tasks from {:?}", args.persistence_file))?,
    );
    let registry = Arc::new(WorkerRegistry::new());
    let stats = Arc::new(Stats::new());

    let state = Arc::new(SharedState {
        queue: Arc::clone(&queue),
        registry: Arc::clone(&registry),
        stats: Arc::clone(&stats),
        key,
    });

    let listener = bind_listener(&args.bind)?;
    tracing::info!(bind = %args.bind, persistence_file = ?args.persistence_file, "broker listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let heartbeat_task = tokio::spawn(sweeper::heartbeat_sweep(
        Arc::clone(&registry),
        Duration::from_secs(args.heartbeat_interval_secs),
        args.liveness_window_secs as f64,
        shutdown_rx.clone(),
    ));
    let stats_task = tokio::spawn(sweeper::stats_sweep(
        Arc::clone(&stats),
        Duration::from_secs(args.stats_interval_secs),
        shutdown_rx.clone(),
    ));

    let mut connections = tokio::task::JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "accepted connection");
                        let state = Arc::clone(&state);
                        connections.spawn(dispatcher::handle_connection(stream, peer, state));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to accept connection");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received, draining connections");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = heartbeat_task.await;
    let _ = stats_task.await;

    // Bounded wait for in-flight handlers.
    let drain = tokio::time::timeout(Duration::from_secs(5), async {
        while connections.join_next().await.is_some() {}
    });
    if drain.await.is_err() {
        tracing::warn!("timed out waiting for in-flight connections to finish");
    }

    Ok(())
}
