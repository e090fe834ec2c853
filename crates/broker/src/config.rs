//! Broker configuration.
//!
//! Task-handling behavior has no flags — the wire protocol's semantics are
//! compiled in. These flags only override operational defaults (bind
//! address, persistence path, sweep intervals).

use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_PERSISTENCE_FILE: &str = "tasks.json";
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_LIVENESS_WINDOW_SECS: u64 = 30;
pub const DEFAULT_STATS_INTERVAL_SECS: u64 = 60;
pub const LISTEN_BACKLOG: u32 = 100;

/// Environment variable carrying the shared symmetric secret (base64,
/// 32 bytes). Required — the key is stable and externally provisioned,
/// never generated or rotated by the broker itself.
pub const SECRET_KEY_ENV_VAR: &str = "BROKER_SECRET_KEY";

#[derive(Parser, Debug, Clone)]
#[command(name = "broker", about = "Priority task broker")]
pub struct Args {
    /// Address to bind the TCP listener on.
    #[arg(long, default_value = DEFAULT_BIND_ADDR)]
    pub bind: String,

    /// Path to the task persistence file.
    #[arg(long, default_value = DEFAULT_PERSISTENCE_FILE)]
    pub persistence_file: PathBuf,

    /// Seconds between heartbeat sweeps.
    #[arg(long, default_value_t = DEFAULT_HEARTBEAT_INTERVAL_SECS)]
    pub heartbeat_interval_secs: u64,

    /// Seconds of silence before a worker is considered dead.
    #[arg(long, default_value_t = DEFAULT_LIVENESS_WINDOW_SECS)]
    pub liveness_window_secs: u64,

    /// Seconds between stats sweeps.
    #[arg(long, default_value_t = DEFAULT_STATS_INTERVAL_SECS)]
    pub stats_interval_secs: u64,
}
