use crate::provider::PicsumProvider;
use crate::store::{LogStore, StoreError};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server settings, read from flags with environment fallbacks.
#[derive(Debug, Clone, Parser)]
#[command(name = "heartfeed", version, about = "Image feed with hearts over an append-only log")]
pub struct Config {
    /// Directory holding the event log, archive and snapshots.
    #[arg(long, env = "HEARTFEED_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Address the HTTP server binds to.
    #[arg(long, env = "HEARTFEED_ADDR", default_value = "127.0.0.1:3000")]
    pub addr: SocketAddr,

    /// Rotate the active log into the archive past this many bytes (0 = never).
    #[arg(long, env = "HEARTFEED_MAX_LOG_SIZE", default_value_t = 10_000_000)]
    pub max_log_size: u64,

    /// Checkpoint the feed table after this many writes.
    #[arg(long, env = "HEARTFEED_SNAPSHOT_EVERY", default_value_t = 64)]
    pub snapshot_every: u64,

    /// Simulated latency of the image provider, in milliseconds.
    #[arg(long, env = "HEARTFEED_GENERATE_LATENCY_MS", default_value_t = 500)]
    pub generate_latency_ms: u64,
}

impl Config {
    pub fn open_store(&self) -> Result<LogStore, StoreError> {
        LogStore::builder(&self.data_dir)
            .max_log_size(self.max_log_size)
            .snapshot_every(self.snapshot_every)
            .open()
    }

    pub fn provider(&self) -> PicsumProvider {
        PicsumProvider::new(Duration::from_millis(self.generate_latency_ms))
    }
}
