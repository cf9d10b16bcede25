use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wrgl_sync::{
    SessionOptions, DEFAULT_MAX_NEGOTIATION_ROUNDS, DEFAULT_MAX_PACKFILE_SIZE,
    DEFAULT_TABLE_HAVES_PER_ROUND,
};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Flush threshold for one packfile response.
    pub max_packfile_size: u64,
    /// Idle lifetime of an upload-pack or receive-pack session.
    pub session_ttl_secs: u64,
    pub deny_deletes: bool,
    pub deny_non_fast_forwards: bool,
    pub table_haves_per_round: usize,
    pub max_negotiation_rounds: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_packfile_size: DEFAULT_MAX_PACKFILE_SIZE,
            session_ttl_secs: wrgl_protocol::SESSION_MAX_AGE_SECS,
            deny_deletes: false,
            deny_non_fast_forwards: false,
            table_haves_per_round: DEFAULT_TABLE_HAVES_PER_ROUND,
            max_negotiation_rounds: DEFAULT_MAX_NEGOTIATION_ROUNDS,
        }
    }
}

impl ServerConfig {
    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Largest request body accepted. A packfile may run past the flush
    /// threshold by one object, and gzip can grow incompressible input
    /// slightly, so the limit is twice the packfile size plus 1 MiB.
    pub fn max_request_body(&self) -> usize {
        let limit = self
            .max_packfile_size
            .saturating_mul(2)
            .saturating_add(1 << 20);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            max_packfile_size: self.max_packfile_size,
            table_haves_per_round: self.table_haves_per_round,
            max_negotiation_rounds: self.max_negotiation_rounds,
            deny_deletes: self.deny_deletes,
            deny_non_fast_forwards: self.deny_non_fast_forwards,
        }
    }
}
