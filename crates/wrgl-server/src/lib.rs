//! HTTP server for wrgl sync.
//!
//! Serves a repository's refs and objects, and hosts upload-pack and
//! receive-pack sessions. A session spans several requests and is found
//! again through a cookie; idle sessions expire from a TTL store.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod ttl;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use router::build_router;
pub use server::WrglServer;
pub use ttl::TtlCache;
