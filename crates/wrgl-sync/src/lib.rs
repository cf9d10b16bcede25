//! Object synchronization between wrgl repositories.
//!
//! A fetch runs an upload-pack session and a push runs a receive-pack
//! session. Both negotiate the closed set of commits, tables and blocks the
//! other side lacks, then move it in size-bounded packfiles. Sessions are
//! plain state machines stepped once per request, so the same code serves
//! in-process transports and the HTTP server.

pub mod error;
pub mod fetch;
pub mod finder;
pub mod push;
pub mod receive_pack;
pub mod receiver;
pub mod sender;
pub mod transport;
pub mod types;
pub mod upload_pack;

#[cfg(test)]
mod testing;

pub use error::{SyncError, SyncResult};
pub use fetch::{fetch, fetch_objects, fetch_tables, save_fetched_refs};
pub use finder::ClosedSetsFinder;
pub use push::push;
pub use receive_pack::{PushStep, ReceivePackClient, ReceivePackSession, ReceivePackState};
pub use receiver::ObjectReceiver;
pub use sender::{pack_tables, ObjectSender};
pub use transport::{LocalTransport, RemoteTransport};
pub use types::{
    FetchOptions, FetchResult, PushOptions, PushResult, ReceiveStats, SessionOptions,
    DEFAULT_HAVES_PER_ROUND, DEFAULT_MAX_NEGOTIATION_ROUNDS, DEFAULT_MAX_PACKFILE_SIZE,
    DEFAULT_TABLE_HAVES_PER_ROUND,
};
pub use upload_pack::{UploadPackClient, UploadPackSession, UploadPackState};
