use thiserror::Error;
use wrgl_types::ObjectSum;

fn short_list(sums: &[ObjectSum]) -> String {
    sums.iter()
        .map(ObjectSum::short_hex)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// Wants that are not reachable from any ref, or whose table is missing.
    #[error("unrecognized wants: {}", short_list(.0))]
    UnrecognizedWants(Vec<ObjectSum>),

    /// Commits that would be sent or accepted without their table.
    #[error("shallow commits: {}", short_list(.0))]
    ShallowCommit(Vec<ObjectSum>),

    /// Tables requested by object sync that this side does not have.
    #[error("unknown tables: {}", short_list(.0))]
    UnknownTables(Vec<ObjectSum>),

    #[error("commit {commit} references missing parent {parent}")]
    MissingParent { commit: ObjectSum, parent: ObjectSum },

    #[error("table {table} references missing block {block}")]
    MissingBlock { table: ObjectSum, block: ObjectSum },

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("remote returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("store error: {0}")]
    Store(#[from] wrgl_objects::StoreError),

    #[error("ref error: {0}")]
    Refs(#[from] wrgl_refs::RefError),

    #[error("dag error: {0}")]
    Dag(#[from] wrgl_dag::DagError),

    #[error("pack error: {0}")]
    Pack(#[from] wrgl_pack::PackError),

    #[error("wire error: {0}")]
    Wire(#[from] wrgl_protocol::ProtocolError),
}

impl SyncError {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Errors caused by the request rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnrecognizedWants(_) | Self::ShallowCommit(_) | Self::UnknownTables(_)
        )
    }

    /// Whether a session that failed with this error can take a retry.
    pub fn keeps_session(&self) -> bool {
        matches!(self, Self::UnrecognizedWants(_))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
