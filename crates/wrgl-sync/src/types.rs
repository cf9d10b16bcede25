use std::collections::BTreeMap;

use wrgl_types::ObjectSum;

/// Flush threshold for a single packfile body.
pub const DEFAULT_MAX_PACKFILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Commit haves a fetching client offers per round.
pub const DEFAULT_HAVES_PER_ROUND: usize = 256;

/// Candidate tables advertised per table-negotiation round.
pub const DEFAULT_TABLE_HAVES_PER_ROUND: usize = 256;

/// Rounds after which the finder stops waiting for `done`.
pub const DEFAULT_MAX_NEGOTIATION_ROUNDS: u32 = 64;

/// Server-side knobs shared by upload-pack and receive-pack sessions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    pub max_packfile_size: u64,
    pub table_haves_per_round: usize,
    pub max_negotiation_rounds: u32,
    pub deny_deletes: bool,
    pub deny_non_fast_forwards: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_packfile_size: DEFAULT_MAX_PACKFILE_SIZE,
            table_haves_per_round: DEFAULT_TABLE_HAVES_PER_ROUND,
            max_negotiation_rounds: DEFAULT_MAX_NEGOTIATION_ROUNDS,
            deny_deletes: false,
            deny_non_fast_forwards: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchOptions {
    /// Number of commits from each want that receive their table. Zero
    /// fetches every table.
    pub depth: u32,
    pub haves_per_round: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            depth: 0,
            haves_per_round: DEFAULT_HAVES_PER_ROUND,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushOptions {
    pub max_packfile_size: u64,
    pub table_haves_per_round: usize,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            max_packfile_size: DEFAULT_MAX_PACKFILE_SIZE,
            table_haves_per_round: DEFAULT_TABLE_HAVES_PER_ROUND,
        }
    }
}

/// Objects persisted by an [`ObjectReceiver`](crate::ObjectReceiver).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    pub commits: usize,
    pub tables: usize,
    pub blocks: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchResult {
    pub received: ReceiveStats,
    /// Remote-tracking refs that moved, with their new sums.
    pub refs_updated: BTreeMap<String, ObjectSum>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PushResult {
    pub objects_sent: usize,
    /// Remote refs that were written or deleted.
    pub refs_updated: Vec<String>,
    /// Remote refs the server refused, with its reason.
    pub rejected: BTreeMap<String, String>,
}
