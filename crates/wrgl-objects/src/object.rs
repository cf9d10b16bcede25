use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wrgl_types::ObjectSum;

use crate::error::{StoreError, StoreResult};
use crate::hasher::ContentHasher;

/// Maximum number of rows in a single block.
pub const BLOCK_SIZE: usize = 255;

/// zstd level used when compressing blocks.
const BLOCK_COMPRESSION_LEVEL: i32 = 3;

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Commit,
    Table,
    Block,
    BlockIndex,
}

impl ObjectKind {
    fn hasher(&self) -> &'static ContentHasher {
        match self {
            Self::Commit => &ContentHasher::COMMIT,
            Self::Table => &ContentHasher::TABLE,
            Self::Block => &ContentHasher::BLOCK,
            Self::BlockIndex => &ContentHasher::BLOCK_INDEX,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commit => write!(f, "commit"),
            Self::Table => write!(f, "table"),
            Self::Block => write!(f, "block"),
            Self::BlockIndex => write!(f, "block index"),
        }
    }
}

/// A stored object: kind tag + encoded bytes.
///
/// `StoredObject` is the unit of storage. The encoded bytes are exactly what
/// is hashed into the object's sum and exactly what travels in a packfile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Compute the content-addressed sum for this object.
    pub fn compute_sum(&self) -> ObjectSum {
        self.kind.hasher().hash(&self.data)
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

fn corrupt(kind: ObjectKind, data: &[u8], reason: impl std::fmt::Display) -> StoreError {
    StoreError::CorruptObject {
        sum: kind.hasher().hash(data),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// An immutable snapshot pointer: one table plus its parent commits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub table: ObjectSum,
    pub parents: Vec<ObjectSum>,
    pub author_name: String,
    pub author_email: String,
    pub time: DateTime<Utc>,
    pub message: String,
}

impl Commit {
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        bincode::deserialize(data).map_err(|e| corrupt(ObjectKind::Commit, data, e))
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        Ok(StoredObject::new(ObjectKind::Commit, self.encode()?))
    }

    /// The sum this commit is stored under.
    pub fn sum(&self) -> StoreResult<ObjectSum> {
        Ok(self.to_stored_object()?.compute_sum())
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// One snapshot of a dataset, split into fixed-size blocks.
///
/// `blocks` and `block_indices` are parallel: `block_indices[i]` is the sum of
/// the sorted key index derived from `blocks[i]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    /// Indices into `columns` forming the primary key. Empty means every
    /// column participates.
    pub pk: Vec<u32>,
    pub rows_count: u32,
    pub blocks: Vec<ObjectSum>,
    pub block_indices: Vec<ObjectSum>,
}

impl Table {
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        let table: Table =
            bincode::deserialize(data).map_err(|e| corrupt(ObjectKind::Table, data, e))?;
        if table.blocks.len() != table.block_indices.len() {
            return Err(corrupt(
                ObjectKind::Table,
                data,
                format!(
                    "{} blocks but {} block indices",
                    table.blocks.len(),
                    table.block_indices.len()
                ),
            ));
        }
        if let Some(col) = table.pk.iter().find(|&&c| c as usize >= table.columns.len()) {
            return Err(corrupt(
                ObjectKind::Table,
                data,
                format!("primary key column {col} out of range"),
            ));
        }
        Ok(table)
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        Ok(StoredObject::new(ObjectKind::Table, self.encode()?))
    }

    pub fn sum(&self) -> StoreResult<ObjectSum> {
        Ok(self.to_stored_object()?.compute_sum())
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// Up to [`BLOCK_SIZE`] rows of a table. Stored zstd-compressed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub rows: Vec<Vec<String>>,
}

impl Block {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Serialize and compress.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let raw = bincode::serialize(self)?;
        zstd::encode_all(raw.as_slice(), BLOCK_COMPRESSION_LEVEL)
            .map_err(|e| StoreError::Compression(e.to_string()))
    }

    /// Decompress, decode and validate the row layout.
    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        let raw = zstd::decode_all(data).map_err(|e| corrupt(ObjectKind::Block, data, e))?;
        let block: Block =
            bincode::deserialize(&raw).map_err(|e| corrupt(ObjectKind::Block, data, e))?;
        block
            .validate()
            .map_err(|reason| corrupt(ObjectKind::Block, data, reason))?;
        Ok(block)
    }

    fn validate(&self) -> Result<(), String> {
        if self.rows.is_empty() {
            return Err("block has no rows".into());
        }
        if self.rows.len() > BLOCK_SIZE {
            return Err(format!("block has {} rows, max {BLOCK_SIZE}", self.rows.len()));
        }
        let width = self.rows[0].len();
        if let Some(i) = self.rows.iter().position(|r| r.len() != width) {
            return Err(format!("row {i} has {} cells, expected {width}", self.rows[i].len()));
        }
        Ok(())
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        Ok(StoredObject::new(ObjectKind::Block, self.encode()?))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// BlockIndex
// ---------------------------------------------------------------------------

/// Sorted primary-key index over the rows of one block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIndex {
    /// `(row key sum, row offset)` sorted by key.
    pub entries: Vec<(ObjectSum, u8)>,
}

impl BlockIndex {
    /// Derive the index for `block` keyed on the `pk` columns.
    pub fn from_block(block: &Block, pk: &[u32]) -> Self {
        let mut entries: Vec<(ObjectSum, u8)> = block
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| (row_key(row, pk), i as u8))
            .collect();
        entries.sort();
        Self { entries }
    }

    /// Row offset of the given key, if present.
    pub fn lookup(&self, key: &ObjectSum) -> Option<u8> {
        self.entries
            .binary_search_by(|(k, _)| k.cmp(key))
            .ok()
            .map(|i| self.entries[i].1)
    }

    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        bincode::deserialize(data).map_err(|e| corrupt(ObjectKind::BlockIndex, data, e))
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        Ok(StoredObject::new(ObjectKind::BlockIndex, self.encode()?))
    }
}

/// Hash of the primary-key cells of a row (all cells when `pk` is empty).
pub fn row_key(row: &[String], pk: &[u32]) -> ObjectSum {
    let mut buf = Vec::new();
    let mut push = |cell: &str| {
        buf.extend_from_slice(&(cell.len() as u64).to_be_bytes());
        buf.extend_from_slice(cell.as_bytes());
    };
    if pk.is_empty() {
        row.iter().for_each(|c| push(c.as_str()));
    } else {
        pk.iter()
            .filter_map(|&i| row.get(i as usize))
            .for_each(|c| push(c.as_str()));
    }
    ContentHasher::ROW.hash(&buf)
}
