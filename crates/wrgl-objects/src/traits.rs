use wrgl_types::ObjectSum;

use crate::error::{StoreError, StoreResult};
use crate::object::{Block, BlockIndex, Commit, ObjectKind, StoredObject, Table};

/// Content-addressed object store.
///
/// Implementations provide the four raw operations; the typed accessors
/// (`get_commit`, `save_table`, `block_exists`, ...) are layered on top and
/// check the stored kind on every read.
///
/// Implementations must satisfy:
/// - Objects are immutable once written; writing the same bytes twice is a
///   no-op.
/// - Each key is individually atomic. The store offers no multi-object
///   transactions.
pub trait ObjectStore: Send + Sync {
    /// Read an object by sum. Returns `Ok(None)` if it does not exist.
    fn read(&self, sum: &ObjectSum) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its sum.
    fn write(&self, object: &StoredObject) -> StoreResult<ObjectSum>;

    /// Check whether an object exists, whatever its kind.
    fn exists(&self, sum: &ObjectSum) -> StoreResult<bool>;

    /// Delete an object by sum. Returns `true` if the object existed.
    fn delete(&self, sum: &ObjectSum) -> StoreResult<bool>;

    /// Read the encoded bytes of an object, requiring a specific kind.
    fn read_kind(&self, sum: &ObjectSum, kind: ObjectKind) -> StoreResult<Vec<u8>> {
        match self.read(sum)? {
            Some(obj) if obj.kind == kind => Ok(obj.data),
            Some(obj) => Err(StoreError::KindMismatch {
                sum: *sum,
                expected: kind,
                actual: obj.kind,
            }),
            None => Err(StoreError::NotFound(*sum)),
        }
    }

    /// Whether an object of the given kind exists under `sum`.
    fn exists_kind(&self, sum: &ObjectSum, kind: ObjectKind) -> StoreResult<bool> {
        Ok(matches!(self.read(sum)?, Some(obj) if obj.kind == kind))
    }

    fn get_commit(&self, sum: &ObjectSum) -> StoreResult<Commit> {
        Commit::decode(&self.read_kind(sum, ObjectKind::Commit)?)
    }

    fn get_commit_bytes(&self, sum: &ObjectSum) -> StoreResult<Vec<u8>> {
        self.read_kind(sum, ObjectKind::Commit)
    }

    fn save_commit(&self, commit: &Commit) -> StoreResult<ObjectSum> {
        self.write(&commit.to_stored_object()?)
    }

    fn commit_exists(&self, sum: &ObjectSum) -> StoreResult<bool> {
        self.exists_kind(sum, ObjectKind::Commit)
    }

    fn get_table(&self, sum: &ObjectSum) -> StoreResult<Table> {
        Table::decode(&self.read_kind(sum, ObjectKind::Table)?)
    }

    fn get_table_bytes(&self, sum: &ObjectSum) -> StoreResult<Vec<u8>> {
        self.read_kind(sum, ObjectKind::Table)
    }

    fn save_table(&self, table: &Table) -> StoreResult<ObjectSum> {
        self.write(&table.to_stored_object()?)
    }

    fn table_exists(&self, sum: &ObjectSum) -> StoreResult<bool> {
        self.exists_kind(sum, ObjectKind::Table)
    }

    fn get_block(&self, sum: &ObjectSum) -> StoreResult<Block> {
        Block::decode(&self.get_block_bytes(sum)?)
    }

    /// Compressed block bytes, exactly as stored.
    fn get_block_bytes(&self, sum: &ObjectSum) -> StoreResult<Vec<u8>> {
        self.read_kind(sum, ObjectKind::Block)
    }

    fn save_block(&self, block: &Block) -> StoreResult<ObjectSum> {
        self.write(&block.to_stored_object()?)
    }

    fn block_exists(&self, sum: &ObjectSum) -> StoreResult<bool> {
        self.exists_kind(sum, ObjectKind::Block)
    }

    fn get_block_index(&self, sum: &ObjectSum) -> StoreResult<BlockIndex> {
        BlockIndex::decode(&self.read_kind(sum, ObjectKind::BlockIndex)?)
    }

    fn save_block_index(&self, index: &BlockIndex) -> StoreResult<ObjectSum> {
        self.write(&index.to_stored_object()?)
    }
}
