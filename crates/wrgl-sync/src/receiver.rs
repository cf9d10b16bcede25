use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

use tracing::{debug, warn};
use wrgl_objects::{index_table, Block, Commit, ObjectKind, ObjectStore, StoredObject, Table};
use wrgl_pack::{ObjectType, PackfileReader};
use wrgl_types::ObjectSum;

use crate::error::{SyncError, SyncResult};
use crate::types::ReceiveStats;

/// Persists the objects of incoming packfiles.
///
/// Referential integrity is checked per record: a table is only accepted
/// once its blocks are present and a commit once its parents are.
pub struct ObjectReceiver {
    db: Arc<dyn ObjectStore>,
    expected_commits: HashSet<ObjectSum>,
    require_tables: bool,
    stats: ReceiveStats,
}

impl ObjectReceiver {
    /// `expected_commits` are the commits whose arrival completes the
    /// transfer.
    pub fn new(
        db: Arc<dyn ObjectStore>,
        expected_commits: impl IntoIterator<Item = ObjectSum>,
    ) -> Self {
        Self {
            db,
            expected_commits: expected_commits.into_iter().collect(),
            require_tables: false,
            stats: ReceiveStats::default(),
        }
    }

    /// Reject commits whose table is not present by the time they arrive.
    pub fn require_tables(mut self, require: bool) -> Self {
        self.require_tables = require;
        self
    }

    /// Read one packfile to the end. Returns `true` once every expected
    /// commit has arrived.
    pub fn receive<R: Read>(&mut self, packfile: R) -> SyncResult<bool> {
        let mut reader = PackfileReader::new(packfile)?;
        while let Some((ty, data)) = reader.read_object()? {
            match ty {
                ObjectType::Block => self.save_block(data)?,
                ObjectType::Table => self.save_table(data)?,
                ObjectType::Commit => self.save_commit(data)?,
            }
        }
        debug!(
            commits = self.stats.commits,
            tables = self.stats.tables,
            blocks = self.stats.blocks,
            remaining = self.expected_commits.len(),
            "packfile received"
        );
        Ok(self.is_done())
    }

    pub fn is_done(&self) -> bool {
        self.expected_commits.is_empty()
    }

    pub fn stats(&self) -> ReceiveStats {
        self.stats
    }

    fn save_block(&mut self, data: Vec<u8>) -> SyncResult<()> {
        Block::decode(&data)?;
        self.db.write(&StoredObject::new(ObjectKind::Block, data))?;
        self.stats.blocks += 1;
        Ok(())
    }

    fn save_table(&mut self, data: Vec<u8>) -> SyncResult<()> {
        let table = Table::decode(&data)?;
        let object = StoredObject::new(ObjectKind::Table, data);
        let sum = object.compute_sum();
        for block in &table.blocks {
            if !self.db.block_exists(block)? {
                return Err(SyncError::MissingBlock {
                    table: sum,
                    block: *block,
                });
            }
        }
        self.db.write(&object)?;
        index_table(self.db.as_ref(), &sum, &table)?;
        self.stats.tables += 1;
        Ok(())
    }

    fn save_commit(&mut self, data: Vec<u8>) -> SyncResult<()> {
        let commit = Commit::decode(&data)?;
        let object = StoredObject::new(ObjectKind::Commit, data);
        let sum = object.compute_sum();
        for parent in &commit.parents {
            if !self.db.commit_exists(parent)? {
                return Err(SyncError::MissingParent {
                    commit: sum,
                    parent: *parent,
                });
            }
        }
        if self.require_tables && !self.db.table_exists(&commit.table)? {
            warn!(
                commit = %sum.short_hex(),
                table = %commit.table.short_hex(),
                "commit arrived without its table"
            );
            return Err(SyncError::ShallowCommit(vec![sum]));
        }
        self.db.write(&object)?;
        self.expected_commits.remove(&sum);
        self.stats.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::ObjectSender;
    use crate::testing::Repo;
    use wrgl_pack::PackfileWriter;

    fn packfile(repo: &Repo, commits: &[ObjectSum], with_tables: bool) -> Vec<u8> {
        let tables: Vec<_> = if with_tables {
            commits.iter().map(|c| repo.table_of(c)).collect()
        } else {
            Vec::new()
        };
        let mut sender =
            ObjectSender::new(repo.db(), commits.to_vec(), tables, &[], u64::MAX).unwrap();
        sender.write_packfile().unwrap().0
    }

    #[test]
    fn receives_history_and_indexes_tables() {
        let src = Repo::new();
        let c = src.chain(3);
        let dst = Repo::new();
        let mut receiver = ObjectReceiver::new(dst.db(), [c[2]]);
        assert!(receiver.receive(packfile(&src, &c, true).as_slice()).unwrap());
        for sum in &c {
            let table = dst.db.get_table(&dst.table_of(sum)).unwrap();
            for idx in &table.block_indices {
                assert!(dst.db.get_block_index(idx).is_ok());
            }
        }
        assert_eq!(
            receiver.stats(),
            ReceiveStats {
                commits: 3,
                tables: 3,
                blocks: 3
            }
        );
    }

    #[test]
    fn not_done_until_expected_commits_arrive() {
        let src = Repo::new();
        let c = src.chain(2);
        let dst = Repo::new();
        let mut receiver = ObjectReceiver::new(dst.db(), [c[1]]);
        assert!(!receiver.receive(packfile(&src, &c[..1], true).as_slice()).unwrap());
        assert!(receiver.receive(packfile(&src, &c[1..], true).as_slice()).unwrap());
    }

    #[test]
    fn missing_parent_fails_fast() {
        let src = Repo::new();
        let c = src.chain(2);
        let dst = Repo::new();
        let mut receiver = ObjectReceiver::new(dst.db(), [c[1]]);
        let err = receiver
            .receive(packfile(&src, &c[1..], true).as_slice())
            .unwrap_err();
        assert!(matches!(err, SyncError::MissingParent { commit, parent } if commit == c[1] && parent == c[0]));
        assert!(!dst.db.commit_exists(&c[1]).unwrap());
    }

    #[test]
    fn table_without_blocks_is_rejected() {
        let src = Repo::new();
        let c = src.commit(&[]);
        let table = src.table_of(&c);
        let mut writer = PackfileWriter::new(Vec::new()).unwrap();
        writer
            .write_object(ObjectType::Table, &src.db.get_table_bytes(&table).unwrap())
            .unwrap();
        let dst = Repo::new();
        let mut receiver = ObjectReceiver::new(dst.db(), Vec::new());
        assert!(matches!(
            receiver.receive(writer.into_inner().as_slice()),
            Err(SyncError::MissingBlock { .. })
        ));
    }

    #[test]
    fn shallow_commits_allowed_unless_tables_required() {
        let src = Repo::new();
        let c = src.commit(&[]);
        let bytes = packfile(&src, &[c], false);

        let dst = Repo::new();
        let mut receiver = ObjectReceiver::new(dst.db(), [c]);
        assert!(receiver.receive(bytes.as_slice()).unwrap());
        assert!(!dst.db.table_exists(&src.table_of(&c)).unwrap());

        let dst = Repo::new();
        let mut receiver = ObjectReceiver::new(dst.db(), [c]).require_tables(true);
        assert!(matches!(
            receiver.receive(bytes.as_slice()),
            Err(SyncError::ShallowCommit(ref s)) if s == &vec![c]
        ));
        assert!(!dst.db.commit_exists(&c).unwrap());
    }

    #[test]
    fn corrupt_block_is_rejected() {
        let mut writer = PackfileWriter::new(Vec::new()).unwrap();
        writer.write_object(ObjectType::Block, b"not zstd").unwrap();
        let dst = Repo::new();
        let mut receiver = ObjectReceiver::new(dst.db(), Vec::new());
        assert!(matches!(
            receiver.receive(writer.into_inner().as_slice()),
            Err(SyncError::Store(_))
        ));
    }
}
