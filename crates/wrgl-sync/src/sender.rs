use std::collections::{HashSet, VecDeque};
use std::io::Write;
use std::sync::Arc;

use tracing::debug;
use wrgl_objects::{Commit, ObjectStore, Table};
use wrgl_pack::{encoded_len, ObjectType, PackfileWriter};
use wrgl_types::ObjectSum;

use crate::error::{SyncError, SyncResult};

enum Pending {
    Commit(ObjectSum),
    Table(ObjectSum),
}

/// Streams a negotiated closure into one or more size-bounded packfiles.
///
/// Each commit is preceded by its table and that table's blocks, unless the
/// other side already has them. Tables and blocks go out at most once.
pub struct ObjectSender {
    db: Arc<dyn ObjectStore>,
    pending: VecDeque<Pending>,
    objects: VecDeque<(ObjectType, Vec<u8>)>,
    tables_to_send: HashSet<ObjectSum>,
    common_tables: HashSet<ObjectSum>,
    common_blocks: HashSet<ObjectSum>,
    max_packfile_size: u64,
    sent: usize,
}

impl ObjectSender {
    /// Prepare to send `commits` (parents first). Only tables listed in
    /// `tables_to_send` travel with their commits; tables and blocks of
    /// `common_commits` are assumed present on the other side.
    pub fn new(
        db: Arc<dyn ObjectStore>,
        commits: Vec<ObjectSum>,
        tables_to_send: impl IntoIterator<Item = ObjectSum>,
        common_commits: &[ObjectSum],
        max_packfile_size: u64,
    ) -> SyncResult<Self> {
        let mut sender = Self::empty(db, max_packfile_size);
        sender.tables_to_send = tables_to_send.into_iter().collect();
        sender.pending = commits.into_iter().map(Pending::Commit).collect();
        for sum in common_commits {
            let commit = sender.db.get_commit(sum)?;
            if sender.db.table_exists(&commit.table)? {
                sender.add_common_table(commit.table)?;
            }
        }
        Ok(sender)
    }

    /// Prepare to send bare tables with their blocks and no commits.
    pub fn for_tables(
        db: Arc<dyn ObjectStore>,
        tables: impl IntoIterator<Item = ObjectSum>,
        max_packfile_size: u64,
    ) -> Self {
        let mut sender = Self::empty(db, max_packfile_size);
        sender.pending = tables.into_iter().map(Pending::Table).collect();
        sender
    }

    fn empty(db: Arc<dyn ObjectStore>, max_packfile_size: u64) -> Self {
        Self {
            db,
            pending: VecDeque::new(),
            objects: VecDeque::new(),
            tables_to_send: HashSet::new(),
            common_tables: HashSet::new(),
            common_blocks: HashSet::new(),
            max_packfile_size,
            sent: 0,
        }
    }

    /// Mark tables the other side acknowledged during table negotiation.
    pub fn add_common_tables(&mut self, tables: &[ObjectSum]) -> SyncResult<()> {
        for sum in tables {
            if self.db.table_exists(sum)? {
                self.add_common_table(*sum)?;
            } else {
                self.common_tables.insert(*sum);
            }
        }
        Ok(())
    }

    fn add_common_table(&mut self, sum: ObjectSum) -> SyncResult<()> {
        if self.common_tables.insert(sum) {
            let table = self.db.get_table(&sum)?;
            self.common_blocks.extend(table.blocks);
        }
        Ok(())
    }

    /// Number of objects written so far.
    pub fn objects_sent(&self) -> usize {
        self.sent
    }

    /// `true` once every object has been written.
    pub fn is_done(&self) -> bool {
        self.pending.is_empty() && self.objects.is_empty()
    }

    /// Write records until the next one would push this packfile past the
    /// size limit. A record larger than the limit is written alone.
    ///
    /// Returns `true` once every object has been written.
    pub fn write_objects<W: Write>(&mut self, writer: &mut PackfileWriter<W>) -> SyncResult<bool> {
        let mut size = 0u64;
        loop {
            let Some((_, data)) = self.objects.front() else {
                if self.enqueue_next()? {
                    continue;
                }
                debug!(bytes = size, sent = self.sent, "all objects written");
                return Ok(true);
            };
            let n = encoded_len(data.len()) as u64;
            if size > 0 && size + n > self.max_packfile_size {
                debug!(bytes = size, sent = self.sent, "packfile full");
                return Ok(false);
            }
            if let Some((ty, data)) = self.objects.pop_front() {
                writer.write_object(ty, &data)?;
                size += n;
                self.sent += 1;
            }
        }
    }

    /// Write the next packfile into memory.
    pub fn write_packfile(&mut self) -> SyncResult<(Vec<u8>, bool)> {
        let mut writer = PackfileWriter::new(Vec::new())?;
        let done = self.write_objects(&mut writer)?;
        Ok((writer.into_inner(), done))
    }

    /// Serialize the next pending commit or table. Returns `false` when
    /// nothing is left.
    fn enqueue_next(&mut self) -> SyncResult<bool> {
        match self.pending.pop_front() {
            Some(Pending::Commit(sum)) => {
                let data = self.db.get_commit_bytes(&sum)?;
                let commit = Commit::decode(&data)?;
                if self.tables_to_send.contains(&commit.table)
                    && !self.common_tables.contains(&commit.table)
                {
                    self.enqueue_table(commit.table)?;
                }
                self.objects.push_back((ObjectType::Commit, data));
                Ok(true)
            }
            Some(Pending::Table(sum)) => {
                if !self.common_tables.contains(&sum) {
                    self.enqueue_table(sum)?;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn enqueue_table(&mut self, sum: ObjectSum) -> SyncResult<()> {
        let data = self.db.get_table_bytes(&sum)?;
        let table = Table::decode(&data)?;
        for block in &table.blocks {
            if self.common_blocks.insert(*block) {
                let bytes = self.db.get_block_bytes(block)?;
                self.objects.push_back((ObjectType::Block, bytes));
            }
        }
        self.common_tables.insert(sum);
        self.objects.push_back((ObjectType::Table, data));
        Ok(())
    }
}

/// Pack the requested tables with their blocks into a single packfile.
///
/// Fails with [`SyncError::UnknownTables`] if any table is missing.
pub fn pack_tables(db: Arc<dyn ObjectStore>, tables: &[ObjectSum]) -> SyncResult<Vec<u8>> {
    let mut unknown = Vec::new();
    for sum in tables {
        if !db.table_exists(sum)? {
            unknown.push(*sum);
        }
    }
    if !unknown.is_empty() {
        return Err(SyncError::UnknownTables(unknown));
    }
    let mut sender = ObjectSender::for_tables(db, tables.iter().copied(), u64::MAX);
    let (bytes, _) = sender.write_packfile()?;
    debug!(tables = tables.len(), objects = sender.objects_sent(), "packed tables");
    Ok(bytes)
}
