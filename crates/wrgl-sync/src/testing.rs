//! Repository fixtures shared by the unit tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use wrgl_objects::{build_table, Commit, InMemoryObjectStore, ObjectKind, ObjectStore};
use wrgl_refs::{InMemoryRefStore, RefStore};
use wrgl_types::ObjectSum;

static CLOCK: AtomicI64 = AtomicI64::new(1_600_000_000);

pub(crate) struct Repo {
    pub db: Arc<InMemoryObjectStore>,
    pub refs: Arc<InMemoryRefStore>,
}

impl Repo {
    pub fn new() -> Self {
        Self {
            db: Arc::new(InMemoryObjectStore::new()),
            refs: Arc::new(InMemoryRefStore::new()),
        }
    }

    pub fn db(&self) -> Arc<dyn ObjectStore> {
        self.db.clone()
    }

    pub fn refs(&self) -> Arc<dyn RefStore> {
        self.refs.clone()
    }

    /// Commit a fresh table of `n` rows unique to this commit.
    pub fn commit_rows(&self, parents: &[ObjectSum], n: usize) -> ObjectSum {
        let ts = CLOCK.fetch_add(1, Ordering::SeqCst);
        let rows = (0..n)
            .map(|i| vec![format!("{ts}-{i}"), format!("value {i}")])
            .collect();
        let table = build_table(
            self.db.as_ref(),
            vec!["id".into(), "value".into()],
            vec![0],
            rows,
        )
        .unwrap();
        self.commit_table(parents, table)
    }

    pub fn commit(&self, parents: &[ObjectSum]) -> ObjectSum {
        self.commit_rows(parents, 3)
    }

    /// Commit an existing table.
    pub fn commit_table(&self, parents: &[ObjectSum], table: ObjectSum) -> ObjectSum {
        let ts = CLOCK.fetch_add(1, Ordering::SeqCst);
        self.db
            .save_commit(&Commit {
                table,
                parents: parents.to_vec(),
                author_name: "John Doe".into(),
                author_email: "john@domain.com".into(),
                time: Utc.timestamp_opt(ts, 0).unwrap(),
                message: format!("commit at {ts}"),
            })
            .unwrap()
    }

    /// A linear history of `n` commits, oldest first.
    pub fn chain(&self, n: usize) -> Vec<ObjectSum> {
        let mut sums: Vec<ObjectSum> = Vec::with_capacity(n);
        for _ in 0..n {
            let parents: Vec<ObjectSum> = sums.last().copied().into_iter().collect();
            sums.push(self.commit(&parents));
        }
        sums
    }

    pub fn table_of(&self, commit: &ObjectSum) -> ObjectSum {
        self.db.get_commit(commit).unwrap().table
    }

    pub fn set_head(&self, branch: &str, sum: ObjectSum) {
        self.refs
            .commit_head(branch, sum, "John Doe", "john@domain.com", "test")
            .unwrap();
    }

    pub fn count(&self, kind: ObjectKind) -> usize {
        self.db.count(kind)
    }
}

/// Copy a table with its blocks and block indices.
pub(crate) fn copy_table(from: &Repo, to: &Repo, table: &ObjectSum) {
    let t = from.db.get_table(table).unwrap();
    for sum in t.blocks.iter().chain(&t.block_indices) {
        to.db.write(&from.db.read(sum).unwrap().unwrap()).unwrap();
    }
    to.db.write(&from.db.read(table).unwrap().unwrap()).unwrap();
}

/// Copy one commit, and its table if `with_table`.
pub(crate) fn copy_commit(from: &Repo, to: &Repo, commit: &ObjectSum, with_table: bool) {
    if with_table {
        copy_table(from, to, &from.table_of(commit));
    }
    to.db.write(&from.db.read(commit).unwrap().unwrap()).unwrap();
}

/// Copy `tip` and every ancestor, with tables.
pub(crate) fn copy_history(from: &Repo, to: &Repo, tip: &ObjectSum) {
    for sum in wrgl_dag::ancestors(from.db.as_ref(), tip).unwrap() {
        copy_commit(from, to, &sum, true);
    }
}
