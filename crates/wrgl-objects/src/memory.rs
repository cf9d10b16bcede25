use std::collections::HashMap;
use std::sync::RwLock;

use wrgl_types::ObjectSum;

use crate::error::StoreResult;
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ObjectStore;

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. All objects are held in memory behind a
/// `RwLock` for safe concurrent access.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectSum, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Number of stored objects of one kind.
    pub fn count(&self, kind: ObjectKind) -> usize {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .filter(|obj| obj.kind == kind)
            .count()
    }

    /// Sorted sums of every stored object of one kind.
    pub fn sums(&self, kind: ObjectKind) -> Vec<ObjectSum> {
        let map = self.objects.read().expect("lock poisoned");
        let mut sums: Vec<ObjectSum> = map
            .iter()
            .filter(|(_, obj)| obj.kind == kind)
            .map(|(sum, _)| *sum)
            .collect();
        sums.sort();
        sums
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, sum: &ObjectSum) -> StoreResult<Option<StoredObject>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(sum).cloned())
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectSum> {
        let sum = object.compute_sum();
        let mut map = self.objects.write().expect("lock poisoned");
        map.entry(sum).or_insert_with(|| object.clone());
        Ok(sum)
    }

    fn exists(&self, sum: &ObjectSum) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(sum))
    }

    fn delete(&self, sum: &ObjectSum) -> StoreResult<bool> {
        let mut map = self.objects.write().expect("lock poisoned");
        Ok(map.remove(sum).is_some())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::object::{Block, Commit, Table};
    use chrono::Utc;

    fn make_commit(table: ObjectSum) -> Commit {
        Commit {
            table,
            parents: vec![],
            author_name: "Alice".into(),
            author_email: "alice@example.com".into(),
            time: Utc::now(),
            message: "commit".into(),
        }
    }

    #[test]
    fn typed_roundtrip() {
        let store = InMemoryObjectStore::new();
        let block = Block::new(vec![vec!["1".into(), "a".into()]]);
        let block_sum = store.save_block(&block).unwrap();
        assert!(store.block_exists(&block_sum).unwrap());
        assert_eq!(store.get_block(&block_sum).unwrap(), block);

        let table = Table {
            columns: vec!["id".into(), "name".into()],
            pk: vec![0],
            rows_count: 1,
            blocks: vec![block_sum],
            block_indices: vec![ObjectSum::digest(b"idx")],
        };
        let table_sum = store.save_table(&table).unwrap();
        assert_eq!(store.get_table(&table_sum).unwrap(), table);

        let commit = make_commit(table_sum);
        let commit_sum = store.save_commit(&commit).unwrap();
        assert_eq!(commit_sum, commit.sum().unwrap());
        assert_eq!(store.get_commit(&commit_sum).unwrap(), commit);
        assert_eq!(store.count(ObjectKind::Commit), 1);
    }

    #[test]
    fn kind_is_checked_on_read() {
        let store = InMemoryObjectStore::new();
        let sum = store.save_commit(&make_commit(ObjectSum::null())).unwrap();
        assert!(store.commit_exists(&sum).unwrap());
        assert!(!store.table_exists(&sum).unwrap());
        let err = store.get_table(&sum).unwrap_err();
        assert!(matches!(
            err,
            StoreError::KindMismatch { expected: ObjectKind::Table, actual: ObjectKind::Commit, .. }
        ));
    }

    #[test]
    fn missing_object_is_not_found() {
        let store = InMemoryObjectStore::new();
        let sum = ObjectSum::digest(b"missing");
        assert!(store.read(&sum).unwrap().is_none());
        assert!(matches!(store.get_commit(&sum), Err(StoreError::NotFound(s)) if s == sum));
    }

    #[test]
    fn write_is_idempotent() {
        let store = InMemoryObjectStore::new();
        let commit = make_commit(ObjectSum::null());
        let a = store.save_commit(&commit).unwrap();
        let b = store.save_commit(&commit).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_object() {
        let store = InMemoryObjectStore::new();
        let sum = store.save_commit(&make_commit(ObjectSum::null())).unwrap();
        assert!(store.delete(&sum).unwrap());
        assert!(!store.exists(&sum).unwrap());
        assert!(!store.delete(&sum).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_reads_are_safe() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryObjectStore::new());
        let sum = store.save_commit(&make_commit(ObjectSum::null())).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || assert!(store.commit_exists(&sum).unwrap()))
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
    }
}
