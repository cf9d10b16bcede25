//! Error types for commit DAG walks.

use wrgl_types::ObjectSum;

/// Errors that can occur while walking the commit DAG.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// A commit referenced by a ref or a parent pointer is missing.
    #[error("commit not found: {0}")]
    CommitNotFound(ObjectSum),

    /// Object store failure.
    #[error("store error: {0}")]
    Store(#[from] wrgl_objects::StoreError),
}

/// Convenience alias for DAG results.
pub type DagResult<T> = Result<T, DagError>;

pub(crate) fn load_commit(
    store: &dyn wrgl_objects::ObjectStore,
    sum: &ObjectSum,
) -> DagResult<wrgl_objects::Commit> {
    match store.get_commit(sum) {
        Ok(commit) => Ok(commit),
        Err(wrgl_objects::StoreError::NotFound(_)) => Err(DagError::CommitNotFound(*sum)),
        Err(e) => Err(e.into()),
    }
}
