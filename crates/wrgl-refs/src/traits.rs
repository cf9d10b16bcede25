//! The [`RefStore`] trait defining the reference storage interface.

use std::collections::BTreeMap;

use wrgl_types::ObjectSum;

use crate::error::Result;
use crate::names::{head_ref, remote_ref};
use crate::types::{RefChange, Reflog};

/// Storage backend for named references and their reflogs.
///
/// Implementations must be thread-safe (`Send + Sync`). Each ref write is
/// individually atomic; there are no cross-ref transactions.
pub trait RefStore: Send + Sync {
    /// Read a ref by its full name (e.g. `heads/main`).
    fn get_ref(&self, name: &str) -> Result<Option<ObjectSum>>;

    /// Point a ref at `sum` and append `log` to its reflog.
    fn set_ref(&self, name: &str, sum: ObjectSum, log: Reflog) -> Result<()>;

    /// Delete a ref and its reflog. Returns `true` if the ref existed.
    fn delete_ref(&self, name: &str) -> Result<bool>;

    /// All refs whose name starts with `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> Result<BTreeMap<String, ObjectSum>>;

    /// Reflog of a ref, oldest entry first.
    fn logs(&self, name: &str) -> Result<Vec<Reflog>>;

    fn list_all_refs(&self) -> Result<BTreeMap<String, ObjectSum>> {
        self.list_refs("")
    }

    /// Tip of a local branch.
    fn get_head(&self, branch: &str) -> Result<Option<ObjectSum>> {
        self.get_ref(&head_ref(branch))
    }

    /// Move a ref, recording its previous target in the reflog.
    fn save_ref(&self, name: &str, sum: ObjectSum, change: RefChange) -> Result<()> {
        let old = self.get_ref(name)?;
        self.set_ref(name, sum, change.into_reflog(old, sum))
    }

    /// Advance a local branch to a freshly created commit.
    fn commit_head(
        &self,
        branch: &str,
        sum: ObjectSum,
        author_name: &str,
        author_email: &str,
        message: &str,
    ) -> Result<()> {
        let change = RefChange::new("commit", message).with_author(author_name, author_email);
        self.save_ref(&head_ref(branch), sum, change)
    }

    /// Store a branch tip fetched from a remote under `remotes/<remote>/<branch>`.
    fn save_fetched_ref(&self, remote: &str, branch: &str, sum: ObjectSum) -> Result<()> {
        let name = remote_ref(remote, branch);
        if self.get_ref(&name)? == Some(sum) {
            return Ok(());
        }
        let change = RefChange::new("fetch", format!("[from {remote}] storing head"));
        self.save_ref(&name, sum, change)
    }
}
