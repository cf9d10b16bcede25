//! In-memory reference store for tests and ephemeral use.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use tracing::debug;
use wrgl_types::ObjectSum;

use crate::error::Result;
use crate::names::validate_ref_name;
use crate::traits::RefStore;
use crate::types::Reflog;

#[derive(Debug, Default)]
struct Inner {
    refs: BTreeMap<String, ObjectSum>,
    logs: HashMap<String, Vec<Reflog>>,
}

/// An in-memory implementation of [`RefStore`].
///
/// Refs and reflogs share one `RwLock`, so a ref and its newest reflog entry
/// are always updated together.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    inner: RwLock<Inner>,
}

impl InMemoryRefStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefStore for InMemoryRefStore {
    fn get_ref(&self, name: &str) -> Result<Option<ObjectSum>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.refs.get(name).copied())
    }

    fn set_ref(&self, name: &str, sum: ObjectSum, log: Reflog) -> Result<()> {
        validate_ref_name(name)?;
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.refs.insert(name.to_string(), sum);
        inner.logs.entry(name.to_string()).or_default().push(log);
        debug!(ref_name = name, sum = %sum.short_hex(), "ref updated");
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.logs.remove(name);
        Ok(inner.refs.remove(name).is_some())
    }

    fn list_refs(&self, prefix: &str) -> Result<BTreeMap<String, ObjectSum>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner
            .refs
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }

    fn logs(&self, name: &str) -> Result<Vec<Reflog>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.logs.get(name).cloned().unwrap_or_default())
    }
}
